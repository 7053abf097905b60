//! Persisted index header.
//!
//! Layout:
//! ```text
//! +----------------+
//! | state: u8      |  FAILED=0, ONLINE=1, POPULATING=2
//! +----------------+
//! | len: u16 LE    |  FAILED only
//! | message: UTF-8 |
//! +----------------+
//! ```

use tracing::debug;
use zyron_common::{Result, ZyronError};

/// Size of the state byte.
pub const STATE_SIZE: usize = 1;

/// Size of the failure message length prefix.
pub const MESSAGE_LENGTH_SIZE: usize = 2;

/// Lifecycle state of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IndexState {
    Failed = 0,
    Online = 1,
    Populating = 2,
}

impl IndexState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(IndexState::Failed),
            1 => Some(IndexState::Online),
            2 => Some(IndexState::Populating),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexState::Failed => write!(f, "FAILED"),
            IndexState::Online => write!(f, "ONLINE"),
            IndexState::Populating => write!(f, "POPULATING"),
        }
    }
}

/// Index state plus the failure message of a failed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    state: IndexState,
    failure: Option<String>,
}

impl IndexHeader {
    pub fn populating() -> Self {
        Self {
            state: IndexState::Populating,
            failure: None,
        }
    }

    pub fn online() -> Self {
        Self {
            state: IndexState::Online,
            failure: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: IndexState::Failed,
            failure: Some(message.into()),
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Fails with the recorded message if the index is FAILED.
    pub fn check_not_failed(&self) -> Result<()> {
        match (self.state, &self.failure) {
            (IndexState::Failed, failure) => Err(ZyronError::IndexFailed(
                failure.clone().unwrap_or_else(|| "no failure message".to_string()),
            )),
            _ => Ok(()),
        }
    }

    /// Transitions POPULATING to ONLINE.
    pub fn mark_online(&mut self) -> Result<()> {
        self.transition(IndexState::Online)?;
        self.failure = None;
        Ok(())
    }

    /// Transitions POPULATING to FAILED.
    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(IndexState::Failed)?;
        self.failure = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, to: IndexState) -> Result<()> {
        if self.state != IndexState::Populating || to == IndexState::Populating {
            return Err(ZyronError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %self.state, to = %to, "Index state transition");
        self.state = to;
        Ok(())
    }

    /// Writes the header at the start of `page`, truncating the failure
    /// message to fit. Returns the number of bytes written.
    pub fn write(&self, page: &mut [u8]) -> Result<usize> {
        let min = match self.state {
            IndexState::Failed => STATE_SIZE + MESSAGE_LENGTH_SIZE,
            _ => STATE_SIZE,
        };
        if page.len() < min {
            return Err(ZyronError::InvalidParameter {
                name: "page".to_string(),
                value: format!("{} bytes, need at least {}", page.len(), min),
            });
        }
        page[0] = self.state as u8;
        if self.state != IndexState::Failed {
            return Ok(STATE_SIZE);
        }

        let max = (page.len() - STATE_SIZE - MESSAGE_LENGTH_SIZE).min(u16::MAX as usize);
        let message = truncate_utf8(self.failure.as_deref().unwrap_or(""), max);
        let start = STATE_SIZE + MESSAGE_LENGTH_SIZE;
        page[STATE_SIZE..start].copy_from_slice(&(message.len() as u16).to_le_bytes());
        page[start..start + message.len()].copy_from_slice(message.as_bytes());
        Ok(start + message.len())
    }

    /// Reads a header from the start of `page`.
    pub fn read(page: &[u8]) -> Result<Self> {
        let tag = *page.first().ok_or_else(|| ZyronError::HeaderCorrupted {
            reason: "empty header page".to_string(),
        })?;
        let state = IndexState::from_u8(tag).ok_or_else(|| ZyronError::HeaderCorrupted {
            reason: format!("unknown state {}", tag),
        })?;
        if state != IndexState::Failed {
            return Ok(Self {
                state,
                failure: None,
            });
        }

        let start = STATE_SIZE + MESSAGE_LENGTH_SIZE;
        if page.len() < start {
            return Err(ZyronError::HeaderCorrupted {
                reason: "missing failure message length".to_string(),
            });
        }
        let len = u16::from_le_bytes([page[1], page[2]]) as usize;
        let bytes = page.get(start..start + len).ok_or_else(|| ZyronError::HeaderCorrupted {
            reason: format!("failure message of {} bytes exceeds page", len),
        })?;
        let message = std::str::from_utf8(bytes).map_err(|e| ZyronError::HeaderCorrupted {
            reason: format!("failure message is not UTF-8: {}", e),
        })?;
        Ok(Self::failed(message))
    }
}

/// Returns the longest prefix of `s` of at most `max` bytes that ends on a
/// char boundary.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_not_failed() {
        assert!(IndexHeader::populating().check_not_failed().is_ok());
        assert!(IndexHeader::online().check_not_failed().is_ok());

        let mut header = IndexHeader::populating();
        header.mark_failed("duplicate value [5]").unwrap();
        match header.check_not_failed() {
            Err(ZyronError::IndexFailed(msg)) => assert_eq!(msg, "duplicate value [5]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_state_bytes() {
        let mut page = [0xAAu8; 8];
        assert_eq!(IndexHeader::populating().write(&mut page).unwrap(), 1);
        assert_eq!(page[0], 2);
        IndexHeader::online().write(&mut page).unwrap();
        assert_eq!(page[0], 1);
        assert_eq!(IndexHeader::read(&page).unwrap(), IndexHeader::online());
    }

    #[test]
    fn test_failed_roundtrip() {
        let mut page = [0u8; 64];
        let header = IndexHeader::failed("disk full");
        assert_eq!(header.write(&mut page).unwrap(), 3 + 9);
        assert_eq!(&page[..3], &[0, 9, 0]);
        let decoded = IndexHeader::read(&page).unwrap();
        assert_eq!(decoded.state(), IndexState::Failed);
        assert_eq!(decoded.failure_message(), Some("disk full"));
    }

    #[test]
    fn test_failure_message_truncated_on_char_boundary() {
        // 'é' is two bytes: four message bytes hold "abé", three only "ab".
        let mut page = [0u8; 7];
        let header = IndexHeader::failed("abééé");
        assert_eq!(header.write(&mut page).unwrap(), 3 + 4);
        let decoded = IndexHeader::read(&page).unwrap();
        assert_eq!(decoded.failure_message(), Some("abé"));

        let mut page = [0u8; 6];
        header.write(&mut page).unwrap();
        assert_eq!(IndexHeader::read(&page).unwrap().failure_message(), Some("ab"));
    }

    #[test]
    fn test_transitions() {
        let mut header = IndexHeader::populating();
        header.mark_online().unwrap();
        assert_eq!(header.state(), IndexState::Online);
        let err = header.mark_failed("late").unwrap_err();
        assert!(matches!(err, ZyronError::InvalidStateTransition { .. }));

        let mut header = IndexHeader::populating();
        header.mark_failed("boom").unwrap();
        assert_eq!(header.failure_message(), Some("boom"));
        let err = header.mark_online().unwrap_err();
        assert_eq!(err.to_string(), "Invalid index state transition: FAILED -> ONLINE");
    }

    #[test]
    fn test_read_rejects_corrupt_pages() {
        assert!(matches!(IndexHeader::read(&[]), Err(ZyronError::HeaderCorrupted { .. })));
        assert!(matches!(IndexHeader::read(&[7]), Err(ZyronError::HeaderCorrupted { .. })));
        assert!(matches!(
            IndexHeader::read(&[0, 10, 0, b'a']),
            Err(ZyronError::HeaderCorrupted { .. })
        ));
        assert!(matches!(
            IndexHeader::read(&[0, 1, 0, 0xFF]),
            Err(ZyronError::HeaderCorrupted { .. })
        ));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        assert_eq!(truncate_utf8("日本", 4), "日");
        assert_eq!(truncate_utf8("日本", 2), "");
    }
}
