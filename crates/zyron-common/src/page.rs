//! Page geometry shared by index layouts and the population pipeline.

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Largest encoded key plus value that fits a tree page.
///
/// Two entries must fit a leaf so a split always makes progress.
pub const MAX_ENTRY_SIZE: usize = PAGE_SIZE / 2 - ENTRY_OVERHEAD;

/// Per-entry bookkeeping the tree engine reserves on a page.
pub const ENTRY_OVERHEAD: usize = 8;

/// Largest array length accepted when decoding a persisted key.
///
/// Any array longer than this cannot fit a page even with one byte per
/// element, so a larger length means the bytes are corrupt.
pub const BIGGEST_REASONABLE_ARRAY_LENGTH: usize = PAGE_SIZE / 2;

/// Returns true if an entry of the given encoded size fits a tree page.
pub fn fits_page(entry_size: usize) -> bool {
    entry_size <= MAX_ENTRY_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constants() {
        assert_eq!(PAGE_SIZE, 16384);
        assert_eq!(MAX_ENTRY_SIZE, 8184);
        assert_eq!(BIGGEST_REASONABLE_ARRAY_LENGTH, 8192);
    }

    #[test]
    fn test_fits_page() {
        assert!(fits_page(0));
        assert!(fits_page(MAX_ENTRY_SIZE));
        assert!(!fits_page(MAX_ENTRY_SIZE + 1));
    }
}
