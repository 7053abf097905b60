//! Native schema index keys for ZyronDB.
//!
//! This crate provides:
//! - Property values and the type registry with per-type value codecs
//! - Composite generic keys with reusable per-column state
//! - Index layouts (generic, number, date) with unique and non-unique id policies
//! - The persisted index header
//! - Tree collaborator traits, property predicates and hit progressors

pub mod header;
pub mod key;
pub mod layout;
pub mod number;
pub mod predicate;
pub mod progressor;
pub mod state;
pub mod temporal;
pub mod tree;
pub mod types;
pub mod value;

pub use header::{truncate_utf8, IndexHeader, IndexState};
pub use key::{GenericKey, IndexKey, ENTITY_ID_SIZE, HIGHEST_ENTITY_ID, LOWEST_ENTITY_ID};
pub use layout::{
    DateKey, DateLayout, GenericLayout, IdSemantics, Layout, NullValue, NumberKey, NumberLayout,
};
pub use number::{NumberKind, RawNumber};
pub use predicate::PropertyPredicate;
pub use progressor::{
    DistinctValuesClient, DistinctValuesProgressor, EntityProgressor, EntityValueClient,
    FilteringProgressor, IndexProgressor,
};
pub use state::{Inclusion, KeySlot};
pub use tree::{Seeker, TreeWriter};
pub use types::{ElementKind, Type};
pub use value::{DurationValue, PointValue, Value, ZonedTime};
