//! User-defined memory regions: parsing, validation, file I/O, and the named region set.

/// Region access permissions.
pub mod permissions;
/// Single region description and its backing files.
pub mod region;
/// Name-keyed region collection.
pub mod set;

pub use permissions::Permissions;
pub use region::{MemRegion, CODE_REGION};
pub use set::MemRegionSet;
