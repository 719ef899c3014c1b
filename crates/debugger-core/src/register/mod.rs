//! Register model: immutable definitions, value pairs, and per-architecture tables.

/// Register and flag definitions.
pub mod definition;
/// Name lookup, assignment parsing, and name scanning over a definition set.
pub mod table;
/// Register values and flag editing.
pub mod value;

pub use definition::{DisplayFormat, EngineRegister, Flag, RegisterDefinition};
pub use table::RegisterTable;
pub use value::RegisterValue;

/// Returns the value of the register named `name` within `registers`, if present.
///
/// Matching is by primary name, so callers pass definition names rather than aliases.
#[must_use]
pub fn find_value(registers: &[RegisterValue], name: &str) -> Option<RegisterValue> {
    registers
        .iter()
        .copied()
        .find(|register| register.name() == name)
}
