use std::fmt;

/// Decoded CPU exception raised during emulation.
///
/// The empty description marks "no exception"; [`Exception::none`] builds that value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Exception {
    number: u32,
    pc: u64,
    description: String,
}

impl Exception {
    /// Creates an exception record.
    #[must_use]
    pub fn new(number: u32, pc: u64, description: impl Into<String>) -> Self {
        Self {
            number,
            pc,
            description: description.into(),
        }
    }

    /// Returns the "no exception" value.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            number: 0,
            pc: 0,
            description: String::new(),
        }
    }

    /// Returns `true` if this records a real exception.
    #[must_use]
    pub fn occurred(&self) -> bool {
        !self.description.is_empty()
    }

    /// Returns the engine-supplied interrupt number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns the program counter at the time of the exception.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
