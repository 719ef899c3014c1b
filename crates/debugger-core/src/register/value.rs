use std::fmt;

use crate::error::RegisterError;
use crate::register::definition::{Flag, RegisterDefinition};

/// Column width used when printing register names.
const NAME_WIDTH: usize = 6;
/// Column width used when printing flag names.
const FLAG_WIDTH: usize = 4;

/// A register definition paired with a concrete value.
///
/// Values are always masked to the register's width, so a `RegisterValue` can never
/// hold bits the register cannot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue {
    definition: &'static RegisterDefinition,
    value: u64,
}

impl RegisterValue {
    /// Pairs `definition` with `value`, masked to the register width.
    #[must_use]
    pub const fn new(definition: &'static RegisterDefinition, value: u64) -> Self {
        Self {
            definition,
            value: value & definition.mask,
        }
    }

    /// Returns the register definition.
    #[must_use]
    pub const fn definition(&self) -> &'static RegisterDefinition {
        self.definition
    }

    /// Returns the primary register name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.definition.name
    }

    /// Returns the masked value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Returns `true` if this is the program counter.
    #[must_use]
    pub const fn is_program_counter(&self) -> bool {
        self.definition.is_program_counter
    }

    /// Returns a copy holding `value` instead, masked to the register width.
    #[must_use]
    pub const fn with_value(self, value: u64) -> Self {
        Self::new(self.definition, value)
    }

    /// Extracts the named flag field.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownFlag`] if the register has no such flag.
    pub fn flag(&self, name: &str) -> Result<u64, RegisterError> {
        let flag = self.lookup_flag(name)?;
        Ok(flag.extract(self.value))
    }

    /// Returns a copy with the named flag field replaced by `field_value`.
    ///
    /// Only the flag's bits change. Bits of `field_value` wider than the flag are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownFlag`] if the register has no such flag.
    pub fn with_flag(self, name: &str, field_value: u64) -> Result<Self, RegisterError> {
        let flag = self.lookup_flag(name)?;
        Ok(self.with_value(flag.insert(self.value, field_value)))
    }

    /// Renders every flag as `name value`, one entry per flag, in definition order.
    #[must_use]
    pub fn flag_strings(&self) -> Vec<String> {
        self.definition
            .flags
            .iter()
            .map(|flag| {
                format!(
                    "{:<FLAG_WIDTH$}{}",
                    flag.name,
                    flag.format.render(flag.extract(self.value))
                )
            })
            .collect()
    }

    fn lookup_flag(&self, name: &str) -> Result<&'static Flag, RegisterError> {
        self.definition
            .flag(name)
            .ok_or_else(|| RegisterError::UnknownFlag {
                register: self.definition.name,
                flag: name.to_owned(),
            })
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<NAME_WIDTH$}{}",
            self.definition.name,
            self.definition.format.render(self.value)
        )
    }
}
