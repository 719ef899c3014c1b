use crate::arch::{Arch, Architecture};
use crate::error::{DebuggerError, RegionError};
use crate::memory::{MemRegion, MemRegionSet};
use crate::register::RegisterValue;

/// Everything needed to boot a debugger session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebuggerConfig {
    arch: Architecture,
    registers: Vec<RegisterValue>,
    regions: MemRegionSet,
}

impl DebuggerConfig {
    /// Creates an empty configuration for `arch`.
    #[must_use]
    pub fn new(arch: Architecture) -> Self {
        Self {
            arch,
            registers: Vec::new(),
            regions: MemRegionSet::new(),
        }
    }

    /// Builds a configuration from textual specifications: an `arch[:mode]` string,
    /// `name:base:size[:perms[:input[:output]]]` regions, and `name=value` registers.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError`] for the first specification that fails to parse, a
    /// duplicate region name, or a missing `code` region.
    pub fn from_specs<'a, R, V>(arch: &str, regions: R, registers: V) -> Result<Self, DebuggerError>
    where
        R: IntoIterator<Item = &'a str>,
        V: IntoIterator<Item = &'a str>,
    {
        let arch = Architecture::new(arch)?;
        let mut config = Self::new(arch);
        for spec in regions {
            config.regions.add_spec(spec)?;
        }
        config.registers = arch.register_table().parse_all(registers)?;
        config.validate()?;
        Ok(config)
    }

    /// Adds a memory region.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DuplicateName`] if the name is taken.
    pub fn with_region(mut self, region: MemRegion) -> Result<Self, RegionError> {
        self.regions.add(region)?;
        Ok(self)
    }

    /// Adds an initial register value. Later values for the same register win.
    #[must_use]
    pub fn with_register(mut self, value: RegisterValue) -> Self {
        self.registers.push(value);
        self
    }

    /// Checks that a `code` region exists and every region is valid.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::MissingCodeRegion`] or the first region's
    /// [`RegionError`].
    pub fn validate(&self) -> Result<(), DebuggerError> {
        if self.regions.code().is_none() {
            return Err(DebuggerError::MissingCodeRegion);
        }
        for region in self.regions.sorted_by_base() {
            region.validate()?;
        }
        Ok(())
    }

    /// Target architecture.
    #[must_use]
    pub const fn arch(&self) -> Architecture {
        self.arch
    }

    /// Initial register values in the order they are applied.
    #[must_use]
    pub fn registers(&self) -> &[RegisterValue] {
        &self.registers
    }

    /// Configured memory regions.
    #[must_use]
    pub const fn regions(&self) -> &MemRegionSet {
        &self.regions
    }
}
