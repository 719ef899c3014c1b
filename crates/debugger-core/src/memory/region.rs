use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RegionError;
use crate::literal::parse_u64;
use crate::memory::permissions::Permissions;

/// Name of the region that holds the program and bounds execution.
pub const CODE_REGION: &str = "code";

/// User-defined contiguous memory region.
///
/// Regions are described by `name:base:size[:perms[:input[:output]]]`. The input file
/// seeds the region when it is mapped; the output file receives the region's contents
/// when it is unmapped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemRegion {
    name: String,
    base: u64,
    size: u64,
    permissions: Permissions,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

impl MemRegion {
    /// Creates a region without input or output files.
    #[must_use]
    pub fn new(name: impl Into<String>, base: u64, size: u64, permissions: Permissions) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            permissions,
            input_file: None,
            output_file: None,
        }
    }

    /// Sets the file loaded into the region when it is mapped.
    #[must_use]
    pub fn with_input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = Some(path.into()).filter(|p: &PathBuf| !p.as_os_str().is_empty());
        self
    }

    /// Sets the file receiving the region's contents when it is unmapped.
    #[must_use]
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into()).filter(|p: &PathBuf| !p.as_os_str().is_empty());
        self
    }

    /// Region name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First address in the region.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Requested access permissions.
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Input file, if any.
    #[must_use]
    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    /// Output file, if any.
    #[must_use]
    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// One past the last address in the region.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Last address in the region, inclusive.
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.end().saturating_sub(1)
    }

    /// Returns `true` if `address` lies inside the region.
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Returns `true` for the region named `code`.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.name == CODE_REGION
    }

    /// Checks the region's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError`] if the name is empty, the size is zero, the region
    /// overflows the address space, or the `code` region is not executable or has no
    /// input file.
    pub fn validate(&self) -> Result<(), RegionError> {
        if self.name.is_empty() {
            return Err(RegionError::EmptyName);
        }
        if self.size == 0 {
            return Err(RegionError::ZeroSize(self.name.clone()));
        }
        if self.base.checked_add(self.size).is_none() {
            return Err(RegionError::AddressOverflow {
                base: self.base,
                size: self.size,
            });
        }
        if self.is_code() {
            if !self.permissions.execute {
                return Err(RegionError::CodeNotExecutable);
            }
            if self.input_file.is_none() {
                return Err(RegionError::CodeWithoutInput);
            }
        }
        Ok(())
    }

    /// Reads the input file, or returns no bytes when the region has none.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::ReadInput`] if the file cannot be read and
    /// [`RegionError::InputTooLarge`] if it does not fit the region.
    pub fn load_input(&self) -> Result<Vec<u8>, RegionError> {
        let Some(path) = &self.input_file else {
            return Ok(Vec::new());
        };
        let data = fs::read(path).map_err(|source| RegionError::ReadInput {
            name: self.name.clone(),
            path: path.clone(),
            source,
        })?;
        let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
        if len > self.size {
            return Err(RegionError::InputTooLarge {
                name: self.name.clone(),
                path: path.clone(),
                len,
                size: self.size,
            });
        }
        Ok(data)
    }

    /// Writes `data` to the output file; a no-op when the region has none.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::WriteOutput`] if the file cannot be written.
    pub fn write_output(&self, data: &[u8]) -> Result<(), RegionError> {
        let Some(path) = &self.output_file else {
            return Ok(());
        };
        fs::write(path, data).map_err(|source| RegionError::WriteOutput {
            name: self.name.clone(),
            path: path.clone(),
            source,
        })
    }
}

impl FromStr for MemRegion {
    type Err = RegionError;

    /// Parses `name:base:size[:perms[:input[:output]]]`.
    ///
    /// Base and size accept decimal or `0x` hex. Permissions default to `rwx`. A named
    /// input file must already exist.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if !(3..=6).contains(&fields.len()) {
            return Err(RegionError::FieldCount(s.to_owned()));
        }

        let name = fields[0].trim();
        if name.is_empty() {
            return Err(RegionError::EmptyName);
        }
        let base =
            parse_u64(fields[1]).map_err(|_| RegionError::InvalidBase(fields[1].to_owned()))?;
        let size =
            parse_u64(fields[2]).map_err(|_| RegionError::InvalidSize(fields[2].to_owned()))?;
        let permissions = match fields.get(3) {
            Some(text) => text.parse()?,
            None => Permissions::default(),
        };

        let mut region = Self::new(name, base, size, permissions);
        if let Some(input) = fields.get(4).map(|f| f.trim()).filter(|f| !f.is_empty()) {
            let path = PathBuf::from(input);
            if !path.exists() {
                return Err(RegionError::MissingInputFile {
                    name: name.to_owned(),
                    path,
                });
            }
            region = region.with_input_file(path);
        }
        if let Some(output) = fields.get(5) {
            region = region.with_output_file(output.trim());
        }

        region.validate()?;
        Ok(region)
    }
}

impl fmt::Display for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |path: Option<&Path>| path.map(|p| p.display().to_string()).unwrap_or_default();
        write!(
            f,
            "{} [0x{:08x}-0x{:08x}] {{{}}} in:\"{}\" out:\"{}\"",
            self.name,
            self.base,
            self.last(),
            self.permissions,
            show(self.input_file()),
            show(self.output_file()),
        )
    }
}
