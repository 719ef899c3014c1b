use std::fmt;
use std::str::FromStr;

use crate::error::RegionError;

/// Access permissions requested for a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Permissions {
    /// Region may be read.
    pub read: bool,
    /// Region may be written.
    pub write: bool,
    /// Region may be executed.
    pub execute: bool,
}

impl Permissions {
    /// Read, write, and execute.
    pub const ALL: Self = Self {
        read: true,
        write: true,
        execute: true,
    };

    /// No access.
    pub const NONE: Self = Self {
        read: false,
        write: false,
        execute: false,
    };

    /// Returns `true` when no access is granted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.read && !self.write && !self.execute
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for Permissions {
    type Err = RegionError;

    /// Parses any subset of `rwx`, case-insensitively; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut permissions = Self::NONE;
        for ch in s.trim().chars() {
            match ch.to_ascii_lowercase() {
                'r' => permissions.read = true,
                'w' => permissions.write = true,
                'x' => permissions.execute = true,
                _ => return Err(RegionError::InvalidPermissions(s.to_owned())),
            }
        }
        Ok(permissions)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        for (granted, ch) in [(self.read, 'r'), (self.write, 'w'), (self.execute, 'x')] {
            if granted {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}
