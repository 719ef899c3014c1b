use std::collections::HashMap;
use std::fmt;

use crate::error::RegionError;
use crate::memory::region::{MemRegion, CODE_REGION};

/// Regions keyed by unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemRegionSet {
    regions: HashMap<String, MemRegion>,
}

impl MemRegionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `regions`, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DuplicateName`] on the first repeated name.
    pub fn from_regions<I>(regions: I) -> Result<Self, RegionError>
    where
        I: IntoIterator<Item = MemRegion>,
    {
        let mut set = Self::new();
        for region in regions {
            set.add(region)?;
        }
        Ok(set)
    }

    /// Inserts `region`.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DuplicateName`] if a region with the same name exists.
    pub fn add(&mut self, region: MemRegion) -> Result<(), RegionError> {
        if self.regions.contains_key(region.name()) {
            return Err(RegionError::DuplicateName(region.name().to_owned()));
        }
        self.regions.insert(region.name().to_owned(), region);
        Ok(())
    }

    /// Parses a region specification and inserts it.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError`] if parsing fails or the name is taken.
    pub fn add_spec(&mut self, spec: &str) -> Result<(), RegionError> {
        self.add(spec.parse()?)
    }

    /// Looks up a region by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::NotFound`] if no region has that name.
    pub fn get(&self, name: &str) -> Result<&MemRegion, RegionError> {
        self.regions
            .get(name)
            .ok_or_else(|| RegionError::NotFound(name.to_owned()))
    }

    /// Removes and returns a region by name.
    pub fn remove(&mut self, name: &str) -> Option<MemRegion> {
        self.regions.remove(name)
    }

    /// Returns `true` if a region with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if the set has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The `code` region, if present.
    #[must_use]
    pub fn code(&self) -> Option<&MemRegion> {
        self.regions.get(CODE_REGION)
    }

    /// Regions in ascending base order; equal bases are ordered by name.
    #[must_use]
    pub fn sorted_by_base(&self) -> Vec<&MemRegion> {
        let mut regions: Vec<&MemRegion> = self.regions.values().collect();
        regions.sort_by(|a, b| a.base().cmp(&b.base()).then_with(|| a.name().cmp(b.name())));
        regions
    }

    /// Names of all regions in ascending base order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.sorted_by_base()
            .into_iter()
            .map(|region| region.name().to_owned())
            .collect()
    }

    /// The lowest-based region containing `address`.
    #[must_use]
    pub fn containing(&self, address: u64) -> Option<&MemRegion> {
        self.sorted_by_base()
            .into_iter()
            .find(|region| region.contains(address))
    }

    /// Iterates regions in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &MemRegion> {
        self.regions.values()
    }
}

impl fmt::Display for MemRegionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in self.sorted_by_base() {
            writeln!(f, "{region}")?;
        }
        Ok(())
    }
}
