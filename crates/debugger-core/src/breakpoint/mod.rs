//! Address breakpoints with an arm/trigger/re-arm state machine.

use std::fmt;

/// Arena-backed breakpoint collection.
pub mod set;
pub use set::BreakpointSet;

/// Stable breakpoint identifier; ids start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BreakpointId(u32);

impl BreakpointId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Breakpoint lifecycle state.
///
/// `Armed` stops execution at the address; the hit moves it to `Triggered` so the
/// next attempt to execute the same address proceeds. Executing any other address
/// moves it back to `Armed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BreakpointState {
    /// Disabled by the user.
    Inactive,
    /// Will stop execution when its address is reached.
    Armed,
    /// Stopped execution at its address and will not fire again until execution leaves it.
    Triggered,
}

/// Address breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Breakpoint {
    id: BreakpointId,
    address: u64,
    hits: u64,
    state: BreakpointState,
}

impl Breakpoint {
    pub(crate) const fn new(id: BreakpointId, address: u64) -> Self {
        Self {
            id,
            address,
            hits: 0,
            state: BreakpointState::Armed,
        }
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> BreakpointId {
        self.id
    }

    /// Breakpoint address.
    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Number of `Armed` to `Triggered` transitions since creation or the last reset.
    #[must_use]
    pub const fn hit_count(&self) -> u64 {
        self.hits
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> BreakpointState {
        self.state
    }

    /// Returns `true` unless the breakpoint is disabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.state, BreakpointState::Inactive)
    }

    /// Fires if armed at `address`; returns whether it fired.
    pub(crate) fn hit(&mut self, address: u64) -> bool {
        if self.address != address || self.state != BreakpointState::Armed {
            return false;
        }
        self.state = BreakpointState::Triggered;
        self.hits += 1;
        true
    }

    /// Re-arms a triggered breakpoint once execution is elsewhere.
    pub(crate) fn rearm_away_from(&mut self, address: u64) {
        if self.address != address && self.state == BreakpointState::Triggered {
            self.state = BreakpointState::Armed;
        }
    }

    pub(crate) fn enable(&mut self) {
        if self.state == BreakpointState::Inactive {
            self.state = BreakpointState::Armed;
        }
    }

    pub(crate) fn disable(&mut self) {
        self.state = BreakpointState::Inactive;
    }

    pub(crate) fn reset(&mut self) {
        self.hits = 0;
        self.state = BreakpointState::Armed;
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Breakpoint {:2}: 0x{:08x}, Hit count = {}",
            self.id.get(),
            self.address,
            self.hits
        )
    }
}
