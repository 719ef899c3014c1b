use std::collections::{BTreeMap, HashMap};

use crate::breakpoint::{Breakpoint, BreakpointId};

/// Breakpoint collection indexed by id and by address.
///
/// Breakpoints live in an arena of slots; freed slots are recycled, ids are not.
/// Several breakpoints may share one address.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    slots: Vec<Option<Breakpoint>>,
    free: Vec<usize>,
    by_id: BTreeMap<BreakpointId, usize>,
    by_address: HashMap<u64, Vec<usize>>,
    issued: u32,
}

impl BreakpointSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an armed breakpoint at `address` and returns a copy of it.
    pub fn add(&mut self, address: u64) -> Breakpoint {
        self.issued += 1;
        let breakpoint = Breakpoint::new(BreakpointId::new(self.issued), address);

        let slot = if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(breakpoint.clone());
            slot
        } else {
            self.slots.push(Some(breakpoint.clone()));
            self.slots.len() - 1
        };
        self.by_id.insert(breakpoint.id(), slot);
        self.by_address.entry(address).or_default().push(slot);
        breakpoint
    }

    /// Processes execution reaching `address`.
    ///
    /// Armed breakpoints at `address` trigger and count a hit; triggered breakpoints
    /// elsewhere re-arm. Returns `true` if any breakpoint triggered.
    pub fn process(&mut self, address: u64) -> bool {
        let mut triggered = false;
        if let Some(slots) = self.by_address.get(&address) {
            for &slot in slots {
                if let Some(breakpoint) = self.slots[slot].as_mut() {
                    if breakpoint.hit(address) {
                        triggered = true;
                    }
                }
            }
        }
        for breakpoint in self.slots.iter_mut().flatten() {
            breakpoint.rearm_away_from(address);
        }
        triggered
    }

    /// Removes the breakpoint with `id`, returning it if it existed.
    pub fn remove(&mut self, id: BreakpointId) -> Option<Breakpoint> {
        let slot = self.by_id.remove(&id)?;
        let breakpoint = self.slots[slot].take()?;
        if let Some(slots) = self.by_address.get_mut(&breakpoint.address()) {
            slots.retain(|&other| other != slot);
            if slots.is_empty() {
                self.by_address.remove(&breakpoint.address());
            }
        }
        self.free.push(slot);
        Some(breakpoint)
    }

    /// Removes every breakpoint at `address`, returning how many were removed.
    pub fn remove_all_at(&mut self, address: u64) -> usize {
        let ids: Vec<BreakpointId> = self.get_at(address).iter().map(Breakpoint::id).collect();
        ids.into_iter()
            .filter_map(|id| self.remove(id))
            .count()
    }

    /// Removes every breakpoint. Ids keep increasing afterwards.
    pub fn remove_all(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_id.clear();
        self.by_address.clear();
    }

    /// All breakpoints in ascending id order.
    #[must_use]
    pub fn get(&self) -> Vec<Breakpoint> {
        self.by_id
            .values()
            .filter_map(|&slot| self.slots[slot].clone())
            .collect()
    }

    /// Looks up one breakpoint by id.
    #[must_use]
    pub fn get_by_id(&self, id: BreakpointId) -> Option<&Breakpoint> {
        let slot = *self.by_id.get(&id)?;
        self.slots[slot].as_ref()
    }

    /// Breakpoints at `address` in ascending id order.
    #[must_use]
    pub fn get_at(&self, address: u64) -> Vec<Breakpoint> {
        let mut found: Vec<Breakpoint> = self
            .by_address
            .get(&address)
            .into_iter()
            .flatten()
            .filter_map(|&slot| self.slots[slot].clone())
            .collect();
        found.sort_by_key(Breakpoint::id);
        found
    }

    /// Re-enables a disabled breakpoint. Returns `false` if `id` is unknown.
    pub fn enable(&mut self, id: BreakpointId) -> bool {
        self.with_breakpoint(id, Breakpoint::enable)
    }

    /// Disables a breakpoint. Returns `false` if `id` is unknown.
    pub fn disable(&mut self, id: BreakpointId) -> bool {
        self.with_breakpoint(id, Breakpoint::disable)
    }

    /// Clears a breakpoint's hit count and re-arms it. Returns `false` if `id` is unknown.
    pub fn reset(&mut self, id: BreakpointId) -> bool {
        self.with_breakpoint(id, Breakpoint::reset)
    }

    /// Number of live breakpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if no breakpoints exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn with_breakpoint(&mut self, id: BreakpointId, apply: impl FnOnce(&mut Breakpoint)) -> bool {
        let Some(&slot) = self.by_id.get(&id) else {
            return false;
        };
        match self.slots[slot].as_mut() {
            Some(breakpoint) => {
                apply(breakpoint);
                true
            }
            None => false,
        }
    }
}
