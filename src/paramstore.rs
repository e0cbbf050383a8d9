//! Ordered id-keyed parameter-set store (spec.md §9 "Parameter-set store as
//! ordered map, not intrusive list"). Grounded on `ps_list_is_there_collision`
//! / `ps_list_update`: a parameter set id that reappears with byte-identical
//! contents is a no-op; reappearing with different contents is either a
//! tolerated "new sample description" (multi-SD streams) or, under a
//! single-SD policy, a hard error.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ParamStore<T> {
    entries: BTreeMap<u8, Arc<T>>,
    raw: BTreeMap<u8, Vec<u8>>,
    insertion_order: Vec<u8>,
}

/// Outcome of inserting a parameter set, used by callers to decide whether
/// a new sample description boundary must be signalled downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First time this id has been seen.
    New,
    /// Byte-identical to what's already stored; no-op.
    Unchanged,
    /// Same id, different bytes: a new sample description.
    Replaced,
}

impl<T> ParamStore<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            raw: BTreeMap::new(),
            insertion_order: Vec::new(),
        }
    }

    pub fn get(&self, id: u8) -> Option<&Arc<T>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered by first-seen id, matching the dsi_list's first-entry
    /// convention rather than numeric id order.
    pub fn iter_in_insertion_order(&self) -> impl Iterator<Item = (u8, &Arc<T>)> {
        self.insertion_order.iter().filter_map(move |id| self.entries.get(id).map(|v| (*id, v)))
    }

    /// Inserts a parsed parameter set, keyed by `id`, with its raw bytes
    /// used for byte-exact collision detection. `single_sd_policy` mirrors
    /// the caller's `CodecConfig::single_sd_policy`: when set, a
    /// content-changing collision is `Error::MultiSdForbidden` instead of
    /// being tolerated as a new sample description.
    pub fn update(&mut self, id: u8, raw: Vec<u8>, parsed: T, single_sd_policy: bool) -> Result<UpdateOutcome> {
        let outcome = match self.raw.get(&id) {
            None => UpdateOutcome::New,
            Some(existing) if *existing == raw => UpdateOutcome::Unchanged,
            Some(_) => {
                if single_sd_policy {
                    return Err(Error::MultiSdForbidden);
                }
                UpdateOutcome::Replaced
            }
        };

        if outcome != UpdateOutcome::Unchanged {
            if outcome == UpdateOutcome::New {
                self.insertion_order.push(id);
            }
            self.raw.insert(id, raw);
            self.entries.insert(id, Arc::new(parsed));
        }

        Ok(outcome)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.raw.clear();
        self.insertion_order.clear();
    }
}

impl<T> Default for ParamStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
