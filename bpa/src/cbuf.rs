/*!
A circular buffer of in-flight custody descriptors, indexed directly by
custody id.

This is the alternate active-table layout used by deployments that prefer a
dense ring over the slot-probing scan: every custody id maps to the slot
`cid % size`, and the `oldest`/`newest` markers bound the live window.
*/

use super::*;
use crate::storage::Sid;

/// One in-flight custody-tracked bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBundle {
    pub cid: u64,
    pub sid: Sid,
    /// Last (re)transmission time in seconds.
    pub retx: u64,
}

/// Outcomes of [`CidRing::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry took an empty slot.
    Stored,
    /// The entry displaced a previous occupant, returned here.
    Displaced(ActiveBundle),
}

/// The ring. `count()` can never exceed the size it was created with.
pub struct CidRing {
    slots: Box<[Option<ActiveBundle>]>,
    num_entries: usize,
    oldest_cid: u64,
    newest_cid: u64,
}

impl CidRing {
    pub fn new(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidAttribute("ring size must be non-zero"));
        }
        Ok(Self {
            slots: vec![None; size].into_boxed_slice(),
            num_entries: 0,
            oldest_cid: 0,
            newest_cid: 0,
        })
    }

    fn index(&self, cid: u64) -> usize {
        (cid % self.slots.len() as u64) as usize
    }

    /// Entries currently live; `newest - oldest` counting only occupancy.
    pub fn count(&self) -> usize {
        self.num_entries
    }

    /// Installs `entry` at the next custody id's slot.
    ///
    /// With `overwrite` unset an occupied slot is an overflow error; with it
    /// set the occupant is dropped and returned to the caller for cleanup.
    pub fn add(&mut self, entry: ActiveBundle, overwrite: bool) -> Result<AddOutcome, Error> {
        let at = self.index(self.newest_cid);
        let outcome = match self.slots[at].take() {
            Some(occupant) if !overwrite => {
                self.slots[at] = Some(occupant);
                return Err(Error::ActiveTableFull);
            }
            Some(occupant) => AddOutcome::Displaced(occupant),
            None => {
                self.num_entries += 1;
                AddOutcome::Stored
            }
        };
        self.slots[at] = Some(entry);
        self.newest_cid += 1;
        Ok(outcome)
    }

    /// Takes the oldest live entry, advancing the oldest marker past any
    /// vacated slots. Returns `None` when the window is empty.
    pub fn next(&mut self) -> Option<ActiveBundle> {
        while self.oldest_cid != self.newest_cid {
            let at = self.index(self.oldest_cid);
            self.oldest_cid += 1;
            if let Some(entry) = self.slots[at].take() {
                self.num_entries -= 1;
                return Some(entry);
            }
        }
        None
    }

    /// Vacates the slot a custody id maps to, returning its entry.
    pub fn remove(&mut self, cid: u64) -> Option<ActiveBundle> {
        let at = self.index(cid);
        let entry = self.slots[at].take()?;
        self.num_entries -= 1;
        Some(entry)
    }

    /// Whether `cid` is inside the live window and its slot occupied.
    pub fn available(&self, cid: u64) -> bool {
        self.oldest_cid <= cid && cid < self.newest_cid && self.slots[self.index(cid)].is_some()
    }
}
