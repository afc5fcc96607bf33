use super::*;

/// Out-of-band conditions noticed during a channel operation.
///
/// Every channel entry point takes one of these by mutable reference and
/// only ever sets bits, so a caller can carry a single word across calls and
/// inspect what accumulated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// A custody signal was loaded; it is addressed to the custodian, not
    /// the channel destination, and may need its own route.
    pub route_needed: bool,
    /// A storage-service operation failed along the way.
    pub store_failure: bool,
    /// The clock reported an unreliable reading; times used anyway.
    pub unreliable_time: bool,
    /// The active table wrapped onto an occupied slot.
    pub active_table_wrap: bool,
    /// An SDNV failed to terminate within its span.
    pub sdnv_overflow: bool,
    /// An SDNV ran off the end of its buffer.
    pub sdnv_incomplete: bool,
    /// A received bundle's integrity block did not match its payload.
    pub integrity_mismatch: bool,
}

impl Flags {
    pub const fn is_clear(&self) -> bool {
        !self.route_needed
            && !self.store_failure
            && !self.unreliable_time
            && !self.active_table_wrap
            && !self.sdnv_overflow
            && !self.sdnv_incomplete
            && !self.integrity_mismatch
    }

    /// Folds SDNV codec conditions into this word.
    pub(crate) fn absorb(&mut self, flags: kestrel_sdnv::Flags) {
        self.sdnv_overflow |= flags.overflow;
        self.sdnv_incomplete |= flags.incomplete;
    }
}

impl core::ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.route_needed |= rhs.route_needed;
        self.store_failure |= rhs.store_failure;
        self.unreliable_time |= rhs.unreliable_time;
        self.active_table_wrap |= rhs.active_table_wrap;
        self.sdnv_overflow |= rhs.sdnv_overflow;
        self.sdnv_incomplete |= rhs.sdnv_incomplete;
        self.integrity_mismatch |= rhs.integrity_mismatch;
    }
}
