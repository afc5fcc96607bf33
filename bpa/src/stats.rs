use super::*;

/// A latched snapshot of a channel's counters.
///
/// Event counters accumulate from open; the queue depths and active count
/// are sampled at the moment of the snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Bundles built and enqueued by `store`.
    pub generated: u64,
    /// Bundles (data and custody signals) handed to the link by `load`.
    pub transmitted: u64,
    /// Bundles re-emitted after a custody timeout or a wrap resend.
    pub retransmitted: u64,
    /// Bundles fed to `process`.
    pub received: u64,
    /// Payloads handed to the application by `accept`.
    pub delivered: u64,
    /// Custody ids freed by incoming custody signals.
    pub acknowledged: u64,
    /// Bundles that aged out of storage or the active table.
    pub expired: u64,
    /// Bundles dropped to storage failures or wrap policy.
    pub lost: u64,

    /// Depth of the outgoing bundle queue.
    pub bundles: usize,
    /// Depth of the delivered payload queue.
    pub payloads: usize,
    /// Depth of the outgoing custody signal queue.
    pub records: usize,
    /// Custody ids currently outstanding (`current - oldest`).
    pub active: u64,
}
