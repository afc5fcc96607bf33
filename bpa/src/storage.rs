use super::*;

/// Errors crossing the storage boundary are opaque to the engine.
pub type Error = Box<dyn core::error::Error + Send + Sync>;
pub type Result<T> = core::result::Result<T, Error>;

/// Identifies a byte string retained by a storage queue.
///
/// Sids are opaque to the engine: they are compared, stored in active-table
/// slots and handed back to the queue, nothing more.
pub type Sid = u64;

/// How long a storage operation may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Do not block.
    Check,
    /// Block indefinitely.
    Pend,
    /// Block for at most this many milliseconds.
    Millis(u32),
}

/// The storage capability the engine consumes.
///
/// A channel creates three queues at open: outgoing bundles, delivered
/// payloads and outgoing custody signals. Implementations must be
/// internally thread-safe; the engine makes no further assumption.
pub trait StorageService: Send + Sync {
    /// Creates a queue. `parm` is service-specific and passed through from
    /// the channel attributes.
    fn create(&self, parm: Option<&str>) -> Result<Box<dyn StorageQueue>>;
}

/// A bounded queue of retained byte strings.
///
/// Dequeued data stays retained under its [`Sid`] until `relinquish`; that
/// is what lets the engine re-`retrieve` a custody-tracked bundle for
/// retransmission long after it was first loaded.
pub trait StorageQueue: Send + Sync {
    /// Appends `data`. Returns `false` if the queue stayed full for the
    /// whole timeout.
    fn enqueue(&self, data: Bytes, timeout: Timeout) -> Result<bool>;

    /// Removes the head of the queue, retaining it under the returned
    /// [`Sid`]. Returns `None` if the queue stayed empty for the whole
    /// timeout.
    fn dequeue(&self, timeout: Timeout) -> Result<Option<(Bytes, Sid)>>;

    /// Random access to a retained byte string. Returns `None` when the
    /// sid is unknown or already relinquished.
    fn retrieve(&self, sid: Sid, timeout: Timeout) -> Result<Option<Bytes>>;

    /// Releases the retained copy under `sid`.
    fn relinquish(&self, sid: Sid) -> Result<()>;

    /// Queued plus retained items.
    fn count(&self) -> usize;
}
