/*!
A BPv6 store-and-forward endpoint engine.

The [`channel::Channel`] is the unit of operation: an application stores
payloads on one side and loads encoded bundles on the other, feeds received
bundles in and accepts delivered payloads out. Between those interfaces the
engine owns bundle construction, custody tracking with retransmission, and
aggregate custody signal generation and ingestion.

The engine is a blocking-call state machine: one or more threads call
[`channel::Channel::load`] to drain toward the link, one calls
[`channel::Channel::process`] with traffic from the link, and application
threads call [`channel::Channel::store`] and [`channel::Channel::accept`].
All suspension happens at storage-service timeouts and the active-table
condition variable.

Storage and time are capabilities supplied at open: see
[`storage::StorageService`] and [`clock::Clock`]. A bounded in-memory
storage service is provided in [`storage_mem`].
*/

pub mod cbuf;
pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod flags;
pub mod rb_tree;
pub mod stats;
pub mod storage;
pub mod storage_mem;

mod custody;
mod stored;

#[cfg(test)]
mod rb_tree_tests;

use tracing::{debug, warn};

pub use bytes::Bytes;
pub use channel::{Channel, Disposition};
pub use error::Error;
pub use kestrel_bpv6::eid::{Eid, Route};
