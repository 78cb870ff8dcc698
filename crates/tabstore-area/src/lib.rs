#![forbid(unsafe_code)]

//! Storage area surface for tabstore.
//!
//! This crate defines the external-collaborator boundary the sync engine
//! builds on:
//!
//! - [`StorageArea`]: an opaque, synchronous, string-keyed dictionary.
//! - [`MemoryArea`]: the in-memory reference area (a cheap-clone handle).
//! - [`StorageEvent`] / [`StorageEventBus`]: the cross-context change
//!   signal. The platform (or the [`Origin`] harness) dispatches an event
//!   into a context's bus when *another* context mutates a shared area.
//! - [`Origin`]: a group of simulated tabs sharing one backing area, with
//!   mutations fanned out to every other tab's bus.
//! - [`Signal`] / [`Subscription`]: the single-threaded subscriber registry
//!   the buses are built on.
//!
//! # Invariants
//!
//! 1. Area reads and writes are synchronous; no operation suspends.
//! 2. A storage event is never delivered to the context that caused it.
//! 3. Signal dispatch is synchronous and in subscription order.
//! 4. Dropping a [`Subscription`] removes its callback before the next
//!    dispatch cycle.
//! 5. Two handles to the same backing store report the same [`AreaId`].

pub mod event;
pub mod memory;
pub mod origin;
pub mod signal;

pub use event::{StorageEvent, StorageEventBus};
pub use memory::MemoryArea;
pub use origin::{Origin, Tab, TabArea};
pub use signal::{Signal, Subscription};

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a storage area's backing store.
///
/// Used to match change notices and storage events to a binding's area
/// without comparing trait-object pointers. Every view of the same backing
/// store (for example the per-tab [`TabArea`]s of one [`Origin`]) shares
/// one `AreaId`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AreaId(u64);

static NEXT_AREA_ID: AtomicU64 = AtomicU64::new(1);

impl AreaId {
    /// Allocate the next process-unique area id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_AREA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "area#{}", self.0)
    }
}

/// An opaque, synchronous, string-keyed storage dictionary.
///
/// The sync engine treats implementations as external collaborators: it
/// only ever calls these methods, and it never assumes anything about how
/// values persist beyond "a later `get` observes an earlier `set`". The
/// storage is last-write-wins; there is no locking.
pub trait StorageArea {
    /// Identity of the backing store.
    fn id(&self) -> AreaId;

    /// Read the stored string for `key`, or `None` when absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &str);

    /// Remove the entry for `key`, if present.
    fn remove(&self, key: &str);

    /// Number of entries currently stored.
    fn len(&self) -> usize;

    /// Whether the area holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
