#![forbid(unsafe_code)]

//! In-context change broadcaster.
//!
//! The [`ChangeHub`] is the well-known "value changed" channel shared by
//! every binding in one context. It is deliberately not a module-global:
//! callers construct one (usually via
//! [`SyncContext`](crate::context::SyncContext)) and pass a reference into
//! each binding, so ownership and lifetime stay explicit.
//!
//! # Invariants
//!
//! 1. Dispatch is synchronous and in subscription order: when
//!    [`ChangeHub::publish`] returns, every live subscriber has run.
//! 2. Delivery never crosses execution contexts; cross-tab propagation is
//!    the storage event bus's job.
//! 3. Every notice carries the originating binding's id so a binding can
//!    suppress reactions to its own writes.
//! 4. Subscribers are never dropped for capacity reasons. Crossing
//!    [`SUBSCRIBER_SOFT_CAP`] live subscribers logs a warning: a leak
//!    guard, not a functional limit.

use tabstore_area::{AreaId, Signal, Subscription};

use crate::binding::BindingId;

/// Live-subscriber count above which [`ChangeHub::subscribe`] warns.
pub const SUBSCRIBER_SOFT_CAP: usize = 100;

/// A change notification published by a binding after a committed write
/// or clear.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeNotice {
    /// The fully scoped storage key that changed.
    pub key: String,
    /// Identity of the storage area that was written.
    pub area: AreaId,
    /// The binding that performed the write.
    pub origin: BindingId,
}

/// Shared broadcast point for change notices within one context.
pub struct ChangeHub {
    signal: Signal<ChangeNotice>,
}

impl ChangeHub {
    /// Create a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Register a handler for every published notice. Handlers filter by
    /// key, area, and origin themselves.
    #[must_use]
    pub fn subscribe(&self, handler: impl Fn(&ChangeNotice) + 'static) -> Subscription {
        let live = self.signal.len();
        if live >= SUBSCRIBER_SOFT_CAP {
            tracing::warn!(
                live,
                cap = SUBSCRIBER_SOFT_CAP,
                "change hub subscriber count exceeds the soft cap; \
                 check for leaked bindings"
            );
        }
        self.signal.connect(handler)
    }

    /// Publish a change notice to all subscribers, synchronously.
    pub fn publish(&self, key: &str, area: AreaId, origin: BindingId) {
        tracing::trace!(%key, %area, %origin, "publishing change notice");
        self.signal.emit(&ChangeNotice {
            key: key.to_owned(),
            area,
            origin,
        });
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.signal.len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
