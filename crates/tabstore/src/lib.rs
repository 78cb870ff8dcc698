#![forbid(unsafe_code)]

//! Reactive storage bindings with in-context broadcast and cross-tab sync.
//!
//! A [`Binding`] gives typed, cached access to one slot of a string-keyed
//! [`StorageArea`] and keeps that cache consistent with everyone else
//! looking at the same slot:
//!
//! - sibling bindings in the same context, through the [`ChangeHub`]
//!   (synchronous dispatch, self-notifications suppressed by binding id);
//! - bindings in other contexts ("tabs"), through the
//!   [`StorageEventBus`] carrying the platform's storage-change signal.
//!
//! Values cross the storage boundary through a [`Codec`] (JSON via serde
//! by default) and keys are namespaced with an optional prefix.
//!
//! # Quick start
//!
//! ```
//! use tabstore::SyncContext;
//! use tabstore_area::MemoryArea;
//!
//! let ctx = SyncContext::detached();
//! let area = MemoryArea::labeled("local");
//!
//! let a = ctx.bind::<String, _>(area.clone(), "greeting", Some("hello".into()));
//! let b = ctx.bind::<String, _>(area, "greeting", Some("hello".into()));
//!
//! a.set(Some("howdy".into()));
//! assert_eq!(b.get().as_deref(), Some("howdy"));
//! ```
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous: `Rc` + `RefCell` shared
//! state, callbacks dispatched in subscription order, no locks and nothing
//! to await. Storage is last-write-wins; the hub and bus re-synchronize
//! cached views, they do not provide mutual exclusion or cross-context
//! ordering.
//!
//! # Error policy
//!
//! Storage is an unversioned external surface another actor may have
//! written incompatible data into, so no binding operation panics or
//! returns an error: encode failures, decode failures, and round-trip
//! mismatches are logged through `tracing` with the offending key and
//! payload, and the caller observes no state change: reads keep the
//! last-known-good cache, writes are dropped.

pub mod binding;
pub mod codec;
pub mod context;
pub mod hub;
pub mod key;
pub mod options;

pub use binding::{Binding, BindingId};
pub use codec::{Codec, CodecError, FnCodec, JsonCodec};
pub use context::SyncContext;
pub use hub::{ChangeHub, ChangeNotice, SUBSCRIBER_SOFT_CAP};
pub use key::{DEFAULT_SEPARATOR, scoped_key};
pub use options::BindingOptions;

pub use tabstore_area::{
    AreaId, MemoryArea, Origin, Signal, StorageArea, StorageEvent, StorageEventBus, Subscription,
    Tab, TabArea,
};
