#![forbid(unsafe_code)]

//! The binding engine: a cached, synchronized view of one storage slot.
//!
//! A [`Binding<T, A, C>`] owns the decoded value cached for one scoped key
//! in one storage area and keeps it consistent with that slot through two
//! subscriptions: the in-context [`ChangeHub`] (sibling bindings) and the
//! context's [`StorageEventBus`] (other tabs). Writes flow
//! binding → codec → area → hub; external changes flow bus → refresh;
//! sibling changes flow hub → refresh.
//!
//! # State machine
//!
//! Uninitialized → Initialized, with transient updates inside `set` /
//! `clear` / `refresh`. A binding built with
//! [`BindingOptions::deferred`](crate::options::BindingOptions::deferred)
//! stays Uninitialized (value pinned to the default, storage untouched)
//! until [`set_should_initialize`](Binding::set_should_initialize) flips
//! it, which runs exactly one refresh.
//!
//! # Invariants
//!
//! 1. `get()` is O(1) and performs no storage I/O.
//! 2. After a committed `set`, every sibling binding on the same scoped
//!    key and area has already refreshed (hub dispatch is synchronous).
//! 3. A binding never refreshes in response to its own hub notice.
//! 4. Watchers fire only when the cached value's encoded form changes.
//! 5. No operation panics or returns an error to the caller: codec
//!    failures are logged and degrade to "no state change".
//! 6. Dropping the binding (or replacing its options) releases both
//!    subscriptions before anything else happens.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tabstore_area::{Signal, StorageArea, StorageEventBus, Subscription};

use crate::codec::{Codec, JsonCodec};
use crate::context::SyncContext;
use crate::hub::ChangeHub;
use crate::key::scoped_key;
use crate::options::BindingOptions;

/// Process-unique identity of one binding instance.
///
/// Tags outgoing hub notices so the writer can ignore its own broadcast.
/// Storage events carry no such tag: they originate in another execution
/// context, which by definition is never this binding.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BindingId(u64);

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

impl BindingId {
    /// Allocate the next process-unique binding id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

struct BindState<T> {
    value: Option<T>,
    initialized: bool,
}

struct Shared<T: 'static, A, C> {
    id: BindingId,
    hub: Rc<ChangeHub>,
    bus: Rc<StorageEventBus>,
    area: A,
    codec: C,
    logical: String,
    default: Option<T>,
    options: RefCell<BindingOptions>,
    scoped: RefCell<String>,
    state: RefCell<BindState<T>>,
    watchers: Signal<Option<T>>,
}

impl<T, A, C> Shared<T, A, C>
where
    T: Clone + 'static,
    A: StorageArea + 'static,
    C: Codec<T> + 'static,
{
    /// Re-encode the cached value for comparison against stored text.
    /// An encode failure here is logged at debug and treated as "absent",
    /// which makes the comparison conservative (forces a refresh/commit).
    fn encoded_cache(&self) -> Option<String> {
        let state = self.state.borrow();
        let value = state.value.as_ref()?;
        match self.codec.encode(value) {
            Ok(encoded) => Some(encoded),
            Err(err) => {
                tracing::debug!(
                    key = %self.scoped.borrow().as_str(),
                    %err,
                    "cached value failed to re-encode during comparison"
                );
                None
            }
        }
    }

    /// Re-read the slot and update the cache when the stored text differs
    /// from the cache's encoded form. No-op while uninitialized. Decode
    /// failures keep the last-known-good cache.
    fn refresh(&self) {
        if !self.state.borrow().initialized {
            return;
        }
        let scoped = self.scoped.borrow().clone();
        let live = self.area.get(&scoped);
        if live == self.encoded_cache() {
            return;
        }
        let next = match &live {
            None => self.default.clone(),
            Some(raw) => match self.codec.decode(raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::error!(
                        key = %scoped,
                        raw = %raw,
                        %err,
                        "stored value could not be decoded; keeping cached value"
                    );
                    return;
                }
            },
        };
        self.state.borrow_mut().value = next;
        self.notify_watchers();
    }

    fn write(&self, value: T) {
        if !self.state.borrow().initialized {
            tracing::trace!(
                key = %self.scoped.borrow().as_str(),
                "write ignored on uninitialized binding"
            );
            return;
        }
        let scoped = self.scoped.borrow().clone();
        let encoded = match self.codec.encode(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!(
                    key = %scoped,
                    %err,
                    "value could not be encoded; write aborted"
                );
                return;
            }
        };
        if self.encoded_cache().as_deref() == Some(encoded.as_str()) {
            tracing::trace!(key = %scoped, "write skipped, encoded form unchanged");
            return;
        }
        // Decode-test before committing so an asymmetric codec fails the
        // write instead of poisoning the slot.
        if let Err(err) = self.codec.decode(&encoded) {
            tracing::error!(
                key = %scoped,
                encoded = %encoded,
                %err,
                "encoded value failed the decode round-trip test; write aborted"
            );
            return;
        }
        self.state.borrow_mut().value = Some(value);
        self.area.set(&scoped, &encoded);
        self.publish(&scoped);
        self.notify_watchers();
    }

    fn clear(&self) {
        if !self.state.borrow().initialized {
            tracing::trace!(
                key = %self.scoped.borrow().as_str(),
                "clear ignored on uninitialized binding"
            );
            return;
        }
        let scoped = self.scoped.borrow().clone();
        if self.area.get(&scoped).is_none() {
            return;
        }
        let before = self.encoded_cache();
        self.state.borrow_mut().value = self.default.clone();
        self.area.remove(&scoped);
        self.publish(&scoped);
        if before != self.encoded_cache() {
            self.notify_watchers();
        }
    }

    fn publish(&self, scoped: &str) {
        if self.options.borrow().local_broadcast_disabled {
            return;
        }
        self.hub.publish(scoped, self.area.id(), self.id);
    }

    /// Pin the cache to the default and mark the binding uninitialized.
    fn reset_to_default(&self) {
        let before = self.encoded_cache();
        {
            let mut state = self.state.borrow_mut();
            state.value = self.default.clone();
            state.initialized = false;
        }
        if before != self.encoded_cache() {
            self.notify_watchers();
        }
    }

    fn notify_watchers(&self) {
        let snapshot = self.state.borrow().value.clone();
        self.watchers.emit(&snapshot);
    }
}

/// A synchronized, cached view of one scoped key in one storage area.
///
/// Create bindings through [`SyncContext::bind`] or the constructors here.
/// The default codec is [`JsonCodec`]; any [`Codec`] works via
/// [`Binding::with_codec`].
pub struct Binding<T, A, C = JsonCodec<T>>
where
    T: Clone + 'static,
    A: StorageArea + 'static,
    C: Codec<T> + 'static,
{
    shared: Rc<Shared<T, A, C>>,
    guards: RefCell<Vec<Subscription>>,
}

impl<T, A> Binding<T, A, JsonCodec<T>>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
    A: StorageArea + 'static,
{
    /// Bind `key` in `area` with the JSON codec and default options.
    #[must_use]
    pub fn new(ctx: &SyncContext, area: A, key: &str, default: Option<T>) -> Self {
        Self::with_options(ctx, area, key, default, BindingOptions::default())
    }

    /// Bind with the JSON codec and explicit options.
    #[must_use]
    pub fn with_options(
        ctx: &SyncContext,
        area: A,
        key: &str,
        default: Option<T>,
        options: BindingOptions,
    ) -> Self {
        Self::with_codec(ctx, area, key, default, JsonCodec::default(), options)
    }
}

impl<T, A, C> Binding<T, A, C>
where
    T: Clone + 'static,
    A: StorageArea + 'static,
    C: Codec<T> + 'static,
{
    /// Bind with an explicit codec and options.
    #[must_use]
    pub fn with_codec(
        ctx: &SyncContext,
        area: A,
        key: &str,
        default: Option<T>,
        codec: C,
        options: BindingOptions,
    ) -> Self {
        let binding = Self {
            shared: Rc::new(Shared {
                id: BindingId::next(),
                hub: Rc::clone(ctx.hub()),
                bus: Rc::clone(ctx.events()),
                area,
                codec,
                logical: key.to_owned(),
                default: default.clone(),
                options: RefCell::new(options),
                scoped: RefCell::new(String::new()),
                state: RefCell::new(BindState {
                    value: default,
                    initialized: false,
                }),
                watchers: Signal::new(),
            }),
            guards: RefCell::new(Vec::new()),
        };
        binding.rewire();
        binding
    }

    /// Tear down and re-acquire everything that depends on the options:
    /// scoped key, initialization state, hub and bus subscriptions. Old
    /// guards are dropped first, so cleanup always precedes setup.
    fn rewire(&self) {
        self.guards.borrow_mut().clear();

        let options = self.shared.options.borrow().clone();
        let scoped = scoped_key(
            &self.shared.logical,
            options.prefix.as_deref(),
            &options.separator,
        );
        *self.shared.scoped.borrow_mut() = scoped.clone();

        if options.should_initialize {
            self.shared.state.borrow_mut().initialized = true;
            self.shared.refresh();
        } else {
            self.shared.reset_to_default();
        }

        let mut guards = self.guards.borrow_mut();
        if !options.local_broadcast_disabled {
            let weak = Rc::downgrade(&self.shared);
            guards.push(self.shared.hub.subscribe(move |notice| {
                let Some(shared) = weak.upgrade() else { return };
                if notice.area != shared.area.id() || notice.origin == shared.id {
                    return;
                }
                if *shared.scoped.borrow() != notice.key {
                    return;
                }
                shared.refresh();
            }));
        }
        if !options.cross_tab_sync_disabled {
            let weak = Rc::downgrade(&self.shared);
            guards.push(self.shared.bus.subscribe(move |event| {
                let Some(shared) = weak.upgrade() else { return };
                if event.area != shared.area.id() {
                    return;
                }
                if *shared.scoped.borrow() != event.key {
                    return;
                }
                shared.refresh();
            }));
        }
    }

    /// Clone of the cached value. O(1), no storage I/O.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.shared.state.borrow().value.clone()
    }

    /// Borrow the cached value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.shared.state.borrow().value.as_ref())
    }

    /// Write `Some(value)` to the slot, or delegate to [`clear`](Self::clear)
    /// on `None`.
    ///
    /// No-op while uninitialized, when the encoded form is unchanged, or
    /// when the codec fails (logged; prior state preserved). On commit the
    /// cache, the area, the hub, and the watchers all observe the change
    /// before this returns.
    pub fn set(&self, value: Option<T>) {
        match value {
            Some(value) => self.shared.write(value),
            None => self.shared.clear(),
        }
    }

    /// Remove the slot's entry and reset the cache to the default.
    /// Already-absent entries are a silent no-op (nothing is published).
    pub fn clear(&self) {
        self.shared.clear();
    }

    /// Re-read the slot and reconcile the cache with it. Only an actual
    /// difference updates the cache and notifies watchers.
    pub fn refresh(&self) {
        self.shared.refresh();
    }

    /// Whether the binding has seeded its cache from storage.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.shared.state.borrow().initialized
    }

    /// The fully scoped storage key currently in use.
    #[must_use]
    pub fn scoped_key(&self) -> String {
        self.shared.scoped.borrow().clone()
    }

    /// The logical key this binding was created with.
    #[must_use]
    pub fn logical_key(&self) -> &str {
        &self.shared.logical
    }

    /// This binding's identity, as carried on its hub notices.
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.shared.id
    }

    /// Observe cache changes. The callback receives the new cached value
    /// and fires only when the value actually changed.
    #[must_use]
    pub fn watch(&self, f: impl Fn(&Option<T>) + 'static) -> Subscription {
        self.shared.watchers.connect(f)
    }

    /// Replace the options wholesale and re-run the initialization and
    /// subscription effects.
    pub fn set_options(&self, options: BindingOptions) {
        *self.shared.options.borrow_mut() = options;
        self.rewire();
    }

    /// Flip deferred initialization on or off. Turning it on runs exactly
    /// one refresh; turning it off pins the cache back to the default.
    pub fn set_should_initialize(&self, should_initialize: bool) {
        let changed = {
            let mut options = self.shared.options.borrow_mut();
            let changed = options.should_initialize != should_initialize;
            options.should_initialize = should_initialize;
            changed
        };
        if changed {
            self.rewire();
        }
    }
}

impl<T, A, C> std::fmt::Debug for Binding<T, A, C>
where
    T: Clone + 'static,
    A: StorageArea + 'static,
    C: Codec<T> + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.shared.id)
            .field("key", &*self.shared.scoped.borrow())
            .field("initialized", &self.shared.state.borrow().initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, FnCodec};
    use std::cell::Cell;
    use tabstore_area::MemoryArea;

    fn ctx() -> SyncContext {
        SyncContext::detached()
    }

    #[test]
    fn seeds_default_when_slot_is_empty() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area, "k", Some("fallback".into()));

        assert!(b.initialized());
        assert_eq!(b.get().as_deref(), Some("fallback"));
    }

    #[test]
    fn seeds_from_stored_value() {
        let ctx = ctx();
        let area = MemoryArea::new();
        area.set("k", "\"stored\"");

        let b = Binding::<String, _>::new(&ctx, area, "k", Some("fallback".into()));
        assert_eq!(b.get().as_deref(), Some("stored"));
    }

    #[test]
    fn set_commits_encoding_to_the_area() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area.clone(), "k", None);

        b.set(Some("x".into()));
        assert_eq!(area.get("k").as_deref(), Some("\"x\""));
        assert_eq!(b.get().as_deref(), Some("x"));
    }

    #[test]
    fn set_none_clears_the_slot() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area.clone(), "k", Some("fallback".into()));

        b.set(Some("x".into()));
        b.set(None);

        assert_eq!(area.get("k"), None);
        assert_eq!(b.get().as_deref(), Some("fallback"));
    }

    #[test]
    fn clear_on_absent_slot_publishes_nothing() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area, "k", Some("fallback".into()));

        let notices = Rc::new(Cell::new(0usize));
        let n = Rc::clone(&notices);
        let _sub = ctx.hub().subscribe(move |_| n.set(n.get() + 1));

        b.clear();
        assert_eq!(notices.get(), 0);
    }

    #[test]
    fn clear_on_present_slot_publishes_once() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area.clone(), "k", Some("fallback".into()));
        b.set(Some("x".into()));

        let notices = Rc::new(Cell::new(0usize));
        let n = Rc::clone(&notices);
        let _sub = ctx.hub().subscribe(move |_| n.set(n.get() + 1));

        b.clear();
        assert_eq!(notices.get(), 1);
        assert_eq!(area.get("k"), None);
        assert_eq!(b.get().as_deref(), Some("fallback"));
    }

    #[test]
    fn unchanged_write_is_suppressed() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<u32, _>::new(&ctx, area, "k", None);

        let notices = Rc::new(Cell::new(0usize));
        let n = Rc::clone(&notices);
        let _sub = ctx.hub().subscribe(move |_| n.set(n.get() + 1));

        b.set(Some(7));
        b.set(Some(7));
        assert_eq!(notices.get(), 1, "identical re-write must not publish");
    }

    #[test]
    fn deferred_binding_pins_default_and_ignores_storage() {
        let ctx = ctx();
        let area = MemoryArea::new();
        area.set("k", "\"stored\"");

        let b = Binding::<String, _>::with_options(
            &ctx,
            area.clone(),
            "k",
            Some("fallback".into()),
            BindingOptions::new().deferred(),
        );
        assert!(!b.initialized());
        assert_eq!(b.get().as_deref(), Some("fallback"));

        // Writes are guarded until initialization.
        b.set(Some("ignored".into()));
        assert_eq!(area.get("k").as_deref(), Some("\"stored\""));

        b.set_should_initialize(true);
        assert!(b.initialized());
        assert_eq!(b.get().as_deref(), Some("stored"));
    }

    #[test]
    fn flipping_initialization_off_restores_the_default() {
        let ctx = ctx();
        let area = MemoryArea::new();
        area.set("k", "\"stored\"");

        let b = Binding::<String, _>::new(&ctx, area, "k", Some("fallback".into()));
        assert_eq!(b.get().as_deref(), Some("stored"));

        b.set_should_initialize(false);
        assert!(!b.initialized());
        assert_eq!(b.get().as_deref(), Some("fallback"));
    }

    #[test]
    fn corrupt_stored_text_keeps_last_known_good_cache() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<u32, _>::new(&ctx, area.clone(), "k", None);

        b.set(Some(3));
        area.set("k", "{corrupt");
        b.refresh();

        assert_eq!(b.get(), Some(3), "decode failure must not lose the cache");
    }

    #[test]
    fn asymmetric_codec_aborts_the_write() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let codec = FnCodec::new(
            |v: &u32| Ok::<_, CodecError>(v.to_string()),
            |_raw: &str| Err::<u32, _>(CodecError::decode("always fails")),
        );
        let b = Binding::with_codec(
            &ctx,
            area.clone(),
            "k",
            None,
            codec,
            BindingOptions::default(),
        );

        b.set(Some(5));
        assert_eq!(area.get("k"), None, "round-trip failure must abort the write");
        assert_eq!(b.get(), None);
    }

    #[test]
    fn encode_failure_aborts_the_write() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let codec = FnCodec::new(
            |_v: &u32| Err::<String, _>(CodecError::encode("unserializable")),
            |raw: &str| raw.parse::<u32>().map_err(CodecError::decode),
        );
        let b = Binding::with_codec(
            &ctx,
            area.clone(),
            "k",
            None,
            codec,
            BindingOptions::default(),
        );

        b.set(Some(5));
        assert_eq!(area.get("k"), None);
        assert_eq!(b.get(), None);
    }

    #[test]
    fn watchers_fire_only_on_actual_change() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<u32, _>::new(&ctx, area, "k", None);

        let fired = Rc::new(Cell::new(0usize));
        let f = Rc::clone(&fired);
        let _watch = b.watch(move |_| f.set(f.get() + 1));

        b.set(Some(1));
        b.set(Some(1));
        b.refresh();
        assert_eq!(fired.get(), 1);

        b.set(Some(2));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn clear_to_an_equal_default_removes_the_entry_without_notifying() {
        let ctx = ctx();
        let area = MemoryArea::new();
        area.set("k", "\"d\"");
        let b = Binding::<String, _>::new(&ctx, area.clone(), "k", Some("d".into()));

        let fired = Rc::new(Cell::new(0usize));
        let f = Rc::clone(&fired);
        let _watch = b.watch(move |_| f.set(f.get() + 1));

        b.clear();
        assert_eq!(area.get("k"), None, "entry is still removed");
        assert_eq!(b.get().as_deref(), Some("d"));
        assert_eq!(fired.get(), 0, "cache never changed, watchers stay quiet");
    }

    #[test]
    fn options_change_moves_the_slot() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<String, _>::new(&ctx, area.clone(), "k", None);
        b.set(Some("plain".into()));
        assert_eq!(b.scoped_key(), "k");

        b.set_options(BindingOptions::new().prefix("acme"));
        assert_eq!(b.scoped_key(), "acme.k");
        assert_eq!(b.get(), None, "new slot is empty, cache follows");

        b.set(Some("scoped".into()));
        assert_eq!(area.get("acme.k").as_deref(), Some("\"scoped\""));
        assert_eq!(area.get("k").as_deref(), Some("\"plain\""), "old slot untouched");
    }

    #[test]
    fn dropped_binding_leaves_no_subscriptions() {
        let ctx = ctx();
        let area = MemoryArea::new();
        let b = Binding::<u32, _>::new(&ctx, area, "k", None);
        assert_eq!(ctx.hub().subscriber_count(), 1);
        assert_eq!(ctx.events().listener_count(), 1);

        drop(b);
        assert_eq!(ctx.hub().subscriber_count(), 0);
        assert_eq!(ctx.events().listener_count(), 0);
    }

    #[test]
    fn binding_ids_are_unique() {
        assert_ne!(BindingId::next(), BindingId::next());
    }
}
