#![forbid(unsafe_code)]

//! Per-context wiring: the change hub plus the storage event bus.
//!
//! A [`SyncContext`] models one execution context (one "page"): every
//! binding created through it shares the same [`ChangeHub`] and listens on
//! the same [`StorageEventBus`]. The hub is constructed here and handed
//! into bindings by reference; there is no ambient global to reach for.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tabstore_area::{StorageArea, StorageEventBus, Tab, TabArea};

use crate::binding::Binding;
use crate::codec::{Codec, JsonCodec};
use crate::hub::ChangeHub;
use crate::options::BindingOptions;

/// The shared sync machinery of one execution context.
///
/// Cloning is cheap and shares the hub and bus, so a context can be handed
/// to every component that creates bindings.
#[derive(Clone)]
pub struct SyncContext {
    hub: Rc<ChangeHub>,
    events: Rc<StorageEventBus>,
}

impl SyncContext {
    /// Build a context around an existing storage event bus (usually a
    /// tab's bus from [`Origin::open_tab`](tabstore_area::Origin::open_tab)).
    #[must_use]
    pub fn new(events: Rc<StorageEventBus>) -> Self {
        Self {
            hub: Rc::new(ChangeHub::new()),
            events,
        }
    }

    /// Build a context for a [`Tab`], using the tab's event bus.
    #[must_use]
    pub fn for_tab(tab: &Tab) -> Self {
        Self::new(Rc::clone(tab.events()))
    }

    /// Build a standalone context with a private bus nothing dispatches
    /// into. Suits single-context applications and most tests.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Rc::new(StorageEventBus::new()))
    }

    /// The context's change hub.
    #[must_use]
    pub fn hub(&self) -> &Rc<ChangeHub> {
        &self.hub
    }

    /// The context's storage event bus.
    #[must_use]
    pub fn events(&self) -> &Rc<StorageEventBus> {
        &self.events
    }

    /// Bind `key` in `area` with the JSON codec and default options.
    #[must_use]
    pub fn bind<T, A>(&self, area: A, key: &str, default: Option<T>) -> Binding<T, A>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
        A: StorageArea + 'static,
    {
        Binding::new(self, area, key, default)
    }

    /// Bind with the JSON codec and explicit options.
    #[must_use]
    pub fn bind_with<T, A>(
        &self,
        area: A,
        key: &str,
        default: Option<T>,
        options: BindingOptions,
    ) -> Binding<T, A>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
        A: StorageArea + 'static,
    {
        Binding::with_options(self, area, key, default, options)
    }

    /// Bind with an explicit codec and options.
    #[must_use]
    pub fn bind_codec<T, A, C>(
        &self,
        area: A,
        key: &str,
        default: Option<T>,
        codec: C,
        options: BindingOptions,
    ) -> Binding<T, A, C>
    where
        T: Clone + 'static,
        A: StorageArea + 'static,
        C: Codec<T> + 'static,
    {
        Binding::with_codec(self, area, key, default, codec, options)
    }

    /// Bind a tab's view of its origin's shared area (JSON codec,
    /// default options).
    #[must_use]
    pub fn bind_tab<T>(&self, tab: &Tab, key: &str, default: Option<T>) -> Binding<T, TabArea>
    where
        T: Serialize + DeserializeOwned + Clone + 'static,
    {
        Binding::new(self, tab.area(), key, default)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("hub", &self.hub)
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabstore_area::MemoryArea;

    #[test]
    fn clones_share_the_hub() {
        let ctx = SyncContext::detached();
        let clone = ctx.clone();
        assert!(Rc::ptr_eq(ctx.hub(), clone.hub()));
        assert!(Rc::ptr_eq(ctx.events(), clone.events()));
    }

    #[test]
    fn bindings_from_clones_still_sync() {
        let ctx = SyncContext::detached();
        let area = MemoryArea::new();

        let a = ctx.bind::<u32, _>(area.clone(), "k", None);
        let b = ctx.clone().bind::<u32, _>(area, "k", None);

        a.set(Some(9));
        assert_eq!(b.get(), Some(9));
    }
}
