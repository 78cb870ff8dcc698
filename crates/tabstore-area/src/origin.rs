#![forbid(unsafe_code)]

//! Simulated same-origin tab group.
//!
//! An [`Origin`] owns one shared backing area and hands out [`Tab`]s. Each
//! tab gets its own [`StorageEventBus`] plus a [`TabArea`] view of the
//! shared backing. A mutation made through a tab's area is fanned out as a
//! [`StorageEvent`] to every *other* tab's bus, never to the tab that
//! made the change, matching the platform rule that the mutating context
//! does not observe its own storage event.
//!
//! # Invariants
//!
//! 1. All [`TabArea`]s of one origin report the backing's [`AreaId`].
//! 2. A write that leaves the stored string unchanged dispatches no event.
//! 3. Removing an absent key dispatches no event.
//! 4. A closed tab (its bus dropped) stops receiving events; dead entries
//!    are pruned during fan-out.
//!
//! Mutating the backing [`MemoryArea`] directly bypasses fan-out entirely;
//! use [`Origin::dispatch_external`] to model an actor outside the tab
//! group (devtools, another process) that should still be observed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::event::{StorageEvent, StorageEventBus};
use crate::memory::MemoryArea;
use crate::{AreaId, StorageArea};

struct OriginInner {
    backing: MemoryArea,
    tabs: RefCell<Vec<(u64, Weak<StorageEventBus>)>>,
    next_tab: Cell<u64>,
}

impl OriginInner {
    /// Deliver `event` to every tab except `source`. `source == u64::MAX`
    /// means "no tab", used for external mutations.
    fn fan_out(&self, source: u64, event: &StorageEvent) {
        let recipients: Vec<Rc<StorageEventBus>> = {
            let mut tabs = self.tabs.borrow_mut();
            tabs.retain(|(_, bus)| bus.strong_count() > 0);
            tabs.iter()
                .filter(|(id, _)| *id != source)
                .filter_map(|(_, bus)| bus.upgrade())
                .collect()
        };
        for bus in recipients {
            bus.dispatch(event);
        }
    }
}

/// A group of simulated tabs sharing one storage area.
#[derive(Clone)]
pub struct Origin {
    inner: Rc<OriginInner>,
}

impl Origin {
    /// Create an origin with a fresh backing area labeled `"local"`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_area(MemoryArea::labeled("local"))
    }

    /// Create an origin over an existing backing area.
    #[must_use]
    pub fn with_area(backing: MemoryArea) -> Self {
        Self {
            inner: Rc::new(OriginInner {
                backing,
                tabs: RefCell::new(Vec::new()),
                next_tab: Cell::new(0),
            }),
        }
    }

    /// Open a new tab: a per-tab event bus plus a view of the shared area.
    #[must_use]
    pub fn open_tab(&self) -> Tab {
        let id = self.inner.next_tab.get();
        self.inner.next_tab.set(id + 1);

        let events = Rc::new(StorageEventBus::new());
        self.inner
            .tabs
            .borrow_mut()
            .push((id, Rc::downgrade(&events)));

        tracing::debug!(tab = id, area = %self.inner.backing.id(), "opened tab");
        Tab {
            id,
            area: TabArea {
                tab: id,
                backing: self.inner.backing.clone(),
                origin: Rc::downgrade(&self.inner),
            },
            events,
        }
    }

    /// The shared backing area. Direct mutations through this handle are
    /// silent; pair them with [`Origin::dispatch_external`] when the tabs
    /// should notice.
    #[must_use]
    pub fn area(&self) -> &MemoryArea {
        &self.inner.backing
    }

    /// Apply a mutation as an actor outside the tab group: writes the
    /// backing area and notifies *every* tab.
    pub fn dispatch_external(&self, key: &str, new_value: Option<&str>) {
        match new_value {
            Some(v) => self.inner.backing.set(key, v),
            None => self.inner.backing.remove(key),
        }
        let event = StorageEvent {
            area: self.inner.backing.id(),
            key: key.to_owned(),
            new_value: new_value.map(str::to_owned),
        };
        self.inner.fan_out(u64::MAX, &event);
    }

    /// Number of tabs whose event bus is still alive.
    #[must_use]
    pub fn tab_count(&self) -> usize {
        let mut tabs = self.inner.tabs.borrow_mut();
        tabs.retain(|(_, bus)| bus.strong_count() > 0);
        tabs.len()
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin")
            .field("area", &self.inner.backing)
            .field("tabs", &self.tab_count())
            .finish()
    }
}

/// One simulated tab: an event bus and a view of the origin's shared area.
pub struct Tab {
    id: u64,
    area: TabArea,
    events: Rc<StorageEventBus>,
}

impl Tab {
    /// This tab's view of the shared storage area.
    #[must_use]
    pub fn area(&self) -> TabArea {
        self.area.clone()
    }

    /// This tab's storage event bus.
    #[must_use]
    pub fn events(&self) -> &Rc<StorageEventBus> {
        &self.events
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("area", &self.area.backing)
            .finish()
    }
}

/// A per-tab [`StorageArea`] over an origin's shared backing.
///
/// Reads go straight to the backing. Mutations go to the backing and then
/// fan a [`StorageEvent`] out to the sibling tabs (only when the stored
/// string actually changed).
#[derive(Clone)]
pub struct TabArea {
    tab: u64,
    backing: MemoryArea,
    origin: Weak<OriginInner>,
}

impl TabArea {
    fn fan_out(&self, key: &str, new_value: Option<&str>) {
        if let Some(origin) = self.origin.upgrade() {
            let event = StorageEvent {
                area: self.backing.id(),
                key: key.to_owned(),
                new_value: new_value.map(str::to_owned),
            };
            origin.fan_out(self.tab, &event);
        }
    }
}

impl StorageArea for TabArea {
    fn id(&self) -> AreaId {
        self.backing.id()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.backing.get(key)
    }

    fn set(&self, key: &str, value: &str) {
        if self.backing.get(key).as_deref() == Some(value) {
            return;
        }
        self.backing.set(key, value);
        self.fan_out(key, Some(value));
    }

    fn remove(&self, key: &str) {
        if self.backing.get(key).is_none() {
            return;
        }
        self.backing.remove(key);
        self.fan_out(key, None);
    }

    fn len(&self) -> usize {
        self.backing.len()
    }
}

impl std::fmt::Debug for TabArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabArea")
            .field("tab", &self.tab)
            .field("backing", &self.backing)
            .finish()
    }
}
