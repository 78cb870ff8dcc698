#![forbid(unsafe_code)]

//! In-memory storage area.
//!
//! [`MemoryArea`] is the reference [`StorageArea`] implementation: a
//! string-keyed map behind a cheap-clone handle. Clones share the same
//! backing store and report the same [`AreaId`], which is how two bindings
//! (or two tabs) end up addressing the same slot.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::{AreaId, StorageArea};

struct MemoryAreaInner {
    id: AreaId,
    label: String,
    entries: RefCell<BTreeMap<String, String>>,
}

/// An in-memory [`StorageArea`]. Cloning shares the backing store.
#[derive(Clone)]
pub struct MemoryArea {
    inner: Rc<MemoryAreaInner>,
}

impl MemoryArea {
    /// Create an empty area with an auto-generated label.
    #[must_use]
    pub fn new() -> Self {
        let id = AreaId::next();
        Self::with_parts(id, format!("{id}"))
    }

    /// Create an empty area carrying a debug label (e.g. `"local"` or
    /// `"session"`) used in log output.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::with_parts(AreaId::next(), label.into())
    }

    fn with_parts(id: AreaId, label: String) -> Self {
        Self {
            inner: Rc::new(MemoryAreaInner {
                id,
                label,
                entries: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// The area's debug label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Copy of all entries, for inspection in tests and demos.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.entries.borrow().clone()
    }

    /// Remove every entry (models an external purge of the area).
    pub fn purge(&self) {
        self.inner.entries.borrow_mut().clear();
    }
}

impl Default for MemoryArea {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageArea for MemoryArea {
    fn id(&self) -> AreaId {
        self.inner.id
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.inner.entries.borrow_mut().remove(key);
    }

    fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

impl std::fmt::Debug for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArea")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("entries", &self.len())
            .finish()
    }
}
