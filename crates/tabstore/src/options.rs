#![forbid(unsafe_code)]

//! Per-binding configuration.

use crate::key::DEFAULT_SEPARATOR;

/// Configuration for one [`Binding`](crate::binding::Binding).
///
/// Options are captured at construction. Replacing them later through
/// [`Binding::set_options`](crate::binding::Binding::set_options) re-runs
/// the initialization effect and re-subscribes, mirroring a dependency
/// change in the original reactive model.
///
/// The codec is a generic parameter on the binding rather than an option
/// field, so a binding's value type and wire format are fixed at the type
/// level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BindingOptions {
    /// Optional namespace placed before the logical key.
    pub prefix: Option<String>,
    /// Joins prefix and key; defaults to `"."`. Ignored without a prefix.
    pub separator: String,
    /// When `false`, the binding stays uninitialized: its value is pinned
    /// to the default and storage is never consulted. Defaults to `true`.
    pub should_initialize: bool,
    /// Suppresses both publishing to and subscribing on the in-context
    /// change hub. Defaults to `false`.
    pub local_broadcast_disabled: bool,
    /// Suppresses the storage event bus subscription. Defaults to `false`.
    pub cross_tab_sync_disabled: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            separator: DEFAULT_SEPARATOR.to_owned(),
            should_initialize: true,
            local_broadcast_disabled: false,
            cross_tab_sync_disabled: false,
        }
    }
}

impl BindingOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace keys under `prefix`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Use `separator` between prefix and key.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Defer initialization: hold the binding uninitialized until
    /// [`Binding::set_should_initialize`](crate::binding::Binding::set_should_initialize)
    /// flips it on.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.should_initialize = false;
        self
    }

    /// Disable in-context sync with sibling bindings.
    #[must_use]
    pub fn without_local_broadcast(mut self) -> Self {
        self.local_broadcast_disabled = true;
        self
    }

    /// Disable cross-tab sync.
    #[must_use]
    pub fn without_cross_tab_sync(mut self) -> Self {
        self.cross_tab_sync_disabled = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let opts = BindingOptions::default();
        assert_eq!(opts.prefix, None);
        assert_eq!(opts.separator, ".");
        assert!(opts.should_initialize);
        assert!(!opts.local_broadcast_disabled);
        assert!(!opts.cross_tab_sync_disabled);
    }

    #[test]
    fn builders_set_fields() {
        let opts = BindingOptions::new()
            .prefix("acme")
            .separator("/")
            .deferred()
            .without_local_broadcast()
            .without_cross_tab_sync();
        assert_eq!(opts.prefix.as_deref(), Some("acme"));
        assert_eq!(opts.separator, "/");
        assert!(!opts.should_initialize);
        assert!(opts.local_broadcast_disabled);
        assert!(opts.cross_tab_sync_disabled);
    }
}
