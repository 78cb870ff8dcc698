#![forbid(unsafe_code)]

//! Walks the whole sync surface: a settings struct bound in two simulated
//! tabs plus a sibling binding in the first tab, with every propagation
//! step printed. `RUST_LOG=trace` shows the hub and bus dispatch too.

use serde::{Deserialize, Serialize};
use tabstore::{BindingOptions, SyncContext};
use tabstore_area::Origin;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Settings {
    theme: String,
    font_size: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let origin = Origin::new();
    let tab_a = origin.open_tab();
    let tab_b = origin.open_tab();

    let ctx_a = SyncContext::for_tab(&tab_a);
    let ctx_b = SyncContext::for_tab(&tab_b);

    let opts = BindingOptions::new().prefix("demo");
    let default = Settings {
        theme: "light".into(),
        font_size: 12,
    };

    let a = ctx_a.bind_with::<Settings, _>(
        tab_a.area(),
        "settings",
        Some(default.clone()),
        opts.clone(),
    );
    let sibling = ctx_a.bind_with::<Settings, _>(
        tab_a.area(),
        "settings",
        Some(default.clone()),
        opts.clone(),
    );
    let b = ctx_b.bind_with::<Settings, _>(tab_b.area(), "settings", Some(default), opts);

    let _watch = b.watch(|value| {
        tracing::info!(?value, "tab B observed a change");
    });

    tracing::info!(key = %a.scoped_key(), initial = ?a.get(), "bindings ready");

    tracing::info!("tab A switches to the dark theme");
    a.set(Some(Settings {
        theme: "dark".into(),
        font_size: 14,
    }));

    tracing::info!(sibling = ?sibling.get(), "sibling in tab A synced through the hub");
    tracing::info!(tab_b = ?b.get(), "tab B synced through the storage event bus");
    tracing::info!(stored = ?origin.area().snapshot(), "raw storage contents");

    tracing::info!("an external actor corrupts the stored entry");
    origin.dispatch_external("demo.settings", Some("{not json"));
    tracing::info!(tab_b = ?b.get(), "tab B kept its last-known-good value");

    tracing::info!("tab B clears the slot");
    b.clear();
    tracing::info!(tab_a = ?a.get(), tab_b = ?b.get(), "both tabs back on their defaults");
    tracing::info!(stored = ?origin.area().snapshot(), "raw storage contents");
}
