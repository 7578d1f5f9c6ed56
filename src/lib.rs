pub mod db;
pub mod opener;
pub mod page;
pub mod relay;
pub mod settings_form;
pub mod types;
pub mod watcher;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::db::SettingsStore;
use crate::page::PageAgent;
use crate::relay::Relay;
use crate::types::TabId;

/// Install the global tracing subscriber.
pub fn init_tracing() {
    // Only log WARN and above in production to avoid leaking note content
    #[cfg(debug_assertions)]
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();
    #[cfg(not(debug_assertions))]
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

/// Wires the relay and pages together over one settings store.
pub struct Bridge {
    store: SettingsStore,
    relay: Arc<Relay>,
    next_tab: AtomicU32,
}

impl Bridge {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            relay: Arc::new(Relay::new(store.clone())),
            store,
            next_tab: AtomicU32::new(1),
        }
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Start a page session for `url` on a fresh tab.
    pub fn open_page(&self, url: impl Into<String>) -> PageAgent {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        PageAgent::new(tab, url, self.relay.clone(), self.store.clone())
    }
}
