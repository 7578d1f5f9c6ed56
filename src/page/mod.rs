//! Page side of the bridge: watches the search page for queries, talks to the
//! relay, and paints the results sidebar.

pub mod dom;
pub mod render;
pub mod template;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::SettingsStore;
use crate::opener::{obsidian_url, NoteOpener, SystemOpener};
use crate::types::{Ack, Message, SearchResult, Settings, TabHandle, TabId};
use crate::watcher::{extract_query, NavigationWatcher};

use self::dom::{ClickAction, Document, Element};
use self::template::{
    parse_sidebar, BundledResources, SidebarResources, TemplateError, CLOSE_ID, CONTENT_ID,
    SIDEBAR_ID, STYLES_ID,
};

pub const SETTINGS_ALERT: &str =
    "Could not load Obsidian vault settings. Please check extension settings.";

/// Anything that accepts messages on behalf of the relay.
pub trait RelayPort: Send + Sync {
    fn post(&self, message: Message, sender: TabHandle) -> Ack;
}

impl RelayPort for crate::relay::Relay {
    fn post(&self, message: Message, sender: TabHandle) -> Ack {
        self.on_message(message, sender)
    }
}

/// State for one loaded search page. Everything about the sidebar is read back
/// from the document rather than tracked in flags.
pub struct PageAgent {
    tab: TabHandle,
    inbox: mpsc::UnboundedReceiver<Message>,
    relay: Arc<dyn RelayPort>,
    store: SettingsStore,
    resources: Arc<dyn SidebarResources>,
    opener: Arc<dyn NoteOpener>,
    document: Document,
    watcher: NavigationWatcher,
    /// Sidebar markup and CSS, each fetched at most once per page.
    template: Option<String>,
    stylesheet: Option<String>,
    alerts: Vec<String>,
}

impl PageAgent {
    pub fn new(
        tab_id: TabId,
        url: impl Into<String>,
        relay: Arc<dyn RelayPort>,
        store: SettingsStore,
    ) -> Self {
        let url = url.into();
        let (tab, inbox) = TabHandle::channel(tab_id);
        Self {
            tab,
            inbox,
            relay,
            store,
            resources: Arc::new(BundledResources),
            opener: Arc::new(SystemOpener),
            document: Document::new(url.clone()),
            watcher: NavigationWatcher::new(url),
            template: None,
            stylesheet: None,
            alerts: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Arc<dyn SidebarResources>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn NoteOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn tab(&self) -> &TabHandle {
        &self.tab
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Messages that would have been shown as blocking alerts.
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Initial page load: look for a query straight away.
    pub fn load(&mut self) -> Option<String> {
        self.search_current_url()
    }

    /// Single-page navigation: the URL changes and the page re-renders.
    pub fn navigate(&mut self, url: impl Into<String>) -> Option<String> {
        self.document.set_url(url);
        self.on_mutation()
    }

    /// Structural DOM mutation observed. Re-runs extraction only if the URL moved.
    pub fn on_mutation(&mut self) -> Option<String> {
        let current = self.document.url().to_string();
        self.watcher.observe(&current)?;
        tracing::debug!("URL changed to {current}");
        self.search_current_url()
    }

    fn search_current_url(&mut self) -> Option<String> {
        let url = self.document.url().to_string();
        let query = extract_query(&url)?;
        tracing::info!("Kagi search detected");
        let ack = self.relay.post(
            Message::SearchIntent {
                query: query.clone(),
                url,
            },
            self.tab.clone(),
        );
        if ack == Ack::Ignored {
            tracing::warn!("Relay did not accept the search intent");
        }
        Some(query)
    }

    /// Wait for the next message addressed to this tab and handle it.
    pub async fn process_next(&mut self) -> Option<Ack> {
        let message = self.inbox.recv().await?;
        Some(self.handle_message(message).await)
    }

    pub async fn handle_message(&mut self, message: Message) -> Ack {
        tracing::debug!("Page received message on tab {:?}", self.tab.id);
        match message {
            Message::Results { results, query } => {
                let settings = self.current_settings().await;
                self.render_results(&results, &query, &settings);
                Ack::Handled
            }
            Message::Error { error } => {
                let settings = self.current_settings().await;
                self.render_error(&error, &settings);
                Ack::Handled
            }
            Message::SearchIntent { .. } => Ack::Ignored,
        }
    }

    async fn load_settings(&self) -> anyhow::Result<Settings> {
        let store = self.store.clone();
        // rusqlite is blocking; keep it off the async workers
        tokio::task::spawn_blocking(move || store.load()).await?
    }

    async fn current_settings(&self) -> Settings {
        self.load_settings().await.unwrap_or_else(|e| {
            tracing::warn!("Using default settings: {e}");
            Settings::default()
        })
    }

    /// Make sure the sidebar is on the page, creating it from the template the
    /// first time. An existing sidebar is reused and resized to the configured width.
    pub fn ensure_sidebar(&mut self, settings: &Settings) -> Result<(), TemplateError> {
        let width = format!("width: {}px", settings.sidebar_width);
        self.ensure_stylesheet();

        if let Some(sidebar) = self.document.get_element_by_id_mut(SIDEBAR_ID) {
            sidebar.set_attr("style", width);
            return Ok(());
        }

        let html = match &self.template {
            Some(html) => html.clone(),
            None => {
                let html = self
                    .resources
                    .sidebar_html()
                    .map_err(|e| TemplateError::Load(e.to_string()))?;
                self.template = Some(html.clone());
                html
            }
        };

        let mut sidebar = parse_sidebar(html.trim())?;
        sidebar.set_attr("style", width);
        match sidebar.find_by_id_mut(CLOSE_ID) {
            Some(close) => close.on_click = Some(ClickAction::CloseSidebar),
            None => tracing::warn!("#{CLOSE_ID} not found in sidebar template"),
        }
        self.document.body.append(sidebar);
        Ok(())
    }

    /// Inject the sidebar CSS into the head unless it is already there. A
    /// stylesheet that cannot be loaded leaves the sidebar unstyled.
    fn ensure_stylesheet(&mut self) {
        if self.document.get_element_by_id(STYLES_ID).is_some() {
            return;
        }
        let css = match &self.stylesheet {
            Some(css) => css.clone(),
            None => match self.resources.stylesheet() {
                Ok(css) => {
                    self.stylesheet = Some(css.clone());
                    css
                }
                Err(e) => {
                    tracing::warn!("Failed to load sidebar stylesheet: {e}");
                    return;
                }
            },
        };
        self.document
            .head
            .append(Element::new("style").with_id(STYLES_ID).with_text(css));
    }

    /// Content container of the sidebar, creating the sidebar if needed.
    fn content_area(&mut self, settings: &Settings) -> Option<&mut Element> {
        if let Err(e) = self.ensure_sidebar(settings) {
            tracing::error!("Error creating Omnisearch sidebar: {e}");
        }
        let content = self.document.get_element_by_id_mut(CONTENT_ID);
        if content.is_none() {
            tracing::error!("#{CONTENT_ID} not found in sidebar, nothing rendered");
        }
        content
    }

    pub fn render_results(&mut self, results: &[SearchResult], query: &str, settings: &Settings) {
        let Some(content) = self.content_area(settings) else {
            return;
        };
        content.clear_children();
        for node in render::results_view(results, query) {
            content.append(node);
        }
    }

    pub fn render_error(&mut self, error: &str, settings: &Settings) {
        let Some(content) = self.content_area(settings) else {
            return;
        };
        content.clear_children();
        content.append(render::error_view(error));
    }

    /// Simulate a click on the element with `id`. Returns whether it had an action.
    pub async fn click(&mut self, id: &str) -> bool {
        let action = self
            .document
            .get_element_by_id(id)
            .and_then(|el| el.on_click.clone());
        match action {
            Some(ClickAction::CloseSidebar) => {
                self.close_sidebar();
                true
            }
            Some(ClickAction::OpenNote { path }) => {
                self.open_note(&path).await;
                true
            }
            None => false,
        }
    }

    /// Remove the sidebar together with its stylesheet.
    pub fn close_sidebar(&mut self) {
        self.document.remove_element(SIDEBAR_ID);
        self.document.remove_element(STYLES_ID);
    }

    /// Open `path` in Obsidian. Returns the deep link that was handed to the OS.
    pub async fn open_note(&mut self, path: &str) -> Option<String> {
        let settings = match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("Error opening Obsidian link: {e}");
                self.alerts.push(SETTINGS_ALERT.to_string());
                return None;
            }
        };
        let url = obsidian_url(&settings.obsidian_vault_name, path);
        if let Err(e) = self.opener.open(&url) {
            tracing::error!("Error opening Obsidian link: {e}");
            self.alerts.push(format!("Could not open the note in Obsidian: {e}"));
            return None;
        }
        Some(url)
    }
}
