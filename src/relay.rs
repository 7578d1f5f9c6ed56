use thiserror::Error;

use crate::db::SettingsStore;
use crate::types::{Ack, Message, SearchResult, Settings, TabHandle};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not read settings: {0}")]
    Settings(String),
    #[error("request to Omnisearch failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Omnisearch answered with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Omnisearch returned a malformed response: {0}")]
    Body(#[from] serde_json::Error),
}

/// Build the Omnisearch query URL: `{base}:{port}/search?q={query}`.
pub fn search_url(settings: &Settings, query: &str) -> String {
    format!(
        "{}:{}/search?q={}",
        settings.omnisearch_base_url,
        settings.omnisearch_port,
        urlencoding::encode(query)
    )
}

/// Parse an Omnisearch response body. Anything that is valid JSON but not an
/// array (null, an object...) counts as "no results". Odd elements inside the
/// array never spoil the rest of the list.
pub fn parse_results(body: &str) -> Result<Vec<SearchResult>, serde_json::Error> {
    match serde_json::from_str::<serde_json::Value>(body)? {
        serde_json::Value::Array(items) => {
            Ok(items.into_iter().map(SearchResult::from_value).collect())
        }
        _ => Ok(Vec::new()),
    }
}

/// Background side of the bridge: turns search intents into Omnisearch
/// requests and posts the outcome back to the tab that asked.
#[derive(Debug, Clone)]
pub struct Relay {
    store: SettingsStore,
    client: reqwest::Client,
}

impl Relay {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
        }
    }

    /// Entry point for every message addressed to the relay. Always returns
    /// immediately; the search itself runs on a spawned task and its outcome
    /// is delivered as a separate message. Must be called within a tokio runtime.
    pub fn on_message(&self, message: Message, sender: TabHandle) -> Ack {
        tracing::debug!("Relay received message from tab {:?}", sender.id);
        match message {
            Message::SearchIntent { query, url } => {
                tracing::info!("Relaying search from {url}");
                let relay = self.clone();
                tokio::spawn(async move {
                    relay.handle_search(query, sender).await;
                });
                Ack::Handled
            }
            Message::Results { .. } | Message::Error { .. } => Ack::Ignored,
        }
    }

    /// Run one search and reply to `sender`.
    pub async fn handle_search(&self, query: String, sender: TabHandle) {
        let reply = match self.search(&query).await {
            Ok(results) => {
                tracing::debug!("Omnisearch returned {} results", results.len());
                Message::Results { results, query }
            }
            Err(e) => {
                tracing::warn!("Omnisearch search failed: {e}");
                Message::Error { error: e.to_string() }
            }
        };
        if !sender.send(reply) {
            tracing::debug!("Tab {:?} closed before the reply arrived", sender.id);
        }
    }

    /// Query Omnisearch using the current settings.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, RelayError> {
        let store = self.store.clone();
        // rusqlite is blocking; keep it off the async workers
        let settings = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| RelayError::Settings(e.to_string()))?
            .map_err(|e| RelayError::Settings(e.to_string()))?;

        let url = search_url(&settings, query);
        tracing::debug!("Fetching {url}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::Status(response.status()));
        }
        let body = response.text().await?;
        Ok(parse_results(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query() {
        let settings = Settings::default();
        assert_eq!(
            search_url(&settings, "rust & tokio/async"),
            "http://localhost:51361/search?q=rust%20%26%20tokio%2Fasync"
        );
    }

    #[test]
    fn search_url_uses_configured_endpoint() {
        let settings = Settings {
            omnisearch_base_url: "http://127.0.0.1".into(),
            omnisearch_port: 9000,
            ..Settings::default()
        };
        assert_eq!(search_url(&settings, "x"), "http://127.0.0.1:9000/search?q=x");
    }

    #[test]
    fn non_array_bodies_become_empty() {
        assert!(parse_results("null").unwrap().is_empty());
        assert!(parse_results(r#"{"error":"nope"}"#).unwrap().is_empty());
        assert!(parse_results("[]").unwrap().is_empty());
    }

    #[test]
    fn array_body_is_parsed() {
        let results =
            parse_results(r#"[{"basename":"Note A","path":"a.md","excerpt":"hello"}]"#).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path.as_deref(), Some("a.md"));
    }

    #[test]
    fn mixed_elements_keep_good_results() {
        let results = parse_results(
            r#"[{"basename":"Good","path":"a.md"},{"basename":"Bad","path":42},null,5]"#,
        )
        .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].path.as_deref(), Some("a.md"));
        assert_eq!(results[1].basename.as_deref(), Some("Bad"));
        assert!(results[1].path.is_none());
        assert_eq!(results[2], SearchResult::default());
        assert_eq!(results[3], SearchResult::default());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_results("<html>oops</html>").is_err());
    }

    #[tokio::test]
    async fn non_intent_messages_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::new(SettingsStore::new(dir.path().join("s.sqlite")));
        let (tab, mut rx) = TabHandle::channel(crate::types::TabId(1));
        let ack = relay.on_message(Message::Error { error: "x".into() }, tab);
        assert_eq!(ack, Ack::Ignored);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreachable_service_yields_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("s.sqlite"));
        // grab a free port, then release it so nothing listens there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        store
            .save(&Settings {
                omnisearch_base_url: "http://127.0.0.1".into(),
                omnisearch_port: port,
                ..Settings::default()
            })
            .unwrap();

        let relay = Relay::new(store);
        let (tab, mut rx) = TabHandle::channel(crate::types::TabId(7));
        let ack = relay.on_message(
            Message::SearchIntent { query: "hello".into(), url: "https://kagi.com/search?q=hello".into() },
            tab,
        );
        assert_eq!(ack, Ack::Handled);
        match rx.recv().await.unwrap() {
            Message::Error { error } => assert!(error.contains("request to Omnisearch failed")),
            other => panic!("expected error message, got {other:?}"),
        }
    }
}
