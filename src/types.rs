use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;

pub const DEFAULT_BASE_URL: &str = "http://localhost";
pub const DEFAULT_PORT: u16 = 51361;
pub const DEFAULT_VAULT_NAME: &str = "YourVaultName";
pub const DEFAULT_SIDEBAR_WIDTH: u32 = 450;

/// User configuration shared by the relay, the page agent and the settings form.
/// Serialized field names match the persisted storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub omnisearch_base_url: String,
    pub omnisearch_port: u16,
    pub obsidian_vault_name: String,
    pub sidebar_width: u32, // pixels
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            omnisearch_base_url: DEFAULT_BASE_URL.to_string(),
            omnisearch_port: DEFAULT_PORT,
            obsidian_vault_name: DEFAULT_VAULT_NAME.to_string(),
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
        }
    }
}

/// One hit returned by Omnisearch. Every field is optional and a field of the
/// wrong type reads as absent; anything else the service sends (score, vault,
/// matches...) is kept in `extra` so results travel through the relay unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SearchResult {
    /// Read one array element from an Omnisearch response. Non-objects yield
    /// an empty result instead of failing the whole list.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Messages exchanged between a page and the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Page → relay: the user searched for `query` on `url`.
    #[serde(rename = "KAGI_SEARCH")]
    SearchIntent { query: String, url: String },
    /// Relay → page: Omnisearch answered.
    #[serde(rename = "OMNISEARCH_RESULTS")]
    Results {
        results: Vec<SearchResult>,
        query: String,
    },
    /// Relay → page: the search could not be completed.
    #[serde(rename = "OMNISEARCH_ERROR")]
    Error { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u32);

/// Address of a page, handed to the relay alongside each message so replies
/// reach the tab the intent came from.
#[derive(Debug, Clone)]
pub struct TabHandle {
    pub id: TabId,
    pub tx: mpsc::UnboundedSender<Message>,
}

impl TabHandle {
    /// Create a handle plus the receiving end the page listens on.
    pub fn channel(id: TabId) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// Returns false if the page is gone.
    pub fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Synchronous receipt returned for every message delivered to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The message was accepted; any reply arrives later on the tab channel.
    Handled,
    /// The message kind is not meant for the relay.
    Ignored,
}
