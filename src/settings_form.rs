use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::db::SettingsStore;
use crate::types::Settings;

pub const PORT_RANGE: std::ops::RangeInclusive<i64> = 1..=65535;
pub const SIDEBAR_WIDTH_RANGE: std::ops::RangeInclusive<i64> = 200..=1200;

/// How long the "saved" notice stays up.
pub const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(3);

pub const INVALID_INPUT_TEXT: &str =
    "Please fill all fields correctly. Port: 1-65535. Sidebar Width: 200-1200px.";
pub const SAVED_TEXT: &str = "Settings saved successfully!";
pub const LOAD_FAILED_TEXT: &str = "Error loading settings.";
pub const SAVE_FAILED_TEXT: &str = "Error saving settings. Check the log for details.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Omnisearch base URL must not be empty")]
    EmptyBaseUrl,
    #[error("Obsidian vault name must not be empty")]
    EmptyVaultName,
    #[error("port must be a whole number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("sidebar width must be a whole number between 200 and 1200, got {0:?}")]
    InvalidSidebarWidth(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("could not save settings: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Raw form inputs, exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub base_url: String,
    pub port: String,
    pub vault_name: String,
    pub sidebar_width: String,
}

impl From<&Settings> for SettingsForm {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.omnisearch_base_url.clone(),
            port: settings.omnisearch_port.to_string(),
            vault_name: settings.obsidian_vault_name.clone(),
            sidebar_width: settings.sidebar_width.to_string(),
        }
    }
}

impl SettingsForm {
    /// Trim, parse and range-check every field.
    pub fn validate(&self) -> Result<Settings, ValidationError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ValidationError::EmptyBaseUrl);
        }
        let vault_name = self.vault_name.trim();
        if vault_name.is_empty() {
            return Err(ValidationError::EmptyVaultName);
        }
        let port = parse_in_range(&self.port, PORT_RANGE)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| ValidationError::InvalidPort(self.port.clone()))?;
        let sidebar_width = parse_in_range(&self.sidebar_width, SIDEBAR_WIDTH_RANGE)
            .and_then(|w| u32::try_from(w).ok())
            .ok_or_else(|| ValidationError::InvalidSidebarWidth(self.sidebar_width.clone()))?;

        Ok(Settings {
            omnisearch_base_url: base_url.to_string(),
            omnisearch_port: port,
            obsidian_vault_name: vault_name.to_string(),
            sidebar_width,
        })
    }
}

fn parse_in_range(raw: &str, range: std::ops::RangeInclusive<i64>) -> Option<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| range.contains(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn error(text: &str) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct StatusSlot {
    /// Bumped on every change so a pending clear never wipes a newer message.
    generation: u64,
    message: Option<StatusMessage>,
}

/// The settings page: form fields plus a status line.
pub struct SettingsSurface {
    store: SettingsStore,
    pub form: SettingsForm,
    status: Arc<Mutex<StatusSlot>>,
}

impl SettingsSurface {
    /// Populate the form from storage, falling back to defaults if the read fails.
    pub fn open(store: SettingsStore) -> Self {
        let status = Arc::new(Mutex::new(StatusSlot::default()));
        let form = match store.load() {
            Ok(settings) => SettingsForm::from(&settings),
            Err(e) => {
                tracing::error!("Error loading settings: {e}");
                set_status(&status, Some(StatusMessage::error(LOAD_FAILED_TEXT)));
                SettingsForm::from(&Settings::default())
            }
        };
        Self {
            store,
            form,
            status,
        }
    }

    pub fn status(&self) -> Option<StatusMessage> {
        self.status
            .lock()
            .map(|slot| slot.message.clone())
            .unwrap_or(None)
    }

    /// Validate the form and persist it. On success the status line shows a
    /// notice that clears itself after [`STATUS_CLEAR_DELAY`] when a tokio
    /// runtime is available.
    pub fn submit(&mut self) -> Result<Settings, SubmitError> {
        set_status(&self.status, None);

        let settings = match self.form.validate() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Rejected settings: {e}");
                set_status(&self.status, Some(StatusMessage::error(INVALID_INPUT_TEXT)));
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.save(&settings) {
            tracing::error!("Error saving settings: {e}");
            set_status(&self.status, Some(StatusMessage::error(SAVE_FAILED_TEXT)));
            return Err(SubmitError::Storage(e));
        }

        let generation = set_status(
            &self.status,
            Some(StatusMessage {
                kind: StatusKind::Success,
                text: SAVED_TEXT.to_string(),
            }),
        );
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let status = Arc::clone(&self.status);
            handle.spawn(async move {
                tokio::time::sleep(STATUS_CLEAR_DELAY).await;
                if let Ok(mut slot) = status.lock() {
                    if slot.generation == generation {
                        slot.message = None;
                    }
                }
            });
        }
        Ok(settings)
    }
}

fn set_status(status: &Mutex<StatusSlot>, message: Option<StatusMessage>) -> u64 {
    match status.lock() {
        Ok(mut slot) => {
            slot.generation += 1;
            slot.message = message;
            slot.generation
        }
        Err(_) => 0,
    }
}
