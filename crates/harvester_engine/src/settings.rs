use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvester_core::ScanLimits;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{FailureKind, HarvestError};

/// Environment variable that overrides the configured portal password.
pub const PASSWORD_ENV: &str = "HARVESTER_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read settings file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse settings file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid endpoint {endpoint:?}: {message}")]
    Endpoint { endpoint: String, message: String },
}

impl From<SettingsError> for HarvestError {
    fn from(err: SettingsError) -> Self {
        HarvestError::new(FailureKind::Settings, err.to_string())
    }
}

/// What the engine does when one matched item fails fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole harvest on the first fatal item error.
    #[default]
    FailFast,
    /// Record the failure, return to the feed and keep scanning.
    CollectAndContinue,
}

/// Connection and login details for the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Recipient used by the transfer sender.
    pub recipient: Option<String>,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://portal.example.com/".to_string(),
            username: String::new(),
            password: String::new(),
            recipient: None,
            timeout: Duration::from_secs(30),
            headless: true,
        }
    }
}

impl SessionConfig {
    pub fn login_url(&self) -> Result<Url, SettingsError> {
        Url::parse(&self.endpoint).map_err(|err| SettingsError::Endpoint {
            endpoint: self.endpoint.clone(),
            message: err.to_string(),
        })
    }

    pub fn page_url(&self, path: &str) -> Result<Url, SettingsError> {
        self.login_url()?
            .join(path)
            .map_err(|err| SettingsError::Endpoint {
                endpoint: self.endpoint.clone(),
                message: err.to_string(),
            })
    }
}

/// CSS selectors for every portal element the engine touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    pub username_input: String,
    pub continue_button: String,
    pub password_input: String,
    pub sign_in_button: String,
    pub login_error: String,

    pub feed_container: String,
    pub feed_row: String,
    pub row_title: String,
    pub row_subtext: String,
    pub row_timestamp: String,

    /// "Continue without the app" style interstitial on the detail view.
    pub transfer_gate: String,
    pub detail_timestamp: String,
    pub open_downloads: String,
    /// Substring of the URL once the download surface is ready.
    pub downloads_url_marker: String,
    pub file_list: String,
    pub file_row: String,
    pub file_name: String,
    pub download_selected: String,

    pub compose_button: String,
    pub add_files_button: String,
    pub recipient_input: String,
    pub send_button: String,
    pub progress_indicator: String,
    pub error_indicators: Vec<String>,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            username_input: "input[name=email]".to_string(),
            continue_button: "button[data-testid=login-continue]".to_string(),
            password_input: "input[type=password]".to_string(),
            sign_in_button: "button[data-testid=login-submit]".to_string(),
            login_error: "[role=alert].login-error".to_string(),

            feed_container: "[data-testid=activity-feed]".to_string(),
            feed_row: "[data-testid=activity-row]".to_string(),
            row_title: ".activity-title".to_string(),
            row_subtext: ".activity-subtext".to_string(),
            row_timestamp: ".activity-time".to_string(),

            transfer_gate: "button[data-testid=continue-without-app]".to_string(),
            detail_timestamp: "[data-testid=transfer-sent-at]".to_string(),
            open_downloads: "[data-testid=open-downloads]".to_string(),
            downloads_url_marker: "/downloads/".to_string(),
            file_list: "[data-testid=file-list]".to_string(),
            file_row: "[data-testid=file-row]".to_string(),
            file_name: ".file-name".to_string(),
            download_selected: "button[data-testid=download-selected]".to_string(),

            compose_button: "[data-testid=new-transfer]".to_string(),
            add_files_button: "[data-testid=add-files]".to_string(),
            recipient_input: "input[name=recipient]".to_string(),
            send_button: "button[data-testid=send-transfer]".to_string(),
            progress_indicator: "[data-testid=transfer-status]".to_string(),
            error_indicators: vec![
                "[role=alert]".to_string(),
                ".error-message".to_string(),
                ".toast-error".to_string(),
            ],
        }
    }
}

/// Tunables of one harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub title_prefix: String,
    pub name_suffix: String,
    pub feed_path: String,

    #[serde(with = "duration_ms")]
    pub navigation_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub selector_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub download_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub completion_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub completion_appear_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    pub max_scroll_attempts: u32,
    pub max_hidden_retries: u32,
    pub scroll_delta_px: i64,

    pub download_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub archive_extension: String,
    pub failure_policy: FailurePolicy,
    /// Turn non-archive downloads into a record too. Off by default: only
    /// archives have ever produced records.
    pub materialize_direct_downloads: bool,

    pub selectors: PortalSelectors,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            title_prefix: "Received".to_string(),
            name_suffix: ".xlsx".to_string(),
            feed_path: "activity".to_string(),
            navigation_timeout: Duration::from_secs(10),
            selector_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(60),
            completion_timeout: Duration::from_secs(300),
            completion_appear_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(800),
            poll_interval: Duration::from_secs(1),
            max_scroll_attempts: 50,
            max_hidden_retries: 5,
            scroll_delta_px: 600,
            download_dir: PathBuf::from("downloads"),
            logs_dir: PathBuf::from("logs"),
            archive_extension: ".zip".to_string(),
            failure_policy: FailurePolicy::FailFast,
            materialize_direct_downloads: false,
            selectors: PortalSelectors::default(),
        }
    }
}

impl HarvestSettings {
    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            max_scroll_attempts: self.max_scroll_attempts,
            max_hidden_retries: self.max_hidden_retries,
        }
    }
}

/// Top-level settings file layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub session: SessionConfig,
    pub harvest: HarvestSettings,
}

/// Load a RON settings file, applying the password environment override.
pub fn load_config(path: &Path) -> Result<HarvesterConfig, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&content).map_err(|message| SettingsError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.session.password = password;
    }
    config.session.login_url()?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<HarvesterConfig, String> {
    ron::from_str(content).map_err(|err| err.to_string())
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
