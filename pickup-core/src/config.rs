//! YAML configuration for the reconciliation engine.
//!
//! # Storage layout
//!
//! ```text
//! ~/.pickup/                (mode 0700)
//!   config.yaml             (mode 0600)
//!   overrides.yaml          (mode 0600, see [`crate::overrides`])
//! ```
//!
//! Secrets are never stored here; they come from the environment.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{StatusCode, StoreId};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_FILE: &str = "config.yaml";

/// "Aguardando retirada" in the Source System.
pub const DEFAULT_CANDIDATE_STATUS: u64 = 214875;
/// "Atendido" in the Source System.
pub const DEFAULT_TERMINAL_STATUS: u64 = 9;
pub const DEFAULT_MARKER_TAG: &str = "retirada-local-pronto";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Which Source field carries the Target order id.
///
/// Exactly one field is read; there is no fallback to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossReferenceField {
    /// `numeroLoja`: store-side order number.
    #[default]
    #[serde(rename = "numeroLoja")]
    StoreOrderNumber,
    /// `loja.idLojaProduto`: store-scoped numeric id.
    #[serde(rename = "loja.idLojaProduto")]
    StoreScopedId,
    /// `numero`: Source order number.
    #[serde(rename = "numero")]
    OrderNumber,
}

impl CrossReferenceField {
    pub fn wire_name(&self) -> &'static str {
        match self {
            CrossReferenceField::StoreOrderNumber => "numeroLoja",
            CrossReferenceField::StoreScopedId => "loja.idLojaProduto",
            CrossReferenceField::OrderNumber => "numero",
        }
    }
}

/// Shape of the Source status write-back call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritebackEndpoint {
    /// `PATCH /pedidos/vendas/{id}/situacoes/{status}`
    #[default]
    Situation,
    /// `PATCH /pedidos/vendas/{id}` with a `situacao` body.
    GenericPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: String,
    pub oauth_token_url: String,
    pub candidate_status: StatusCode,
    pub terminal_status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
    pub cross_reference_field: CrossReferenceField,
    pub writeback: WritebackEndpoint,
    /// Retry a rejected dedicated write-back (404/405) through the generic patch.
    pub writeback_fallback: bool,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.bling.com.br/Api/v3".to_string(),
            oauth_token_url: "https://www.bling.com.br/Api/v3/oauth/token".to_string(),
            candidate_status: StatusCode(DEFAULT_CANDIDATE_STATUS),
            terminal_status: StatusCode(DEFAULT_TERMINAL_STATUS),
            store_id: None,
            cross_reference_field: CrossReferenceField::default(),
            writeback: WritebackEndpoint::default(),
            writeback_fallback: true,
            page_size: 100,
            max_pages: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    pub graphql_url: String,
    /// Tracking company label on created pickup fulfillments.
    pub pickup_tracking_company: String,
    /// Notify the customer when a pickup fulfillment is created.
    pub notify_customer: bool,
    /// Location gid the created pickup fulfillment is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_location_id: Option<String>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            graphql_url: "https://your-store.myshopify.com/admin/api/2024-07/graphql.json"
                .to_string(),
            pickup_tracking_company: "Retirada Local".to_string(),
            notify_customer: false,
            pickup_location_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Idempotency marker applied to Target orders after a transition.
    pub marker_tag: String,
    pub tick_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            marker_tag: DEFAULT_MARKER_TAG.to_string(),
            tick_interval_secs: 30,
            request_timeout_secs: 20,
        }
    }
}

impl ReconcileSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub log_json: bool,
}

/// Root of `~/.pickup/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: SourceSettings::default(),
            target: TargetSettings::default(),
            reconcile: ReconcileSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }
}

impl Config {
    /// Reject values the engine cannot run with. `path` is only used for messages.
    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        if self.version != CONFIG_VERSION {
            return Err(invalid(format!(
                "unsupported version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        if self.source.candidate_status == self.source.terminal_status {
            return Err(invalid(
                "source.candidate_status and source.terminal_status must differ".to_string(),
            ));
        }
        for (key, url) in [
            ("source.base_url", &self.source.base_url),
            ("source.oauth_token_url", &self.source.oauth_token_url),
            ("target.graphql_url", &self.target.graphql_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(invalid(format!("{key} must be an http(s) URL, got '{url}'")));
            }
        }
        if !(1..=100).contains(&self.source.page_size) {
            return Err(invalid("source.page_size must be within 1..=100".to_string()));
        }
        if self.source.max_pages == 0 {
            return Err(invalid("source.max_pages must be at least 1".to_string()));
        }
        if self.reconcile.marker_tag.trim().is_empty() {
            return Err(invalid("reconcile.marker_tag must not be empty".to_string()));
        }
        if self.reconcile.tick_interval_secs == 0 || self.reconcile.request_timeout_secs == 0 {
            return Err(invalid(
                "reconcile.tick_interval_secs and reconcile.request_timeout_secs must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.pickup/`: pure, no I/O.
pub fn pickup_root(home: &Path) -> PathBuf {
    home.join(".pickup")
}

/// `<home>/.pickup/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    pickup_root(home).join(CONFIG_FILE)
}

/// Create `<home>/.pickup/` (mode `0700`) if absent.
pub(crate) fn ensure_root_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = pickup_root(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.pickup/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        source: e,
    })?;
    config.validate(&path)?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.pickup/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    ensure_root_at(home)?;
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path_at(home), &yaml)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp_path, contents).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write a default config unless one exists (or `force` is set).
///
/// Idempotent: an existing file is loaded and returned unchanged.
/// The returned flag tells whether a file was written.
pub fn init_at(home: &Path, force: bool) -> Result<(Config, bool), ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return Ok((load_at(home)?, false));
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok((config, true))
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<(Config, bool), ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
