//! # Terminal Configuration
//!
//! Configuration management for the loyalty terminal.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LOYALTY_STORE_ID=store-1                                           │
//! │     LOYALTY_REMOTE_URL=https://loyalty.example.com/api                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/terminal/terminal.toml (Linux)                           │
//! │     ~/Library/Application Support/com.loyalty.terminal/terminal.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated terminal id, MZN tier table                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Caixa 1"
//! cashier_id = "cashier-001"
//!
//! [store]
//! id = "store-maputo-01"
//! name = "Maputo Baixa"
//!
//! [points]
//! currency = "MZN"
//! discount_percentage = 100
//! minimum_points_to_redeem = 10
//!
//! [[points.tiers]]
//! minAmount = 500
//! maxAmount = 4999
//! points = 10
//!
//! [remote]
//! base_url = "https://loyalty.example.com/api"
//! commit_timeout_secs = 10
//!
//! [sync]
//! probe_interval_secs = 15
//! retry_interval_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use loyalty_core::PointsConfig;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Terminal Identity
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// Unique terminal identifier (UUID v4), generated on first run.
    pub id: String,

    /// Human-readable terminal name (e.g., "Caixa 1").
    #[serde(default = "default_terminal_name")]
    pub name: String,

    /// Cashier recorded on sales when the host does not supply one.
    #[serde(default = "default_cashier_id")]
    pub cashier_id: String,
}

fn default_terminal_name() -> String {
    "Loyalty Terminal".to_string()
}

fn default_cashier_id() -> String {
    "cashier".to_string()
}

impl Default for TerminalSettings {
    fn default() -> Self {
        TerminalSettings {
            id: Uuid::new_v4().to_string(),
            name: default_terminal_name(),
            cashier_id: default_cashier_id(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// The store this terminal sells for. Point balances are kept per store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            id: "default-store".to_string(),
            name: "Default Store".to_string(),
        }
    }
}

// =============================================================================
// Remote
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the loyalty backend (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as a bearer token when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout for lookups and pings (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Budget for a whole remote commit (sale + ledger delta). Exceeding it
    /// queues the sale.
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_commit_timeout() -> u64 {
    10
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            commit_timeout_secs: default_commit_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between health probes while online (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// First probe backoff after going offline (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Probe backoff ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Periodic replay while online, for sales whose replay failed.
    /// 0 disables it; replay then only runs on connectivity restored.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Settled outbox rows older than this are purged at startup.
    #[serde(default = "default_settled_retention")]
    pub settled_retention_days: u32,
}

fn default_probe_interval() -> u64 {
    15
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}
fn default_retry_interval() -> u64 {
    60
}
fn default_settled_retention() -> u32 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            probe_interval_secs: default_probe_interval(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            retry_interval_secs: default_retry_interval(),
            settled_retention_days: default_settled_retention(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `terminal.db` in the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Terminal Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub terminal: TerminalSettings,

    #[serde(default)]
    pub store: StoreSettings,

    /// Tier table and redemption rules.
    #[serde(default)]
    pub points: PointsConfig,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl TerminalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Overlapping tiers are only warned about: the first matching tier
    /// wins, so the table still resolves deterministically.
    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(SyncError::MissingTerminalId);
        }
        if self.store.id.trim().is_empty() {
            return Err(SyncError::MissingStoreId);
        }

        let url = Url::parse(&self.remote.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        if self.remote.commit_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "commit_timeout_secs must be greater than 0".into(),
            ));
        }

        self.points
            .validate()
            .map_err(|e| SyncError::InvalidConfig(format!("points: {}", e)))?;

        for (first, second) in self.points.overlapping_tiers() {
            warn!(
                first,
                second, "Tier ranges overlap; the earlier tier wins for shared amounts"
            );
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("LOYALTY_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Ok(name) = std::env::var("LOYALTY_TERMINAL_NAME") {
            self.terminal.name = name;
        }

        if let Ok(cashier) = std::env::var("LOYALTY_CASHIER_ID") {
            self.terminal.cashier_id = cashier;
        }

        if let Ok(id) = std::env::var("LOYALTY_STORE_ID") {
            debug!(store_id = %id, "Overriding store ID from environment");
            self.store.id = id;
        }

        if let Ok(url) = std::env::var("LOYALTY_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.base_url = url;
        }

        if let Ok(key) = std::env::var("LOYALTY_API_KEY") {
            self.remote.api_key = Some(key);
        }

        if let Ok(path) = std::env::var("LOYALTY_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("LOYALTY_COMMIT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.remote.commit_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid LOYALTY_COMMIT_TIMEOUT_SECS"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "loyalty", "terminal")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    /// The configured database path, or `terminal.db` in the data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("terminal.db"))
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn terminal_id(&self) -> &str {
        &self.terminal.id
    }

    pub fn store_id(&self) -> &str {
        &self.store.id
    }

    pub fn cashier_id(&self) -> &str {
        &self.terminal.cashier_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::Tier;

    #[test]
    fn test_default_config() {
        let config = TerminalConfig::default();
        assert!(!config.terminal.id.is_empty());
        assert_eq!(config.points.currency, "MZN");
        assert_eq!(config.points.tiers.len(), 7);
        assert_eq!(config.remote.commit_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TerminalConfig::default();

        config.terminal.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingTerminalId)));

        config.terminal.id = "t-1".into();
        config.store.id = "  ".into();
        assert!(matches!(config.validate(), Err(SyncError::MissingStoreId)));

        config.store.id = "store-1".into();
        config.remote.base_url = "ws://localhost:8080".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.base_url = "https://loyalty.example.com/api".into();
        config.remote.commit_timeout_secs = 0;
        assert!(is_invalid(&config));

        config.remote.commit_timeout_secs = 5;
        config.points.minimum_points_to_redeem = 0;
        assert!(is_invalid(&config));
    }

    #[test]
    fn test_overlapping_tiers_are_allowed() {
        let mut config = TerminalConfig::default();
        config.points.tiers = vec![
            Tier::new(500, 5_000, 10),
            Tier::new(5_000, 9_999, 20),
        ];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = TerminalConfig::default();
        config.store.id = "store-maputo-01".into();
        config.remote.api_key = Some("secret".into());

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[terminal]"));
        assert!(toml_str.contains("[[points.tiers]]"));

        let parsed: TerminalConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.id, "store-maputo-01");
        assert_eq!(parsed.terminal.id, config.terminal.id);
        assert_eq!(parsed.points, config.points);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: TerminalConfig = toml::from_str(
            r#"
            [store]
            id = "store-9"

            [remote]
            base_url = "https://loyalty.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.store.id, "store-9");
        assert_eq!(parsed.remote.commit_timeout_secs, 10);
        assert_eq!(parsed.sync.retry_interval_secs, 60);
        assert_eq!(parsed.points.minimum_points_to_redeem, 10);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("loyalty-{}.toml", Uuid::new_v4()));
        let mut config = TerminalConfig::default();
        config.store.id = "store-42".into();
        config.save(Some(path.clone())).unwrap();

        let loaded = TerminalConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.terminal.id, config.terminal.id);

        let _ = std::fs::remove_file(&path);
    }

    fn is_invalid(config: &TerminalConfig) -> bool {
        matches!(config.validate(), Err(SyncError::InvalidConfig(_)))
    }
}
