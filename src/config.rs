use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::drafts::{DraftStore, DEFAULT_KEY_PREFIX, DEFAULT_TTL_HOURS};
use crate::storage::FileStorage;
use crate::wizard::{builtin_config, WizardConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Draft storage settings.
///
/// `auto_save` and `auto_save_interval_ms` override what each wizard
/// declares; left unset, the wizard's own values apply. A non-default
/// `key_prefix` replaces every wizard's prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save_interval_ms: Option<u64>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Hours a draft survives without being saved again
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Upper bound on the draft file size; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_bytes: Option<usize>,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_ttl_hours() -> i64 {
    DEFAULT_TTL_HOURS
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            auto_save: None,
            auto_save_interval_ms: None,
            key_prefix: default_key_prefix(),
            ttl_hours: default_ttl_hours(),
            capacity_bytes: None,
        }
    }
}

/// Navigation overrides applied on top of each wizard's settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_skip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_progress: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_state_dir")]
    pub state: String,
}

fn default_state_dir() -> String {
    ".wizard".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<state>/logs` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Project-local config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".wizard/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the tool works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/wizard-drafts/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("wizard-drafts").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(Path::new(path)));
        }

        // Environment variables: WIZARD__PERSISTENCE__TTL_HOURS=48
        builder = builder.add_source(
            config::Environment::with_prefix("WIZARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to the project-local config file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        std::fs::write(&config_path, self.to_toml()?).context("Failed to write config file")?;

        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    pub fn drafts_path(&self) -> PathBuf {
        self.state_path().join("drafts.json")
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.persistence.ttl_hours)
    }

    /// Draft store over the file at [`Self::drafts_path`]
    pub fn draft_store(&self) -> Result<DraftStore> {
        self.open_draft_store(&self.persistence.key_prefix)
    }

    /// Draft store using the key prefix `wizard` declares
    pub fn draft_store_for(&self, wizard: &WizardConfig) -> Result<DraftStore> {
        self.open_draft_store(&wizard.persistence().key_prefix)
    }

    fn open_draft_store(&self, key_prefix: &str) -> Result<DraftStore> {
        let storage = FileStorage::open(self.drafts_path(), self.persistence.capacity_bytes)
            .with_context(|| {
                format!("Failed to open draft storage at {}", self.drafts_path().display())
            })?;
        Ok(DraftStore::new(Arc::new(storage))
            .with_key_prefix(key_prefix)
            .with_ttl(self.ttl()))
    }

    /// A built-in wizard with this configuration's overrides applied
    pub fn wizard(&self, wizard_type: &str) -> Option<Arc<WizardConfig>> {
        let base = builtin_config(wizard_type)?;
        if !self.has_wizard_overrides() {
            return Some(base);
        }

        let mut persistence = base.persistence().clone();
        if let Some(auto_save) = self.persistence.auto_save {
            persistence.auto_save = auto_save;
        }
        if let Some(interval) = self.persistence.auto_save_interval_ms {
            persistence.auto_save_interval_ms = interval;
        }
        if self.persistence.key_prefix != DEFAULT_KEY_PREFIX {
            persistence.key_prefix.clone_from(&self.persistence.key_prefix);
        }

        let mut navigation = base.navigation().clone();
        if let Some(allow_skip) = self.navigation.allow_skip {
            navigation.allow_skip = allow_skip;
        }
        if let Some(show_progress) = self.navigation.show_progress {
            navigation.show_progress = show_progress;
        }

        Some(Arc::new(
            base.as_ref()
                .clone()
                .with_persistence(persistence)
                .with_navigation(navigation),
        ))
    }

    fn has_wizard_overrides(&self) -> bool {
        self.persistence.auto_save.is_some()
            || self.persistence.auto_save_interval_ms.is_some()
            || self.persistence.key_prefix != DEFAULT_KEY_PREFIX
            || self.navigation.allow_skip.is_some()
            || self.navigation.show_progress.is_some()
    }
}
