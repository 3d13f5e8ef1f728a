//! Layered configuration for the swarm runtime.
//!
//! Loaded from `.moai/config/config.json` with `figment`, layering
//! defaults -> project file -> environment.

use crate::error::ConfigError;
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// `patterns.collect.*` toggles: one per [`crate::domain::PatternType`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternCollectToggles {
    /// Collect `task_completion` patterns.
    #[serde(default = "default_true")]
    pub task_completion: bool,
    /// Collect `error_occurrence` patterns.
    #[serde(default = "default_true")]
    pub error_occurrence: bool,
    /// Collect `agent_usage` patterns.
    #[serde(default = "default_true")]
    pub agent_usage: bool,
    /// Collect `user_correction` patterns.
    #[serde(default = "default_true")]
    pub user_correction: bool,
}

impl Default for PatternCollectToggles {
    fn default() -> Self {
        Self {
            task_completion: true,
            error_occurrence: true,
            agent_usage: true,
            user_correction: true,
        }
    }
}

/// `patterns.*` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternsConfig {
    /// Master switch for [`crate::pattern_collector::PatternCollector`].
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory patterns are written under.
    #[serde(default = "default_patterns_storage")]
    pub storage: String,
    /// Per-type collection toggles.
    #[serde(default)]
    pub collect: PatternCollectToggles,
    /// Days a date partition is kept before [`crate::pattern_collector::PatternCollector::cleanup_old_patterns`] deletes it.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: default_patterns_storage(),
            collect: PatternCollectToggles::default(),
            retention_days: default_retention_days(),
        }
    }
}

/// One `hooks.{post_task,on_error}.pattern_collection` entry:
/// whether the matching pattern-collection hook is auto-registered, and at
/// what [`crate::domain::HookPriority`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternCollectionHookConfig {
    /// Whether this hook is auto-registered by [`crate::pattern_hooks::register_pattern_hooks`].
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Priority string (`"low"`, `"normal"`, `"high"`), parsed via [`crate::domain::HookPriority`]'s `serde` impl.
    #[serde(default = "default_priority")]
    pub priority: String,
}

impl Default for PatternCollectionHookConfig {
    fn default() -> Self {
        Self { enabled: true, priority: default_priority() }
    }
}

/// `hooks.post_task.*` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostTaskHooksConfig {
    /// Auto-registered `task_complete` pattern-collection hook.
    pub pattern_collection: PatternCollectionHookConfig,
}

/// `hooks.on_error.*` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnErrorHooksConfig {
    /// Auto-registered `task_failed` pattern-collection hook.
    pub pattern_collection: PatternCollectionHookConfig,
}

/// `hooks.*` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HooksConfig {
    /// Per-phase budget handed to [`crate::hook_registry::HookRegistry::new`].
    #[serde(default = "default_hooks_timeout_ms")]
    pub timeout_ms: u64,
    /// Must be `true` to keep a failing hook from failing the surrounding
    /// task ("must be true to keep hook failures non-fatal").
    #[serde(default = "default_true")]
    pub graceful_degradation: bool,
    /// `post_task.*` auto-registration options.
    #[serde(default)]
    pub post_task: PostTaskHooksConfig,
    /// `on_error.*` auto-registration options.
    #[serde(default)]
    pub on_error: OnErrorHooksConfig,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_hooks_timeout_ms(),
            graceful_degradation: true,
            post_task: PostTaskHooksConfig::default(),
            on_error: OnErrorHooksConfig::default(),
        }
    }
}

/// Root configuration document, merged from `.moai/config/config.json` +
/// `MOAI_FLOW_`-prefixed environment variables over programmatic defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// [`PatternsConfig`].
    #[serde(default)]
    pub patterns: PatternsConfig,
    /// [`HooksConfig`].
    #[serde(default)]
    pub hooks: HooksConfig,
}

fn default_true() -> bool {
    true
}

fn default_patterns_storage() -> String {
    ".moai/data/patterns".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_hooks_timeout_ms() -> u64 {
    5_000
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Path `ConfigLoader::load` reads the project config file from.
pub const DEFAULT_CONFIG_PATH: &str = ".moai/config/config.json";

/// Loads and validates [`Config`], layering defaults -> project file ->
/// environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from [`DEFAULT_CONFIG_PATH`], falling back to defaults for a
    /// missing file and ignoring unknown keys ("unknown keys are
    /// ignored with a warning; missing keys take documented defaults").
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Load from an explicit path, primarily for tests.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Json::file(path.as_ref()))
            .merge(Env::prefixed("MOAI_FLOW_").split("__"))
            .extract()
            .map_err(|err| ConfigError::Io(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject out-of-range or malformed values.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.patterns.retention_days < 0 {
            return Err(ConfigError::InvalidValue {
                field: "patterns.retention_days".to_string(),
                value: config.patterns.retention_days.to_string(),
            });
        }
        if config.hooks.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hooks.timeout_ms".to_string(),
                value: config.hooks.timeout_ms.to_string(),
            });
        }
        for (field, priority) in [
            ("hooks.post_task.pattern_collection.priority", &config.hooks.post_task.pattern_collection.priority),
            ("hooks.on_error.pattern_collection.priority", &config.hooks.on_error.pattern_collection.priority),
        ] {
            if !["low", "normal", "high"].contains(&priority.as_str()) {
                return Err(ConfigError::InvalidValue { field: field.to_string(), value: priority.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).unwrap();
        assert!(config.patterns.enabled);
        assert_eq!(config.hooks.timeout_ms, 5_000);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::load_from_file("/nonexistent/moai-flow-config.json").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"patterns": {{"retention_days": 7}}, "totally_unknown": 1}}"#).unwrap();
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.patterns.retention_days, 7);
    }

    #[test]
    fn negative_retention_days_is_invalid() {
        let mut config = Config::default();
        config.patterns.retention_days = -1;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn zero_hook_timeout_is_invalid() {
        let mut config = Config::default();
        config.hooks.timeout_ms = 0;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
