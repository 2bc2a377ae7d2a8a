//! Configuration types for carryover.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Where items are read from.
    pub source: SourceConfig,
    /// Where items are written to.
    pub destination: DestinationConfig,
    /// Transfer settings.
    #[serde(default)]
    pub settings: TransferSettings,
}

/// Source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// JSON export file.
    #[serde(rename = "json_file")]
    JsonFile(crate::clients::json_file::JsonFileConfig),
}

/// Destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DestinationConfig {
    /// One directory per container on the local filesystem.
    #[serde(rename = "directory")]
    Directory(crate::clients::directory::DirectoryConfig),
}

/// Transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Number of item identifiers requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Checkpoint file path.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Save the checkpoint after this many committed items (1 = every item).
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Retry behaviour for remote calls.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Category to container mapping rules.
    #[serde(default)]
    pub mapping: MappingSettings,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            checkpoint_path: default_checkpoint_path(),
            checkpoint_interval: default_checkpoint_interval(),
            retry: RetrySettings::default(),
            mapping: MappingSettings::default(),
        }
    }
}

/// Retry settings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per operation, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failure; doubles on each further failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add up to 25% random jitter to each delay.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

/// Category mapping rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Explicit category -> container names, used verbatim.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    /// Categories that are never transferred.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Prefixes removed from category names before sanitizing.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,
    /// Characters not allowed in container names (control characters always are).
    #[serde(default = "default_illegal_chars")]
    pub illegal_chars: String,
    /// Replacement for illegal characters.
    #[serde(default = "default_substitute")]
    pub substitute: char,
    /// Treat container names differing only in case as colliding.
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            exclude: default_exclude(),
            strip_prefixes: default_strip_prefixes(),
            illegal_chars: default_illegal_chars(),
            substitute: default_substitute(),
            case_insensitive: true,
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("progress.json")
}

fn default_checkpoint_interval() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_exclude() -> Vec<String> {
    [
        "CHAT",
        "CATEGORY_FORUMS",
        "CATEGORY_UPDATES",
        "CATEGORY_PROMOTIONS",
        "CATEGORY_SOCIAL",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_strip_prefixes() -> Vec<String> {
    vec!["[Gmail]/".to_string()]
}

fn default_illegal_chars() -> String {
    "/\\*%\"".to_string()
}

fn default_substitute() -> char {
    '_'
}

fn default_true() -> bool {
    true
}

impl MappingSettings {
    /// Whether `c` may not appear in a container name.
    #[must_use]
    pub fn is_illegal(&self, c: char) -> bool {
        c.is_control() || self.illegal_chars.contains(c)
    }

    /// Validates override targets and the substitute character.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for empty, dot-only or illegal override
    /// targets, for two overrides sharing a container, or for an illegal
    /// substitute.
    pub fn validate(&self) -> Result<()> {
        if self.is_illegal(self.substitute) {
            return Err(Error::Config(format!(
                "mapping.substitute '{}' is itself an illegal character",
                self.substitute.escape_default()
            )));
        }

        let mut targets: BTreeMap<String, &str> = BTreeMap::new();
        for (category, container) in &self.overrides {
            if container.trim().chars().all(|c| c == '.') {
                return Err(Error::Config(format!(
                    "mapping override for '{}' is empty or only dots",
                    category
                )));
            }
            if let Some(c) = container.chars().find(|c| self.is_illegal(*c)) {
                return Err(Error::Config(format!(
                    "mapping override '{}' -> '{}' contains illegal character '{}'",
                    category,
                    container,
                    c.escape_default()
                )));
            }
            let key = if self.case_insensitive {
                container.to_lowercase()
            } else {
                container.clone()
            };
            if let Some(previous) = targets.insert(key, category) {
                return Err(Error::Config(format!(
                    "categories '{}' and '{}' are both mapped to container '{}'",
                    previous, category, container
                )));
            }
        }
        Ok(())
    }
}

impl TransferConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Configuration file '{}' could not be read: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.settings.page_size == 0 {
            return Err(Error::Config(
                "page_size must be greater than 0".to_string(),
            ));
        }
        if self.settings.checkpoint_interval == 0 {
            return Err(Error::Config(
                "checkpoint_interval must be greater than 0".to_string(),
            ));
        }
        if self.settings.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.settings.checkpoint_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "checkpoint_path cannot be empty".to_string(),
            ));
        }
        self.settings.mapping.validate()?;

        match &self.source {
            SourceConfig::JsonFile(cfg) => {
                if cfg.path.as_os_str().is_empty() {
                    return Err(Error::Config("source.path cannot be empty".to_string()));
                }
            }
        }
        match &self.destination {
            DestinationConfig::Directory(cfg) => {
                if cfg.path.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "destination.path cannot be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::directory::DirectoryConfig;
    use crate::clients::json_file::JsonFileConfig;

    fn sample_config() -> TransferConfig {
        TransferConfig {
            source: SourceConfig::JsonFile(JsonFileConfig {
                path: PathBuf::from("export.json"),
            }),
            destination: DestinationConfig::Directory(DirectoryConfig {
                path: PathBuf::from("./mail"),
            }),
            settings: TransferSettings::default(),
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = TransferSettings::default();
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.checkpoint_interval, 1);
        assert_eq!(settings.checkpoint_path, PathBuf::from("progress.json"));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.mapping.substitute, '_');
        assert!(settings.mapping.exclude.contains(&"CHAT".to_string()));
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_config_validate_page_size() {
        let mut config = sample_config();
        config.settings.page_size = 0;

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_validate_duplicate_override_targets() {
        let mut config = sample_config();
        config
            .settings
            .mapping
            .overrides
            .insert("SENT".into(), "Sent".into());
        config
            .settings
            .mapping
            .overrides
            .insert("Sent Mail".into(), "sent".into());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("both mapped"));
    }

    #[test]
    fn test_config_validate_illegal_override() {
        let mut config = sample_config();
        config
            .settings
            .mapping
            .overrides
            .insert("Work".into(), "Work/Old".into());

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_validate_dot_override() {
        let mut config = sample_config();
        config
            .settings
            .mapping
            .overrides
            .insert("Work".into(), "..".into());

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
source:
  type: json_file
  path: ./export.json
destination:
  type: directory
  path: ./mail
settings:
  page_size: 25
  checkpoint_interval: 10
  retry:
    max_attempts: 5
    base_delay_ms: 200
  mapping:
    overrides:
      "[Gmail]/Sent Mail": Sent
"#;
        let config: TransferConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.page_size, 25);
        assert_eq!(config.settings.checkpoint_interval, 10);
        assert_eq!(config.settings.retry.max_attempts, 5);
        assert_eq!(config.settings.retry.max_delay_ms, 60_000);
        assert_eq!(
            config.settings.mapping.overrides.get("[Gmail]/Sent Mail"),
            Some(&"Sent".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = TransferConfig::from_file(Path::new("/definitely/not/here.yaml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
