//! JSON configuration file.
//!
//! Loaded once at startup. Relative store paths default into the data
//! directory (`RECORDSYNC_DATA_DIR` or `~/.recordsync`); the bearer token may
//! come from `RECORDSYNC_ACCESS_TOKEN` instead of the file.

use recordsync_types::{ConfigError, FieldMapping, Mapping};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppResult;
use crate::sync::{StrategyConfig, DEFAULT_SCAN_OVERLAP_MS, MAX_SLACK_MS};

pub const CONFIG_FILE: &str = "recordsync.json";
const DATABASE_FILE: &str = "recordsync.db";
const WATERMARK_FILE: &str = "watermarks.json";
const ACCESS_TOKEN_ENV: &str = "RECORDSYNC_ACCESS_TOKEN";
const DATA_DIR_ENV: &str = "RECORDSYNC_DATA_DIR";
const DATA_DIR: &str = ".recordsync";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default)]
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub staleness_tolerance_ms: u64,
    #[serde(default = "default_scan_overlap_ms")]
    pub scan_overlap_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_modstamp_field")]
    pub modstamp_field: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingConfig {
    pub name: String,
    pub local_table: String,
    pub remote_object: String,
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_scan_overlap_ms() -> u64 {
    DEFAULT_SCAN_OVERLAP_MS
}

fn default_batch_size() -> usize {
    200
}

fn default_api_version() -> String {
    "v59.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_modstamp_field() -> String {
    "SystemModstamp".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// `~/.recordsync/recordsync.json` unless `RECORDSYNC_DATA_DIR` is set.
pub fn default_config_path() -> AppResult<PathBuf> {
    Ok(data_dir()?.join(CONFIG_FILE))
}

/// `RECORDSYNC_DATA_DIR`, else `~/.recordsync`; created when missing.
pub fn data_dir() -> AppResult<PathBuf> {
    resolve_data_dir(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from), dirs::home_dir())
}

fn resolve_data_dir(custom: Option<PathBuf>, home: Option<PathBuf>) -> AppResult<PathBuf> {
    let dir = match (custom, home) {
        (Some(dir), _) => dir,
        (None, Some(home)) => home.join(DATA_DIR),
        (None, None) => {
            return Err(ConfigError::invalid(DATA_DIR_ENV, "unset and no home directory").into());
        },
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Read, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> AppResult<SyncConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() }.into());
    }
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Parse without validating or touching the environment.
pub fn parse_config(content: &str) -> Result<SyncConfig, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::from_json_error(&e))
}

impl SyncConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.remote.access_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mappings.is_empty() {
            return Err(ConfigError::invalid("mappings", "at least one mapping is required"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        for (field, value) in [
            ("staleness_tolerance_ms", self.staleness_tolerance_ms),
            ("scan_overlap_ms", self.scan_overlap_ms),
        ] {
            if value > MAX_SLACK_MS {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} exceeds the {MAX_SLACK_MS} ms limit"),
                ));
            }
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::invalid("interval_secs", "must be at least 1"));
        }
        url::Url::parse(&self.remote.base_url)
            .map_err(|e| ConfigError::invalid("remote.base_url", e.to_string()))?;
        if !is_identifier(&self.remote.modstamp_field) {
            return Err(ConfigError::invalid(
                "remote.modstamp_field",
                format!("{:?} is not a field name", self.remote.modstamp_field),
            ));
        }

        let mut names = HashSet::new();
        for mapping in &self.mappings {
            if !names.insert(mapping.name.as_str()) {
                return Err(ConfigError::invalid(
                    "mappings.name",
                    format!("duplicate mapping name {}", mapping.name),
                ));
            }
            mapping.validate()?;
        }
        Ok(())
    }

    pub fn mapping(&self, name: &str) -> Option<&MappingConfig> {
        self.mappings.iter().find(|m| m.name == name)
    }

    pub fn database_path(&self) -> AppResult<PathBuf> {
        match &self.local.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(DATABASE_FILE)),
        }
    }

    pub fn watermark_path(&self) -> AppResult<PathBuf> {
        match &self.watermark_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(WATERMARK_FILE)),
        }
    }
}

impl MappingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("mappings.name", "mapping name is empty"));
        }
        if !is_identifier(&self.local_table) {
            return Err(ConfigError::invalid(
                "mappings.local_table",
                format!("{:?} is not a table name", self.local_table),
            ));
        }
        if !is_identifier(&self.remote_object) {
            return Err(ConfigError::invalid(
                "mappings.remote_object",
                format!("{:?} is not an object name", self.remote_object),
            ));
        }
        if self.fields.is_empty() {
            return Err(ConfigError::invalid(
                "mappings.fields",
                format!("mapping {} binds no fields", self.name),
            ));
        }
        for field in &self.fields {
            if !is_identifier(&field.local) || !is_identifier(&field.remote) {
                return Err(ConfigError::invalid(
                    "mappings.fields",
                    format!("invalid field name in {} -> {}", field.local, field.remote),
                ));
            }
        }
        self.field_mapping().map(|_| ())
    }

    /// The field table as a [`Mapping`], rejecting conflicting remote fields.
    pub fn field_mapping(&self) -> Result<Mapping, ConfigError> {
        Mapping::from_fields(self.fields.iter().cloned())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use recordsync_types::Converter;

    const SAMPLE: &str = r#"{
        "local": { "database_path": "/tmp/recordsync-test.db" },
        "remote": { "base_url": "https://example.my.salesforce.com" },
        "mappings": [{
            "name": "custom_objects",
            "local_table": "custom_objects",
            "remote_object": "CustomObject__c",
            "fields": [
                { "local": "name", "remote": "Name" },
                { "local": "example", "remote": "Example_Field__c", "converter": "string" }
            ],
            "strategy": { "kind": "passive" }
        }]
    }"#;

    #[test]
    fn test_parse_applies_defaults() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.staleness_tolerance_ms, 0);
        assert_eq!(config.scan_overlap_ms, 5_000);
        assert_eq!(config.remote.api_version, "v59.0");
        assert_eq!(config.remote.modstamp_field, "SystemModstamp");
        assert_eq!(config.mappings[0].strategy, StrategyConfig::Passive);
        assert_eq!(config.mappings[0].fields[1].converter, Converter::String);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.watermark_path = Some(PathBuf::from("/var/lib/recordsync/marks.json"));

        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/recordsync-test.db"));
        assert_eq!(
            config.watermark_path().unwrap(),
            PathBuf::from("/var/lib/recordsync/marks.json")
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_mapping_names() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings.push(config.mappings[0].clone());

        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings[0].local_table = "custom objects; --".to_string();
        assert!(config.validate().is_err());

        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings[0].fields.push(FieldMapping::new("bad name", "Bad__c"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_conflicting_remote_fields() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings[0].fields.push(FieldMapping::new("title", "Name"));

        assert!(matches!(config.validate(), Err(ConfigError::DuplicateRemoteField { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_and_zero_values() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings.clear();
        assert!(config.validate().is_err());

        let mut config = parse_config(SAMPLE).unwrap();
        config.mappings[0].fields.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_window_slack() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.staleness_tolerance_ms = 10_000_000_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError { .. })));

        let mut config = parse_config(SAMPLE).unwrap();
        config.scan_overlap_ms = MAX_SLACK_MS + 1;
        assert!(config.validate().is_err());

        let mut config = parse_config(SAMPLE).unwrap();
        config.staleness_tolerance_ms = MAX_SLACK_MS;
        config.scan_overlap_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_dir_prefers_override_and_creates_it() {
        let tmp = tempfile::tempdir().unwrap();
        let custom = tmp.path().join("state");

        let dir = resolve_data_dir(Some(custom.clone()), Some(tmp.path().join("home"))).unwrap();
        assert_eq!(dir, custom);
        assert!(custom.is_dir());

        let dir = resolve_data_dir(None, Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(dir, tmp.path().join(".recordsync"));
        assert!(resolve_data_dir(None, None).is_err());
    }

    #[test]
    fn test_unknown_converter_is_a_parse_error() {
        let broken = SAMPLE.replace("\"string\"", "\"uuid\"");
        assert!(matches!(parse_config(&broken), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mapping("custom_objects").unwrap().remote_object, "CustomObject__c");
        assert!(config.mapping("missing").is_none());
    }
}
