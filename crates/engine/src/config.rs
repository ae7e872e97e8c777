use std::path::Path;

use serde::Deserialize;

use checklist_storage::SqliteStorage;

use crate::dispatch::Backoff;
use crate::error::EngineError;
use crate::visibility::ValidityRules;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub remote: RemoteConfig,
    pub validation: ValidationConfig,
    pub outbox: OutboxConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub text_min_len: usize,
    pub gate_negative_value: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let rules = ValidityRules::default();
        Self {
            text_min_len: rules.text_min_len,
            gate_negative_value: rules.gate_negative_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// SQLite file of the mutation log. In-memory when unset.
    pub path: Option<String>,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            path: None,
            retry_base_ms: 1_000,
            retry_max_ms: 5 * 60 * 1_000,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.remote.base_url.trim().is_empty() {
            return Err(EngineError::Config("remote.base_url is empty".into()));
        }
        if self.outbox.retry_base_ms == 0 || self.outbox.retry_max_ms < self.outbox.retry_base_ms {
            return Err(EngineError::Config(
                "outbox.retry_max_ms must be >= retry_base_ms > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn validity_rules(&self) -> ValidityRules {
        ValidityRules {
            text_min_len: self.validation.text_min_len,
            gate_negative_value: self.validation.gate_negative_value.clone(),
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            base_ms: self.outbox.retry_base_ms,
            max_ms: self.outbox.retry_max_ms,
        }
    }

    /// Open the mutation log at `outbox.path`, or in memory when unset.
    pub fn open_storage(&self) -> Result<SqliteStorage, EngineError> {
        let storage = match self.outbox.path.as_deref() {
            Some(path) => SqliteStorage::open(path)?,
            None => SqliteStorage::open_in_memory()?,
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checklist_storage::MutationLog;

    #[test]
    fn empty_file_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.validity_rules(), ValidityRules::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [remote]
            base_url = "https://pest.example.test/api"
            auth_token = "secret"

            [validation]
            text_min_len = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.remote.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.validity_rules().text_min_len, 10);
        assert_eq!(config.validity_rules().gate_negative_value, "0");
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let err = EngineConfig::from_toml_str(
            "[outbox]\nretry_base_ms = 5000\nretry_max_ms = 10\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[outbox]\npath = \"outbox.db\"\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.outbox.path.as_deref(), Some("outbox.db"));
        assert!(EngineConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn outbox_path_selects_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.db");
        let config = EngineConfig::from_toml_str(&format!(
            "[outbox]\npath = {:?}\n",
            path.to_str().unwrap()
        ))
        .unwrap();
        assert_eq!(config.open_storage().unwrap().pending_count().unwrap(), 0);
        assert!(path.exists());
        assert!(EngineConfig::default().open_storage().is_ok());
    }
}
