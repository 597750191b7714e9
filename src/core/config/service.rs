use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use super::paths::AppPaths;
use super::types::AppConfig;
use super::validation::validate_config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    /// Public config deep-merged with secrets, before typing.
    pub fn load_raw(&self) -> Result<Value, ConfigError> {
        let public_config = load_yaml_file(&self.paths.config_path)?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let merged = self.load_raw()?;
        validate_config(&merged)?;
        let mut config: AppConfig = serde_json::from_value(merged)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        Ok(config)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

/// Environment variables win over both YAML files.
pub(crate) fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(port) = read("PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.server.port = port;
    }
    if let Some(host) = read("AITALKS_HOST") {
        config.server.host = host;
    }

    override_keys(
        &mut config.llm.api_keys,
        read("LLM_API_KEY"),
        read("LLM_API_KEY_SECONDARY"),
    );
    override_keys(
        &mut config.embedding.api_keys,
        read("EMBEDDING_API_KEY"),
        read("EMBEDDING_API_KEY_SECONDARY"),
    );

    if let Some(token) = read("ADMIN_TOKEN") {
        config.admin.token = Some(token);
    }
}

fn override_keys(keys: &mut Vec<String>, primary: Option<String>, secondary: Option<String>) {
    if let Some(primary) = primary {
        if keys.is_empty() {
            keys.push(primary);
        } else {
            keys[0] = primary;
        }
    }
    if let Some(secondary) = secondary {
        match keys.len() {
            0 | 1 => keys.push(secondary),
            _ => keys[1] = secondary,
        }
    }
    keys.retain(|key| !key.trim().is_empty());
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, override_value) => override_value.clone(),
    }
}
