use serde_json::{Map, Value};

use super::service::ConfigError;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_string_array_field(llm, "llm.api_keys", "api_keys")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 65_536)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 600)?;
        validate_u64_field(llm, "llm.history_turns", "history_turns", 0, 50)?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_string_array_field(embedding, "embedding.api_keys", "api_keys")?;
        validate_u64_field(embedding, "embedding.dimensions", "dimensions", 1, 16_384)?;
        validate_u64_field(embedding, "embedding.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_f64_field(
            retrieval,
            "retrieval.similarity_threshold",
            "similarity_threshold",
            0.0,
            1.0,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.speaker_match_count",
            "speaker_match_count",
            1,
            500,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.default_match_count",
            "default_match_count",
            1,
            500,
        )?;
        validate_u64_field(retrieval, "retrieval.keyword_limit", "keyword_limit", 1, 100)?;
        validate_u64_field(retrieval, "retrieval.max_keywords", "max_keywords", 1, 20)?;
        validate_u64_field(
            retrieval,
            "retrieval.min_keyword_len",
            "min_keyword_len",
            1,
            20,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.prompt_context_limit",
            "prompt_context_limit",
            1,
            100,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.stage_timeout_secs",
            "stage_timeout_secs",
            1,
            600,
        )?;
    }

    if let Some(scrape) = expect_optional_object(root, "scrape")? {
        validate_bool_field(scrape, "scrape.enabled", "enabled")?;
        validate_optional_string_field(scrape, "scrape.url", "url")?;
        validate_u64_field(scrape, "scrape.max_chars", "max_chars", 100, 100_000)?;
        validate_u64_field(scrape, "scrape.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(admin) = expect_optional_object(root, "admin")? {
        validate_optional_string_field(admin, "admin.token", "token")?;
    }

    if let Some(storage) = expect_optional_object(root, "storage")? {
        validate_optional_string_field(storage, "storage.database_file", "database_file")?;
    }

    if let Some(event) = expect_optional_object(root, "event")? {
        validate_optional_string_field(event, "event.profile_path", "profile_path")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid(format!(
            "'{}' must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid(format!(
            "'{}' must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        if item.as_str().is_none() {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!("'{}': expected {}", path, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_partial_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "retrieval": {"similarity_threshold": 0.68, "speaker_match_count": 30},
            "scrape": {"enabled": false}
        }))
        .is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = validate_config(&json!({"retrieval": {"similarity_threshold": 1.5}}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("retrieval.similarity_threshold"));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(validate_config(&json!({"llm": "gemini"})).is_err());
        assert!(validate_config(&json!({"llm": {"api_keys": [1, 2]}})).is_err());
        assert!(validate_config(&json!({"scrape": {"enabled": "yes"}})).is_err());
    }
}
