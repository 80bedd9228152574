use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const PROVIDER_SECTIONS: [&str; 4] = ["openai", "groq", "ollama", "huggingface"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 1.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 100_000)?;
        validate_u64_field(
            llm,
            "llm.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
        validate_optional_string_field(llm, "llm.default_provider", "default_provider")?;

        for provider in PROVIDER_SECTIONS {
            let Some(section) = expect_optional_object(llm, provider)? else {
                continue;
            };
            let prefix = format!("llm.{}", provider);
            validate_optional_string_field(section, &format!("{}.base_url", prefix), "base_url")?;
            validate_optional_string_field(section, &format!("{}.api_key", prefix), "api_key")?;
            validate_optional_string_field(section, &format!("{}.model", prefix), "model")?;
            validate_string_array_field(section, &format!("{}.models", prefix), "models")?;
        }
    }

    if let Some(embeddings) = expect_optional_object(root, "embeddings")? {
        validate_optional_string_field(embeddings, "embeddings.provider", "provider")?;
        validate_optional_string_field(embeddings, "embeddings.model", "model")?;
        validate_u64_field(embeddings, "embeddings.batch_size", "batch_size", 1, 2_048)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_optional_string_field(rag, "rag.documents_dir", "documents_dir")?;
        validate_u64_field(rag, "rag.max_documents", "max_documents", 1, 100_000)?;
        validate_u64_field(rag, "rag.top_k", "top_k", 1, 100)?;
        for key in ["research_chunking", "session_chunking"] {
            if let Some(chunking) = expect_optional_object(rag, key)? {
                validate_chunking(chunking, &format!("rag.{}", key))?;
            }
        }
    }

    if let Some(summarize) = expect_optional_object(root, "summarize")? {
        if let Some(chunking) = expect_optional_object(summarize, "chunking")? {
            validate_chunking(chunking, "summarize.chunking")?;
        }
        validate_u64_field(
            summarize,
            "summarize.collapse_max_chars",
            "collapse_max_chars",
            500,
            10_000_000,
        )?;
        validate_u64_field(
            summarize,
            "summarize.map_concurrency",
            "map_concurrency",
            1,
            64,
        )?;
        validate_u64_field(
            summarize,
            "summarize.summary_words",
            "summary_words",
            10,
            5_000,
        )?;
        validate_u64_field(
            summarize,
            "summarize.fetch_timeout_secs",
            "fetch_timeout_secs",
            1,
            3_600,
        )?;
        validate_optional_string_field(summarize, "summarize.subtitle_lang", "subtitle_lang")?;
        validate_optional_string_field(summarize, "summarize.ytdlp_binary", "ytdlp_binary")?;
    }

    Ok(())
}

fn validate_chunking(section: &Map<String, Value>, path: &str) -> Result<(), ApiError> {
    validate_u64_field(
        section,
        &format!("{}.chunk_size", path),
        "chunk_size",
        1,
        1_000_000,
    )?;
    validate_u64_field(
        section,
        &format!("{}.chunk_overlap", path),
        "chunk_overlap",
        0,
        1_000_000,
    )?;

    let size = section.get("chunk_size").and_then(Value::as_u64);
    let overlap = section.get("chunk_overlap").and_then(Value::as_u64);
    if let (Some(size), Some(overlap)) = (size, overlap) {
        if overlap >= size {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}': chunk_overlap must be smaller than chunk_size",
                path
            )));
        }
    }
    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
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
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_full_config() {
        let config = json!({
            "server": {"host": "0.0.0.0", "port": 8501, "cors_allowed_origins": ["http://localhost:8501"]},
            "llm": {
                "temperature": 0.5,
                "max_tokens": 300,
                "groq": {"api_key": "gsk", "models": ["llama-3.1-8b-instant"]}
            },
            "rag": {"research_chunking": {"chunk_size": 1000, "chunk_overlap": 200}},
            "summarize": {"map_concurrency": 2}
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_temperature_outside_slider_range() {
        let err = validate_config(&json!({"llm": {"temperature": 1.5}})).unwrap_err();
        assert!(err.to_string().contains("llm.temperature"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let err = validate_config(&json!({
            "rag": {"session_chunking": {"chunk_size": 500, "chunk_overlap": 500}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("rag.session_chunking"));
    }

    #[test]
    fn rejects_non_object_sections() {
        let err = validate_config(&json!({"server": "localhost"})).unwrap_err();
        assert!(err.to_string().contains("expected object"));
    }

    #[test]
    fn rejects_empty_origin_entries() {
        let err = validate_config(&json!({"server": {"cors_allowed_origins": [" "]}})).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }
}
