//! Ollama HTTP client for local LLM field extraction.

use serde::{Deserialize, Serialize};

use super::error::StageError;

/// Blocking client abstraction over the LLM service, so stages can be
/// tested with canned responses.
pub trait LlmClient {
    /// Run one generation constrained to the given JSON schema and return
    /// the raw response text.
    fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, StageError>;
}

/// Ollama client against a local instance.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

/// Request body for Ollama /api/generate. `format` carries a JSON schema
/// that constrains the model output.
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl LlmClient for OllamaClient {
    fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, StageError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
            format: schema,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                StageError::OllamaConnection(self.base_url.clone())
            } else if e.is_timeout() {
                StageError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                StageError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StageError::ServiceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| StageError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Parse a schema-constrained model response into a single JSON object.
/// Models answer either with the object itself or a one-element array
/// wrapping it.
pub fn parse_object_response(
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, StageError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| StageError::ResponseParsing(format!("Model output is not JSON: {e}")))?;

    match value {
        serde_json::Value::Object(obj) => Ok(obj),
        serde_json::Value::Array(items) => items
            .into_iter()
            .find_map(|item| match item {
                serde_json::Value::Object(obj) => Some(obj),
                _ => None,
            })
            .ok_or_else(|| {
                StageError::ResponseParsing("Model returned an array without an object".to_string())
            }),
        other => Err(StageError::ResponseParsing(format!(
            "Model returned unexpected JSON type: {other}"
        ))),
    }
}

/// Pull one string field out of a parsed model object, empty when absent.
pub fn string_field(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object() {
        let obj = parse_object_response(r#"{"person_name": "Mary Smith"}"#).unwrap();
        assert_eq!(string_field(&obj, "person_name"), "Mary Smith");
    }

    #[test]
    fn parses_single_element_array() {
        let obj = parse_object_response(r#"[{"cause_of_death": "cholera"}]"#).unwrap();
        assert_eq!(string_field(&obj, "cause_of_death"), "cholera");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_object_response("I think the answer is..."),
            Err(StageError::ResponseParsing(_))
        ));
    }

    #[test]
    fn rejects_array_without_object() {
        assert!(parse_object_response(r#"["just", "strings"]"#).is_err());
    }

    #[test]
    fn missing_field_is_empty_string() {
        let obj = parse_object_response(r#"{"event_date": "July 4, 1866"}"#).unwrap();
        assert_eq!(string_field(&obj, "event_location"), "");
        assert_eq!(string_field(&obj, "event_date"), "July 4, 1866");
    }
}
