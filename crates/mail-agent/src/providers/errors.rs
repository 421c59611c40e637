use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Usage data error: {0}")]
    UsageError(String),

    #[error("Invalid response: {0}")]
    ResponseParseError(String),
}

impl From<anyhow::Error> for ProviderError {
    fn from(error: anyhow::Error) -> Self {
        ProviderError::ExecutionError(error.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::RequestFailed(format!("Request timed out: {}", error))
        } else {
            ProviderError::ExecutionError(error.to_string())
        }
    }
}

/// The `error` object of an OpenAI error body
#[derive(serde::Deserialize, Debug)]
pub struct OpenAIError {
    #[serde(default, deserialize_with = "code_as_string")]
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

// `code` is a string on most endpoints but a number on some compatible servers
fn code_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use std::fmt;

    use serde::de::{self, Visitor};

    struct CodeVisitor;

    impl<'de> Visitor<'de> for CodeVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a number, null, or none for the code field")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(CodeVisitor)
        }
    }

    deserializer.deserialize_option(CodeVisitor)
}

impl OpenAIError {
    pub fn is_context_length_exceeded(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("context_length_exceeded") | Some("string_above_max_length")
        )
    }
}

impl std::fmt::Display for OpenAIError {
    /// "Invalid API key (code: invalid_api_key, type: client_error)", or just the
    /// message when neither code nor type is present.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        let details: Vec<String> = [
            self.code.as_ref().map(|c| format!("code: {}", c)),
            self.error_type.as_ref().map(|t| format!("type: {}", t)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_error_code_variants() {
        let err: OpenAIError = serde_json::from_value(json!({
            "message": "This model's maximum context length is 1047576 tokens",
            "code": "context_length_exceeded",
            "type": "invalid_request_error"
        }))
        .unwrap();
        assert!(err.is_context_length_exceeded());

        let err: OpenAIError =
            serde_json::from_value(json!({"message": "Bad gateway", "code": 502})).unwrap();
        assert_eq!(err.code.as_deref(), Some("502"));
        assert!(!err.is_context_length_exceeded());

        let err: OpenAIError = serde_json::from_value(json!({"message": "Oops"})).unwrap();
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_openai_error_display() {
        let err = OpenAIError {
            code: Some("invalid_api_key".to_string()),
            message: Some("Invalid API key".to_string()),
            error_type: Some("client_error".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Invalid API key (code: invalid_api_key, type: client_error)"
        );

        let err = OpenAIError {
            code: None,
            message: Some("Foo".to_string()),
            error_type: None,
        };
        assert_eq!(err.to_string(), "Foo");
    }
}
