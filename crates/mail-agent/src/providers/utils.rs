use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde_json::{from_value, Value};

use super::base::Usage;
use super::errors::{OpenAIError, ProviderError};
use crate::model::ModelConfig;

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("static regex"));

#[derive(serde::Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// Map the status and body of an OpenAI compatible response onto a ProviderError.
/// Error codes: https://platform.openai.com/docs/guides/error-codes
pub async fn handle_response_openai_compat(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let payload = match response.json::<Value>().await {
        Ok(json) => json,
        Err(e) => {
            return Err(ProviderError::RequestFailed(format!(
                "Unreadable response body (status {}): {}",
                status, e
            )))
        }
    };

    match status {
        StatusCode::OK => Ok(payload),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Authentication(format!(
                "Authentication failed. Please ensure your API keys are valid and have the required permissions. \
                Status: {}. Response: {:?}",
                status, payload
            )))
        }
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            if let Ok(err_resp) = from_value::<OpenAIErrorResponse>(payload) {
                let err = err_resp.error;
                if err.is_context_length_exceeded() {
                    return Err(ProviderError::ContextLengthExceeded(
                        err.message.unwrap_or_else(|| "Unknown error".to_string()),
                    ));
                }
                return Err(ProviderError::RequestFailed(format!(
                    "{} (status {})",
                    err,
                    status.as_u16()
                )));
            }
            Err(ProviderError::RequestFailed(format!(
                "Unknown error (status {})",
                status
            )))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::RateLimitExceeded(format!("{:?}", payload)))
        }
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            Err(ProviderError::ServerError(format!("{:?}", payload)))
        }
        _ => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            Err(ProviderError::RequestFailed(format!(
                "Request failed with status: {}",
                status
            )))
        }
    }
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty() && !INVALID_NAME_CHARS.is_match(name)
}

/// Extract the model name from a JSON object. Common with most providers to have this top level attribute.
pub fn get_model(data: &Value) -> String {
    data.get("model")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn emit_debug_trace(
    model_config: &ModelConfig,
    payload: &Value,
    response: &Value,
    usage: &Usage,
) {
    tracing::debug!(
        model_config = %serde_json::to_string_pretty(model_config).unwrap_or_default(),
        input = %serde_json::to_string_pretty(payload).unwrap_or_default(),
        output = %serde_json::to_string_pretty(response).unwrap_or_default(),
        input_tokens = ?usage.input_tokens.unwrap_or_default(),
        output_tokens = ?usage.output_tokens.unwrap_or_default(),
        total_tokens = ?usage.total_tokens.unwrap_or_default(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("setFilters"), "setFilters");
        assert_eq!(sanitize_function_name("reply to email"), "reply_to_email");
        assert_eq!(sanitize_function_name("mail.send@v2"), "mail_send_v2");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("fillComposeForm"));
        assert!(is_valid_function_name("send_email-backend"));
        assert!(!is_valid_function_name("send email"));
        assert!(!is_valid_function_name(""));
    }

    #[test]
    fn test_get_model() {
        assert_eq!(get_model(&json!({"model": "gpt-4.1-2025-04-14"})), "gpt-4.1-2025-04-14");
        assert_eq!(get_model(&json!({"model": 4})), "Unknown");
        assert_eq!(get_model(&json!({})), "Unknown");
    }
}
