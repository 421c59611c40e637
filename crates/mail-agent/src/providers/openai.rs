use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::base::{Provider, ProviderUsage, Usage};
use super::errors::ProviderError;
use super::formats::openai::{create_request, get_usage, response_to_message};
use super::utils::{emit_debug_trace, get_model, handle_response_openai_compat};
use crate::config::Config;
use crate::message::Message;
use crate::model::ModelConfig;
use crate::tools::Tool;

pub const OPEN_AI_DEFAULT_MODEL: &str = "gpt-4.1";
pub const OPEN_AI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const OPEN_AI_DEFAULT_BASE_PATH: &str = "v1/chat/completions";
pub const OPEN_AI_DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Connection settings for an OpenAI compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub custom_headers: Option<HashMap<String, String>>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    OPEN_AI_DEFAULT_HOST.to_string()
}

fn default_base_path() -> String {
    OPEN_AI_DEFAULT_BASE_PATH.to_string()
}

fn default_timeout() -> u64 {
    OPEN_AI_DEFAULT_TIMEOUT_SECS
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: default_host(),
            base_path: default_base_path(),
            organization: None,
            project: None,
            custom_headers: None,
            timeout_secs: default_timeout(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

#[derive(Debug, Serialize)]
pub struct OpenAiProvider {
    #[serde(skip)]
    client: Client,
    host: String,
    base_path: String,
    #[serde(skip)]
    api_key: String,
    organization: Option<String>,
    project: Option<String>,
    model: ModelConfig,
    custom_headers: Option<HashMap<String, String>>,
}

impl OpenAiProvider {
    /// Read the connection settings from the global [`Config`]
    pub fn from_env(model: ModelConfig) -> Result<Self> {
        let config = Config::global();
        let api_key: String = config.get_secret("OPENAI_API_KEY")?;
        let host: String = config
            .get_param("OPENAI_HOST")
            .unwrap_or_else(|_| default_host());
        let base_path: String = config
            .get_param("OPENAI_BASE_PATH")
            .unwrap_or_else(|_| default_base_path());
        let organization: Option<String> = config.get_param("OPENAI_ORGANIZATION").ok();
        let project: Option<String> = config.get_param("OPENAI_PROJECT").ok();
        let custom_headers: Option<HashMap<String, String>> = config
            .get_secret::<String>("OPENAI_CUSTOM_HEADERS")
            .or_else(|_| config.get_param::<String>("OPENAI_CUSTOM_HEADERS"))
            .ok()
            .map(parse_custom_headers);
        let timeout_secs: u64 = config
            .get_param("OPENAI_TIMEOUT")
            .unwrap_or(OPEN_AI_DEFAULT_TIMEOUT_SECS);

        Self::from_config(
            OpenAiProviderConfig {
                api_key,
                host,
                base_path,
                organization,
                project,
                custom_headers,
                timeout_secs,
            },
            model,
        )
    }

    pub fn from_config(config: OpenAiProviderConfig, model: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: config.host,
            base_path: config.base_path,
            api_key: config.api_key,
            organization: config.organization,
            project: config.project,
            model,
            custom_headers: config.custom_headers,
        })
    }

    fn add_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }

        if let Some(project) = &self.project {
            request = request.header("OpenAI-Project", project);
        }

        if let Some(custom_headers) = &self.custom_headers {
            for (key, value) in custom_headers {
                request = request.header(key, value);
            }
        }

        request
    }

    async fn post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let base_url = url::Url::parse(&self.host)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid base URL: {e}")))?;
        let url = base_url.join(&self.base_path).map_err(|e| {
            ProviderError::RequestFailed(format!("Failed to construct endpoint URL: {e}"))
        })?;

        let request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let request = self.add_headers(request);

        let response = request.json(payload).send().await?;
        handle_response_openai_compat(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn get_model_config(&self) -> ModelConfig {
        self.model.clone()
    }

    #[tracing::instrument(
        skip(self, system, messages, tools),
        fields(model_config, input, output, input_tokens, output_tokens, total_tokens)
    )]
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, ProviderUsage), ProviderError> {
        let payload = create_request(&self.model, system, messages, tools)?;

        let response = self.post(&payload).await?;

        let message = response_to_message(response.clone())
            .map_err(|e| ProviderError::ResponseParseError(e.to_string()))?;
        let usage = response.get("usage").map(get_usage).unwrap_or_else(|| {
            tracing::debug!("Failed to get usage data");
            Usage::default()
        });
        let model = get_model(&response);
        emit_debug_trace(&self.model, &payload, &response, &usage);
        Ok((message, ProviderUsage::new(model, usage)))
    }
}

/// Parse `key=value` pairs separated by commas
fn parse_custom_headers(s: String) -> HashMap<String, String> {
    s.split(',')
        .filter_map(|header| {
            let mut parts = header.splitn(2, '=');
            let key = parts.next().map(|s| s.trim().to_string())?;
            let value = parts.next().map(|s| s.trim().to_string())?;
            Some((key, value))
        })
        .collect()
}
