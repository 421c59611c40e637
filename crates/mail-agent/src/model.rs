use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Configuration for model-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The name of the model to use
    pub model_name: String,
    /// Optional temperature setting (0.0 - 1.0)
    pub temperature: Option<f32>,
    /// Optional maximum tokens to generate
    pub max_tokens: Option<i32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL.to_string())
    }
}

impl ModelConfig {
    /// Create a new ModelConfig with the specified model name.
    ///
    /// `MAIL_AGENT_TEMPERATURE` seeds the temperature when it parses as a float.
    pub fn new(model_name: String) -> Self {
        let temperature = std::env::var("MAIL_AGENT_TEMPERATURE")
            .ok()
            .and_then(|val| val.parse::<f32>().ok());

        Self {
            model_name,
            temperature,
            max_tokens: None,
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temp: Option<f32>) -> Self {
        self.temperature = temp;
        self
    }

    /// Set the max tokens
    pub fn with_max_tokens(mut self, tokens: Option<i32>) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Reasoning models reject `temperature` and take `max_completion_tokens`
    pub fn is_reasoning_model(&self) -> bool {
        let name = self.model_name.as_str();
        name.starts_with('o') && name.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    }
}
