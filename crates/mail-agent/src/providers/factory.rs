use std::sync::Arc;

use anyhow::Result;

use super::{base::Provider, openai::OpenAiProvider};
use crate::model::ModelConfig;

/// Names accepted by [`create`]
pub const PROVIDERS: &[&str] = &["openai"];

pub fn create(name: &str, model: ModelConfig) -> Result<Arc<dyn Provider>> {
    // Arc so the provider can be shared by concurrent turns
    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::from_env(model)?)),
        _ => Err(anyhow::anyhow!("Unknown provider: {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let result = create("carrier-pigeon", ModelConfig::default());
        let err = result.err().unwrap();
        assert_eq!(err.to_string(), "Unknown provider: carrier-pigeon");
        assert!(!PROVIDERS.contains(&"carrier-pigeon"));
    }
}
