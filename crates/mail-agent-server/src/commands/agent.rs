use std::sync::Arc;

use crate::configuration;
use crate::state;
use anyhow::Result;
use mail_agent::agents::Agent;
use mail_agent::checkpoint::InMemoryCheckpointer;
use mail_agent::config::Config;
use mail_agent::model::{ModelConfig, DEFAULT_MODEL};
use mail_agent::providers;
use mail_agent::tools::BackendToolRegistry;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub async fn run() -> Result<()> {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    crate::logging::setup_logging(Some("mail-agentd"))?;

    let settings = configuration::Settings::new()?;

    let config = Config::global();
    let provider_name: String = config
        .get_param("MAIL_AGENT_PROVIDER")
        .unwrap_or_else(|_| "openai".to_string());
    let model_name: String = config
        .get_param("MAIL_AGENT_MODEL")
        .unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let provider = providers::create(&provider_name, ModelConfig::new(model_name.clone()))?;
    let agent = Agent::new(
        provider,
        Arc::new(InMemoryCheckpointer::new()),
        Arc::new(BackendToolRegistry::new()),
    );
    info!(
        provider = %provider_name,
        model = %model_name,
        max_turns = agent.max_turns(),
        "agent ready"
    );

    let app_state = state::AppState::new(Arc::new(agent));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = crate::routes::configure(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
