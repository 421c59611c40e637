use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
}

impl Settings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = ConfigBuilder::<DefaultState>::default()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8000)?
            // MAIL_AGENT_SERVER__HOST, MAIL_AGENT_SERVER__PORT
            .add_source(
                Environment::with_prefix("MAIL_AGENT_SERVER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
