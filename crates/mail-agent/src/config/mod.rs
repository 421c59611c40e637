mod base;

pub use base::{Config, ConfigError, APP_STRATEGY};
