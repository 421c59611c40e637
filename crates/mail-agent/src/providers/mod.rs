pub mod base;
pub mod errors;
mod factory;
pub mod formats;
pub mod openai;
pub mod utils;

pub use base::{Provider, ProviderUsage, Usage};
pub use errors::ProviderError;
pub use factory::{create, PROVIDERS};
