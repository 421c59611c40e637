pub mod agents;
pub mod checkpoint;
pub mod config;
pub mod message;
pub mod model;
pub mod prompt_template;
pub mod providers;
pub mod state;
pub mod tools;
pub mod utils;
