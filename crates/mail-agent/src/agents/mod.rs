mod agent;
pub mod reply_parts;
pub mod router;
pub mod tool_execution;
mod types;

pub use agent::{Agent, AgentEvent, DEFAULT_MAX_TURNS, MAX_TURNS_MESSAGE, UNREPORTED_UI_RESULT};
pub use reply_parts::ModelResponse;
pub use router::{decide, RouteDecision};
pub use types::{AgentError, TurnPhase, TurnRequest};
