use mail_agent::agents::Agent;
use std::sync::Arc;

pub type AgentRef = Arc<Agent>;

#[derive(Clone)]
pub struct AppState {
    agent: AgentRef,
}

impl AppState {
    pub fn new(agent: AgentRef) -> Arc<AppState> {
        Arc::new(Self { agent })
    }

    pub fn agent(&self) -> AgentRef {
        self.agent.clone()
    }
}
