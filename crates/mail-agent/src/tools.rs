//! Tool descriptors and the backend tool registry
//!
//! Frontend tools are supplied by the UI on every turn and are never executed
//! here. Backend tools are registered once at startup and executed in-process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{Content, ToolResult};
use crate::state::ConversationState;

/// A tool that can be used by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    #[serde(default)]
    pub description: String,
    /// A JSON Schema object defining the expected parameters for the tool
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl Tool {
    pub fn new<N, D>(name: N, description: D, input_schema: serde_json::Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrigin {
    Frontend,
    Backend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    #[serde(flatten)]
    pub tool: Tool,
    pub origin: ToolOrigin,
}

impl ToolDescriptor {
    pub fn frontend(tool: Tool) -> Self {
        Self {
            tool,
            origin: ToolOrigin::Frontend,
        }
    }

    pub fn backend(tool: Tool) -> Self {
        Self {
            tool,
            origin: ToolOrigin::Backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

/// The frontend actions the UI reported for the current turn.
#[derive(Debug, Clone, Default)]
pub struct FrontendTools {
    tools: Vec<Tool>,
    names: HashSet<String>,
}

impl FrontendTools {
    pub fn new(tools: Vec<Tool>) -> Self {
        let mut names = HashSet::new();
        let tools = tools
            .into_iter()
            .filter(|tool| names.insert(tool.name.clone()))
            .collect();
        Self { tools, names }
    }

    /// Keep only descriptors of frontend origin. Backend descriptors sent by a
    /// caller are ignored; the backend set comes from the registry.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        Self::new(
            descriptors
                .into_iter()
                .filter(|d| d.origin == ToolOrigin::Frontend)
                .map(|d| d.tool)
                .collect(),
        )
    }

    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A tool executed server-side.
///
/// Implementations may update any field of the conversation state; those
/// changes are visible to the next model invocation.
#[async_trait]
pub trait BackendTool: Send + Sync {
    fn tool(&self) -> Tool;

    async fn call(
        &self,
        arguments: serde_json::Value,
        state: &mut ConversationState,
    ) -> ToolResult<Vec<Content>>;
}

/// Process-wide set of backend tools. Built once, then shared read-only.
#[derive(Clone, Default)]
pub struct BackendToolRegistry {
    tools: HashMap<String, Arc<dyn BackendTool>>,
}

impl BackendToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: impl BackendTool + 'static) -> Self {
        let name = tool.tool().name;
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            tracing::warn!("backend tool {} registered twice, keeping the last one", name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendTool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool definitions sorted by name so the bound schema is stable across turns
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.values().map(|t| t.tool()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for BackendToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("BackendToolRegistry")
            .field("tools", &names)
            .finish()
    }
}

/// The combined schema bound for one model invocation.
///
/// Frontend descriptors win on a name clash; such a name is always routed
/// back to the UI, so the backend variant could never run.
pub fn bind_tools(frontend: &FrontendTools, registry: &BackendToolRegistry) -> Vec<ToolDescriptor> {
    let mut bound: Vec<ToolDescriptor> = frontend
        .tools()
        .iter()
        .cloned()
        .map(ToolDescriptor::frontend)
        .collect();

    for tool in registry.tools() {
        if frontend.contains(&tool.name) {
            tracing::debug!("backend tool {} shadowed by a frontend tool", tool.name);
            continue;
        }
        bound.push(ToolDescriptor::backend(tool));
    }

    bound
}
