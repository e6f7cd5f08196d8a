// [[CASCADE]]/apps/kernel-server/src/models.rs
// Purpose: Shared data model: workflow configs, run state, delegation, wire contracts.
// Architecture: Shared Data Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model tier requested for a node. Resolved to a canonical string right
/// before dispatch so the inference service owns the actual model mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Fast,
    Reasoning,
    Thinking,

    // Escape hatch for pinning an exact model id
    #[serde(untagged)]
    Custom(String),
}

impl Default for ModelVariant {
    fn default() -> Self {
        ModelVariant::Fast
    }
}

impl ModelVariant {
    /// Canonical wire string for the inference service.
    pub fn resolve(&self) -> String {
        match self {
            ModelVariant::Fast => "fast".to_string(),
            ModelVariant::Reasoning => "reasoning".to_string(),
            ModelVariant::Thinking => "thinking".to_string(),
            ModelVariant::Custom(id) => id.clone(),
        }
    }

    /// Thinking budget is only set for the deep-reasoning tier.
    pub fn thinking_budget(&self) -> Option<i32> {
        match self {
            ModelVariant::Thinking => Some(5),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Orchestrator,
    Worker,
    Observer,
}

/// Static description of one agent node. Appears in workflow submissions and
/// in delegation requests; graph surgery is the only thing that mutates these
/// after a run starts (appending new nodes, rewriting `depends_on`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNodeConfig {
    pub id: String,
    pub role: AgentRole,
    #[serde(default)]
    pub model: ModelVariant,
    pub prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    // Dependencies relative to the surrounding workflow
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default)]
    pub accepts_directive: bool,
    // Runtime task from the operator, forwarded verbatim
    #[serde(default)]
    pub user_directive: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub id: String,
    pub name: String,
    pub agents: Vec<AgentNodeConfig>,
    // Filenames from the library tier to attach to this run's input dir
    #[serde(default)]
    pub attached_files: Vec<String>,
    #[serde(default)]
    pub max_token_budget: usize,
    // Accepted for forward compatibility; enforcement lives outside the kernel
    #[serde(default)]
    pub timeout_ms: u64,
}

// === DYNAMIC GRAPH STRUCTURES ===

/// A completing agent's request to splice new nodes into the live graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRequest {
    pub reason: String,
    pub new_nodes: Vec<AgentNodeConfig>,
    #[serde(default = "default_strategy")]
    pub strategy: DelegationStrategy,
}

fn default_strategy() -> DelegationStrategy {
    DelegationStrategy::Child
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DelegationStrategy {
    /// New nodes are inserted between the delegator and its original
    /// dependents, which are re-parented onto them.
    Child,
    /// New nodes run alongside the original dependents; existing edges stay.
    Sibling,
}

// === WIRE CONTRACTS ===

/// Request body for the inference service's `/invoke` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationPayload {
    pub run_id: String,
    pub agent_id: String,
    pub model: String,
    pub prompt: String,
    pub user_directive: String,
    // parent node id -> that parent's artifact JSON
    pub input_data: serde_json::Value,
    pub parent_signature: Option<String>,
    pub thinking_level: Option<i32>,
    pub file_paths: Vec<String>,
    pub tools: Vec<String>,
    pub allow_delegation: bool,
    // Topology rendering from this node's vantage point
    pub graph_view: String,
}

/// Response body from the inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceResponse {
    pub agent_id: String,
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub tokens_used: usize,
    #[serde(default)]
    pub input_tokens: usize,
    #[serde(default)]
    pub output_tokens: usize,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub latency_ms: f64,
    pub thought_signature: Option<String>,
    pub delegation: Option<DelegationRequest>,
}

// === RUNTIME STATE ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocation {
    pub id: String,
    pub agent_id: String,
    pub model_variant: ModelVariant,
    pub thought_signature: Option<String>,
    pub tools_used: Vec<String>,
    pub tokens_used: usize,
    pub latency_ms: u64,
    pub status: InvocationStatus,
    pub timestamp: String,
    pub artifact_id: Option<String>,
    pub error_message: Option<String>,
}

impl AgentInvocation {
    /// Zero-cost record for failures, pauses, and kernel-synthesized entries.
    pub fn annotation(agent_id: &str, status: InvocationStatus, message: &str) -> Self {
        AgentInvocation {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            model_variant: ModelVariant::Fast,
            thought_signature: None,
            tools_used: Vec::new(),
            tokens_used: 0,
            latency_ms: 0,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            artifact_id: None,
            error_message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Pending,
    Running,
    Success,
    Failed,
    // Human-in-the-loop: the node was released back to the ready set
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub run_id: String,
    pub workflow_id: String,
    pub status: RuntimeStatus,
    pub active_agents: Vec<String>,
    pub completed_agents: Vec<String>,
    pub failed_agents: Vec<String>,
    pub invocations: Vec<AgentInvocation>,
    pub total_tokens_used: usize,
    pub start_time: String,
    pub end_time: Option<String>,
}

impl RuntimeState {
    pub fn new(run_id: &str, workflow_id: &str) -> Self {
        RuntimeState {
            run_id: run_id.to_string(),
            workflow_id: workflow_id.to_string(),
            status: RuntimeStatus::Running,
            active_agents: Vec::new(),
            completed_agents: Vec::new(),
            failed_agents: Vec::new(),
            invocations: Vec::new(),
            total_tokens_used: 0,
            start_time: chrono::Utc::now().to_rfc3339(),
            end_time: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RuntimeStatus::Completed | RuntimeStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Idle,
    Running,
    Completed,
    Failed,
    AwaitingApproval,
}

/// Reasoning-continuity tokens, keyed by node id within one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThoughtSignatureStore {
    pub signatures: HashMap<String, String>,
}
