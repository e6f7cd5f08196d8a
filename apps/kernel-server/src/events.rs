// [[CASCADE]]/apps/kernel-server/src/events.rs
// Purpose: Typed runtime events plus the process-wide broadcast bus.
// Architecture: Domain Event Layer
// Dependencies: Serde, Chrono, Uuid, tokio broadcast

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Bounded bus buffer. Slow subscribers lag and drop events; producers never
/// block on a consumer.
pub const EVENT_BUS_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    /// A node was added to the graph, statically or through delegation
    NodeCreated,
    AgentStarted,
    AgentCompleted,
    AgentFailed,
    /// An agent invoked a tool (reported by the agent service)
    ToolCall,
    /// Kernel- or human-originated intervention (pause, resume, interrupt)
    SystemIntervention,
    /// Intermediate agent activity forwarded to live observers
    IntermediateLog,
}

impl EventType {
    /// Stable name used for pattern trigger matching and stream frames.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NodeCreated => "NodeCreated",
            EventType::AgentStarted => "AgentStarted",
            EventType::AgentCompleted => "AgentCompleted",
            EventType::AgentFailed => "AgentFailed",
            EventType::ToolCall => "ToolCall",
            EventType::SystemIntervention => "SystemIntervention",
            EventType::IntermediateLog => "IntermediateLog",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub id: String,
    pub run_id: String,
    pub event_type: EventType,
    pub agent_id: Option<String>,
    pub timestamp: String,
    pub payload: Value,
}

impl RuntimeEvent {
    pub fn new(
        run_id: &str,
        event_type: EventType,
        agent_id: Option<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            event_type,
            agent_id,
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }
}

/// Create the process-wide bus. The receiver half is dropped; every consumer
/// subscribes through the sender.
pub fn event_bus() -> broadcast::Sender<RuntimeEvent> {
    let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
    tx
}
