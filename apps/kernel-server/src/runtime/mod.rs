// [[CASCADE]]/apps/kernel-server/src/runtime/mod.rs
// Purpose: Runtime facade. Owns every per-run map; all component access funnels through here.
// Architecture: Domain Logic Layer
// Dependencies: dashmap, tokio, reqwest, serde_json

pub mod payload;
pub mod scheduler;
pub mod surgery;

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dag::{Dag, DagError};
use crate::events::{event_bus, EventType, RuntimeEvent};
use crate::models::*;
use crate::patterns::PatternRegistry;
use crate::persistence::{self, Persistence};
use crate::settings::Settings;
use crate::workspace::Workspace;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("agent {0} not found in run {1}")]
    AgentNotFound(String, String),
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
    #[error("workspace initialization failed: {0}")]
    Workspace(#[from] std::io::Error),
    #[error("delegation rejected: {0}")]
    Delegation(String),
    #[error("run {0} is not awaiting approval")]
    NotPaused(String),
    #[error(transparent)]
    Graph(#[from] DagError),
}

/// Process-wide orchestration state. Constructed once at boot; every per-run
/// map is keyed by run_id so runs never contend with each other. During
/// execution the run's scheduler task is the sole writer of its state;
/// observers read cloned snapshots.
pub struct CascadeRuntime {
    pub(crate) settings: Settings,
    pub(crate) workflows: DashMap<String, WorkflowConfig>,
    pub(crate) runtime_states: DashMap<String, RuntimeState>,
    pub(crate) thought_signatures: DashMap<String, ThoughtSignatureStore>,
    pub(crate) dag_store: DashMap<String, Dag>,
    pub(crate) http_client: reqwest::Client,
    pub(crate) persistence: Persistence,
    pub(crate) workspace: Workspace,
    pub event_bus: broadcast::Sender<RuntimeEvent>,
    pub patterns: Arc<PatternRegistry>,
}

impl CascadeRuntime {
    pub fn new(settings: Settings) -> Self {
        let persistence = Persistence::connect(settings.redis_url.as_deref());
        let workspace = Workspace::new(settings.storage_root.clone());
        let patterns = Arc::new(PatternRegistry::load(&settings));

        CascadeRuntime {
            settings,
            workflows: DashMap::new(),
            runtime_states: DashMap::new(),
            thought_signatures: DashMap::new(),
            dag_store: DashMap::new(),
            http_client: reqwest::Client::new(),
            persistence,
            workspace,
            event_bus: event_bus(),
            patterns,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    // === EVENTS & PERSISTENCE ===

    /// Broadcast to all subscribers (sentinel, stream handlers, observers).
    /// A send error only means nobody is listening right now.
    pub fn emit_event(&self, event: RuntimeEvent) {
        let _ = self.event_bus.send(event);
    }

    /// Snapshot the run's state and write it through. Cloned out of the map
    /// first so no lock is held across store I/O.
    pub async fn persist_run(&self, run_id: &str) {
        let snapshot = self.runtime_states.get(run_id).map(|s| s.clone());
        if let Some(state) = snapshot {
            self.persistence.save_state(&state).await;
        }
    }

    /// Reload previously-active runs from the store. Anything that was still
    /// running when the process died is terminated with a synthetic kernel
    /// invocation; its DAG only ever lived in memory.
    pub async fn rehydrate_on_boot(&self) {
        if !self.persistence.is_enabled() {
            return;
        }

        let active_ids = self.persistence.load_active_run_ids().await;
        tracing::info!("Found {} active run(s) in persistence layer", active_ids.len());

        for run_id in active_ids {
            let Some(mut state) = self.persistence.load_state(&run_id).await else {
                tracing::warn!("Active run {} has no state record, skipping", run_id);
                continue;
            };

            tracing::warn!("Rehydrating run {} (status: {:?})", run_id, state.status);
            if persistence::apply_crash_recovery(&mut state) {
                self.persistence.save_state(&state).await;
            }
            self.runtime_states.insert(run_id, state);
        }
    }

    // === LIFECYCLE OPERATIONS ===

    /// Validate and register a run without spawning its scheduler. Split out
    /// so tests can install runs and drive them deterministically.
    pub fn register_run(&self, config: WorkflowConfig) -> Result<String, RuntimeError> {
        let mut dag = Dag::new();
        let mut seen = HashSet::new();

        for agent in &config.agents {
            if !seen.insert(agent.id.clone()) {
                return Err(RuntimeError::InvalidWorkflow(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }
            dag.add_node(agent.id.clone());
        }

        for agent in &config.agents {
            for dep in &agent.depends_on {
                dag.add_edge(dep, &agent.id)
                    .map_err(|e| RuntimeError::InvalidWorkflow(e.to_string()))?;
            }
        }

        // Catches any cycle the incremental checks let through
        dag.topological_sort()
            .map_err(|e| RuntimeError::InvalidWorkflow(e.to_string()))?;

        let run_id = Uuid::new_v4().to_string();
        self.workspace
            .init_run_session(&run_id, &config.attached_files)?;

        let state = RuntimeState::new(&run_id, &config.id);
        self.workflows.insert(run_id.clone(), config);
        self.dag_store.insert(run_id.clone(), dag);
        self.runtime_states.insert(run_id.clone(), state);
        self.thought_signatures
            .insert(run_id.clone(), ThoughtSignatureStore::default());

        Ok(run_id)
    }

    /// Validate, register, and launch a new run. Returns the run_id
    /// immediately; execution happens on a spawned task.
    pub fn start_workflow(self: &Arc<Self>, config: WorkflowConfig) -> Result<String, RuntimeError> {
        let run_id = self.register_run(config)?;
        self.spawn_scheduler(run_id.clone());
        tracing::info!("Workflow accepted, run {} launched", run_id);
        Ok(run_id)
    }

    /// Pause the run for a human decision. Idempotent: only a running run
    /// transitions; repeated calls leave the state unchanged.
    pub async fn request_approval(&self, run_id: &str, agent_id: Option<&str>, reason: &str) {
        let paused = {
            match self.runtime_states.get_mut(run_id) {
                Some(mut state) if state.status == RuntimeStatus::Running => {
                    state.status = RuntimeStatus::AwaitingApproval;
                    true
                }
                _ => false,
            }
        };

        if !paused {
            return;
        }

        self.emit_event(RuntimeEvent::new(
            run_id,
            EventType::SystemIntervention,
            agent_id.map(|s| s.to_string()),
            serde_json::json!({"action": "pause", "reason": reason}),
        ));
        self.persist_run(run_id).await;
        tracing::info!("Run {} paused for approval: {}", run_id, reason);
    }

    /// Flip a paused run back to running and respawn its scheduler loop.
    pub fn resume_run(self: &Arc<Self>, run_id: &str) -> Result<(), RuntimeError> {
        // Without the in-memory DAG (e.g. after a restart) there is nothing
        // left to schedule
        if !self.dag_store.contains_key(run_id) {
            return Err(RuntimeError::RunNotFound(run_id.to_string()));
        }

        {
            let mut state = self
                .runtime_states
                .get_mut(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;
            if state.status != RuntimeStatus::AwaitingApproval {
                return Err(RuntimeError::NotPaused(run_id.to_string()));
            }
            state.status = RuntimeStatus::Running;
        }

        self.spawn_scheduler(run_id.to_string());
        self.emit_event(RuntimeEvent::new(
            run_id,
            EventType::SystemIntervention,
            None,
            serde_json::json!({"action": "resume", "reason": "Operator approved execution"}),
        ));
        tracing::info!("Run {} resumed", run_id);
        Ok(())
    }

    /// Operator-initiated kill.
    pub async fn stop_run(&self, run_id: &str) {
        self.fail_run(run_id, "OPERATOR", "Manual Stop").await;
    }

    /// Terminal failure. Already-terminal runs are left untouched so a late
    /// stop or interrupt cannot rewrite history.
    pub async fn fail_run(&self, run_id: &str, agent_id: &str, error: &str) {
        let failed = {
            match self.runtime_states.get_mut(run_id) {
                Some(mut state) if !state.is_terminal() => {
                    state.status = RuntimeStatus::Failed;
                    state.end_time = Some(chrono::Utc::now().to_rfc3339());
                    state.active_agents.retain(|a| a != agent_id);
                    if !state.failed_agents.iter().any(|a| a == agent_id) {
                        state.failed_agents.push(agent_id.to_string());
                    }
                    state.invocations.push(AgentInvocation::annotation(
                        agent_id,
                        InvocationStatus::Failed,
                        error,
                    ));
                    true
                }
                _ => false,
            }
        };

        if !failed {
            return;
        }

        self.persist_run(run_id).await;
        self.cleanup_remote_session(run_id).await;
        tracing::error!("Run {} failed at agent {}: {}", run_id, agent_id, error);
    }

    // === STATE ACCOUNTING ===

    /// Append an invocation record and apply its status to the agent sets.
    pub async fn record_invocation(
        &self,
        run_id: &str,
        invocation: AgentInvocation,
    ) -> Result<(), RuntimeError> {
        {
            let mut state = self
                .runtime_states
                .get_mut(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;

            state.total_tokens_used += invocation.tokens_used;

            match invocation.status {
                InvocationStatus::Running => {
                    if !state.active_agents.contains(&invocation.agent_id) {
                        state.active_agents.push(invocation.agent_id.clone());
                    }
                }
                InvocationStatus::Success => {
                    state.active_agents.retain(|a| a != &invocation.agent_id);
                    if !state.completed_agents.contains(&invocation.agent_id) {
                        state.completed_agents.push(invocation.agent_id.clone());
                    }
                }
                InvocationStatus::Failed => {
                    state.active_agents.retain(|a| a != &invocation.agent_id);
                    if !state.failed_agents.contains(&invocation.agent_id) {
                        state.failed_agents.push(invocation.agent_id.clone());
                    }
                }
                InvocationStatus::Pending | InvocationStatus::Paused => {}
            }

            state.invocations.push(invocation);
        }

        self.persist_run(run_id).await;
        Ok(())
    }

    pub fn set_thought_signature(
        &self,
        run_id: &str,
        agent_id: &str,
        signature: String,
    ) -> Result<(), RuntimeError> {
        let mut store = self
            .thought_signatures
            .get_mut(run_id)
            .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;
        store.signatures.insert(agent_id.to_string(), signature);
        Ok(())
    }

    pub fn get_thought_signature(&self, run_id: &str, agent_id: &str) -> Option<String> {
        self.thought_signatures
            .get(run_id)
            .and_then(|store| store.signatures.get(agent_id).cloned())
    }

    // === SNAPSHOTS ===

    pub fn get_state(&self, run_id: &str) -> Option<RuntimeState> {
        self.runtime_states.get(run_id).map(|s| s.clone())
    }

    pub fn get_all_signatures(&self, run_id: &str) -> Option<ThoughtSignatureStore> {
        self.thought_signatures.get(run_id).map(|s| s.clone())
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.runtime_states.contains_key(run_id)
    }

    /// Current topology in the shape the console renders.
    pub fn get_topology_snapshot(&self, run_id: &str) -> Option<serde_json::Value> {
        let dag = self.dag_store.get(run_id)?;
        Some(serde_json::json!({
            "nodes": dag.export_nodes(),
            "edges": dag
                .export_edges()
                .into_iter()
                .map(|(from, to)| serde_json::json!({"from": from, "to": to}))
                .collect::<Vec<_>>(),
        }))
    }

    /// Clone of one node's config, or None if the run or node is unknown.
    pub(crate) fn agent_config(&self, run_id: &str, agent_id: &str) -> Option<AgentNodeConfig> {
        self.workflows
            .get(run_id)
            .and_then(|w| w.agents.iter().find(|a| a.id == agent_id).cloned())
    }
}
