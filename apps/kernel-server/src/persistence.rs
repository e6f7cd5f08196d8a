// [[CASCADE]]/apps/kernel-server/src/persistence.rs
// Purpose: Redis adapter for run state, the active-run index, and agent artifacts.
// Architecture: Infrastructure Layer
// Dependencies: redis, serde_json

use redis::AsyncCommands;

use crate::models::{AgentInvocation, InvocationStatus, RuntimeState, RuntimeStatus};

const ACTIVE_RUNS_KEY: &str = "sys:active_runs";
// Terminal run states linger for a day; kernel-stored artifacts for an hour
const TERMINAL_STATE_TTL_SECS: i64 = 86_400;
const ARTIFACT_TTL_SECS: u64 = 3_600;

pub fn state_key(run_id: &str) -> String {
    format!("run:{}:state", run_id)
}

pub fn artifact_key(run_id: &str, agent_id: &str) -> String {
    format!("run:{}:agent:{}:output", run_id, agent_id)
}

/// Best-effort persistence. Every operation logs and returns on failure; the
/// kernel runs fully in-memory when no store is configured or reachable.
pub struct Persistence {
    client: Option<redis::Client>,
}

impl Persistence {
    pub fn connect(redis_url: Option<&str>) -> Self {
        let client = match redis_url {
            Some(url) => match redis::Client::open(url) {
                Ok(client) => {
                    tracing::info!("Persistence store configured: {}", url);
                    Some(client)
                }
                Err(e) => {
                    tracing::warn!("Invalid REDIS_URL ({}). Persistence disabled.", e);
                    None
                }
            },
            None => {
                tracing::warn!("REDIS_URL not set. Running without persistence.");
                None
            }
        };
        Persistence { client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Write the state snapshot and keep the active index truthful: terminal
    /// runs leave the set and their key gets an expiry.
    pub async fn save_state(&self, state: &RuntimeState) {
        let Some(client) = &self.client else { return };

        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize state for {}: {}", state.run_id, e);
                return;
            }
        };

        let key = state_key(&state.run_id);
        match client.get_async_connection().await {
            Ok(mut con) => {
                let _: redis::RedisResult<()> = con.set(&key, json).await;

                if state.is_terminal() {
                    let _: redis::RedisResult<()> =
                        con.srem(ACTIVE_RUNS_KEY, &state.run_id).await;
                    let _: redis::RedisResult<()> =
                        con.expire(&key, TERMINAL_STATE_TTL_SECS as i64).await;
                } else {
                    let _: redis::RedisResult<()> =
                        con.sadd(ACTIVE_RUNS_KEY, &state.run_id).await;
                }
            }
            Err(e) => tracing::error!("Store connection failed during persist: {}", e),
        }
    }

    pub async fn load_active_run_ids(&self) -> Vec<String> {
        let Some(client) = &self.client else {
            return Vec::new();
        };
        match client.get_async_connection().await {
            Ok(mut con) => con.smembers(ACTIVE_RUNS_KEY).await.unwrap_or_default(),
            Err(e) => {
                tracing::error!("Store connection failed reading active runs: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn load_state(&self, run_id: &str) -> Option<RuntimeState> {
        let Some(client) = &self.client else {
            return None;
        };
        let mut con = client.get_async_connection().await.ok()?;
        let json: Option<String> = con.get(state_key(run_id)).await.unwrap_or(None);
        let json = json?;

        match serde_json::from_str::<RuntimeState>(&json) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::error!("Failed to deserialize state for {}: {}", run_id, e);
                None
            }
        }
    }

    /// Store a node's output under its artifact key. Returns the key when the
    /// write landed.
    pub async fn store_artifact(
        &self,
        run_id: &str,
        agent_id: &str,
        output: &serde_json::Value,
    ) -> Option<String> {
        let Some(client) = &self.client else {
            tracing::debug!("No store configured, artifact for {} not persisted", agent_id);
            return None;
        };

        let key = artifact_key(run_id, agent_id);
        let json = match serde_json::to_string(output) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize artifact for {}: {}", agent_id, e);
                return None;
            }
        };

        match client.get_async_connection().await {
            Ok(mut con) => match con
                .set_ex::<_, _, ()>(&key, json, ARTIFACT_TTL_SECS as u64)
                .await
            {
                Ok(_) => {
                    tracing::debug!("Stored artifact: {}", key);
                    Some(key)
                }
                Err(e) => {
                    tracing::error!("Failed to write artifact {}: {}", key, e);
                    None
                }
            },
            Err(e) => {
                tracing::error!("Store connection failed storing artifact: {}", e);
                None
            }
        }
    }

    pub async fn fetch_artifact(&self, run_id: &str, agent_id: &str) -> Option<serde_json::Value> {
        let client = self.client.as_ref()?;
        let mut con = client.get_async_connection().await.ok()?;
        let json: Option<String> = con.get(artifact_key(run_id, agent_id)).await.unwrap_or(None);
        serde_json::from_str(&json?).ok()
    }
}

/// Crash-recovery transform applied to every rehydrated state: a run that was
/// mid-flight when the process died cannot be resumed (its DAG lived only in
/// memory), so it is terminated with a synthetic kernel invocation. Returns
/// true when the state was modified.
pub fn apply_crash_recovery(state: &mut RuntimeState) -> bool {
    if state.status != RuntimeStatus::Running {
        return false;
    }

    state.status = RuntimeStatus::Failed;
    state.end_time = Some(chrono::Utc::now().to_rfc3339());
    state.active_agents.clear();
    state.invocations.push(AgentInvocation::annotation(
        "KERNEL",
        InvocationStatus::Failed,
        "Kernel restarted unexpectedly. Workflow terminated.",
    ));
    true
}
