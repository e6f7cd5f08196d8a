// [[CASCADE]]/apps/kernel-server/src/observability.rs
// Purpose: Run metrics derived from the invocation log.
// Architecture: Observability Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};

use crate::models::{InvocationStatus, RuntimeState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub invocation_count: usize,
    pub total_tokens_used: usize,
    pub average_tokens_per_invocation: usize,
    pub p99_latency_ms: u64,
    pub total_errors: usize,
}

impl RunMetrics {
    pub fn from_state(state: &RuntimeState) -> Self {
        let count = state.invocations.len();
        let total_errors = state
            .invocations
            .iter()
            .filter(|inv| inv.status == InvocationStatus::Failed)
            .count();

        let mut latencies: Vec<u64> = state.invocations.iter().map(|inv| inv.latency_ms).collect();
        latencies.sort_unstable();
        let p99_latency_ms = if latencies.is_empty() {
            0
        } else {
            // nearest-rank p99
            let rank = ((latencies.len() as f64) * 0.99).ceil() as usize;
            latencies[rank.saturating_sub(1).min(latencies.len() - 1)]
        };

        RunMetrics {
            run_id: state.run_id.clone(),
            invocation_count: count,
            total_tokens_used: state.total_tokens_used,
            average_tokens_per_invocation: if count == 0 {
                0
            } else {
                state.total_tokens_used / count
            },
            p99_latency_ms,
            total_errors,
        }
    }
}
