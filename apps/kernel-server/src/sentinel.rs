// [[CASCADE]]/apps/kernel-server/src/sentinel.rs
// Purpose: Pattern engine. Consumes the event bus, matches ECA rules, dispatches actions.
// Architecture: Sentinel Layer
// Dependencies: tokio broadcast, Runtime, Patterns

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::events::{EventType, RuntimeEvent};
use crate::models::{DelegationRequest, DelegationStrategy};
use crate::patterns::PatternAction;
use crate::runtime::CascadeRuntime;

/// Subscribe to the bus and police every event against the registry. Lagging
/// is tolerated (events drop); the task ends when the bus closes.
pub fn spawn(runtime: Arc<CascadeRuntime>) -> JoinHandle<()> {
    let mut rx = runtime.event_bus.subscribe();
    tokio::spawn(async move {
        tracing::info!("Sentinel pattern engine online");
        loop {
            match rx.recv().await {
                Ok(event) => handle_event(&runtime, &event).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Sentinel lagged, {} event(s) dropped", missed);
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Event bus closed, sentinel exiting");
                    return;
                }
            }
        }
    })
}

async fn handle_event(runtime: &Arc<CascadeRuntime>, event: &RuntimeEvent) {
    // The sentinel's own interventions must not re-trigger patterns
    if event.event_type == EventType::SystemIntervention {
        return;
    }

    let rendered_payload = event.payload.to_string();
    let matched = runtime
        .patterns
        .patterns_for_trigger(event.event_type.as_str());

    for pattern in matched {
        if !pattern.condition_matches(&rendered_payload) {
            continue;
        }

        tracing::info!(
            "Pattern {} fired on {} for run {}",
            pattern.id,
            event.event_type.as_str(),
            event.run_id
        );

        match pattern.action {
            PatternAction::Interrupt { reason } => {
                runtime.emit_event(RuntimeEvent::new(
                    &event.run_id,
                    EventType::SystemIntervention,
                    event.agent_id.clone(),
                    serde_json::json!({
                        "action": "interrupt",
                        "pattern": pattern.id,
                        "reason": reason,
                    }),
                ));
                let culprit = event.agent_id.as_deref().unwrap_or("SENTINEL");
                runtime.fail_run(&event.run_id, culprit, &reason).await;
            }
            PatternAction::RequestApproval { reason } => {
                runtime
                    .request_approval(&event.run_id, event.agent_id.as_deref(), &reason)
                    .await;
            }
            PatternAction::SpawnAgent { config } => {
                let Some(anchor) = event.agent_id.as_deref() else {
                    tracing::warn!(
                        "Pattern {} wants to spawn an agent but the event has no agent id",
                        pattern.id
                    );
                    continue;
                };
                let request = DelegationRequest {
                    reason: format!("pattern {} remediation", pattern.id),
                    strategy: DelegationStrategy::Sibling,
                    new_nodes: vec![config],
                };
                if let Err(e) = runtime.apply_delegation(&event.run_id, anchor, request).await {
                    tracing::error!(
                        "Pattern {} failed to spawn remediation agent: {}",
                        pattern.id,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuntimeStatus;
    use crate::runtime::testutil::*;

    #[tokio::test]
    async fn tool_call_matching_a_guard_interrupts_the_run() {
        // built-in guards include ToolCall/fs_delete -> Interrupt
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();

        let mut rx = runtime.event_bus.subscribe();
        let _sentinel = spawn(Arc::clone(&runtime));

        runtime.emit_event(RuntimeEvent::new(
            &run_id,
            EventType::ToolCall,
            Some("a".to_string()),
            serde_json::json!({"tool": "fs_delete", "path": "/etc"}),
        ));

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Failed);
        assert_eq!(state.failed_agents, vec!["a"]);
        assert!(state
            .invocations
            .last()
            .unwrap()
            .error_message
            .as_deref()
            .unwrap()
            .contains("prohibited"));

        // the intervention was announced before the kill
        let mut saw_intervention = false;
        while let Ok(event) = rx.try_recv() {
            if event.event_type == EventType::SystemIntervention {
                assert_eq!(event.payload["action"], "interrupt");
                saw_intervention = true;
            }
        }
        assert!(saw_intervention);
    }

    #[tokio::test]
    async fn benign_tool_calls_pass_through() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();
        let _sentinel = spawn(Arc::clone(&runtime));

        runtime.emit_event(RuntimeEvent::new(
            &run_id,
            EventType::ToolCall,
            Some("a".to_string()),
            serde_json::json!({"tool": "read_file", "path": "input/data.csv"}),
        ));

        // give the sentinel a chance to (not) act
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let state = runtime.get_state(&run_id).unwrap();
        assert_eq!(state.status, RuntimeStatus::Running);
    }

    #[tokio::test]
    async fn failure_event_pauses_via_the_escalation_guard() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();
        let _sentinel = spawn(Arc::clone(&runtime));

        runtime.emit_event(RuntimeEvent::new(
            &run_id,
            EventType::AgentFailed,
            Some("a".to_string()),
            serde_json::json!({"agent_id": "a", "error": "boom"}),
        ));

        let state = wait_until(&runtime, &run_id, |s| {
            s.status == RuntimeStatus::AwaitingApproval
        })
        .await;
        assert_eq!(state.status, RuntimeStatus::AwaitingApproval);
    }

    #[tokio::test]
    async fn spawn_agent_pattern_splices_a_sibling() {
        let patterns = serde_json::json!([{
            "id": "fixer",
            "name": "Spawn fixer",
            "trigger_event": "ToolCall",
            "condition": "lint_error",
            "action": {
                "type": "spawn_agent",
                "config": {
                    "id": "fixer-agent",
                    "role": "worker",
                    "prompt": "fix the lint errors",
                    "position": null
                }
            }
        }]);
        let (_guard, runtime) =
            test_runtime_with_patterns(1, &serde_json::to_string(&patterns).unwrap());
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();
        let _sentinel = spawn(Arc::clone(&runtime));

        runtime.emit_event(RuntimeEvent::new(
            &run_id,
            EventType::ToolCall,
            Some("a".to_string()),
            serde_json::json!({"tool": "linter", "result": "lint_error"}),
        ));

        for _ in 0..100 {
            if runtime.get_topology_snapshot(&run_id).unwrap()["nodes"]
                .as_array()
                .unwrap()
                .len()
                == 2
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let workflow = runtime.workflows.get(&run_id).unwrap();
        let fixer = workflow.agents.iter().find(|a| a.id == "fixer-agent");
        assert!(fixer.is_some(), "remediation agent was never spliced in");
        assert_eq!(fixer.unwrap().depends_on, vec!["a"]);
    }
}
