// [[CASCADE]]/apps/kernel-server/src/runtime/scheduler.rs
// Purpose: Per-run execution loop. Ready-node selection over the mutable DAG, dispatch,
//          result handling, delegation, failure escalation.
// Architecture: Domain Logic Layer
// Dependencies: tokio, reqwest, serde_json

use std::sync::Arc;
use std::time::Duration;

use super::CascadeRuntime;
use crate::events::{EventType, RuntimeEvent};
use crate::models::*;
use crate::patterns::PatternAction;
use crate::persistence;

const IDLE_POLL: Duration = Duration::from_millis(100);

impl CascadeRuntime {
    /// Fire-and-forget launch of the run loop. Also used by resume.
    pub(crate) fn spawn_scheduler(self: &Arc<Self>, run_id: String) {
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            runtime.persist_run(&run_id).await;
            runtime.drive_run(&run_id).await;
        });
    }

    /// The run loop. One ready node per iteration, re-deriving topology every
    /// time so mid-flight graph surgery is picked up naturally. Exits on
    /// terminal status; suspends (exits, to be respawned) on approval pauses.
    /// Recomputing the sort each pass is cheap at workflow scale and keeps
    /// the loop consistent with a mutating graph.
    pub(crate) async fn drive_run(&self, run_id: &str) {
        tracing::info!("Scheduler loop started for run {}", run_id);

        loop {
            // 1. Termination / suspension check
            match self.runtime_states.get(run_id).map(|s| s.status) {
                None => {
                    tracing::warn!("Run {} vanished, scheduler exiting", run_id);
                    return;
                }
                Some(RuntimeStatus::AwaitingApproval) => {
                    tracing::info!("Run {} suspended awaiting approval", run_id);
                    return;
                }
                Some(RuntimeStatus::Completed) | Some(RuntimeStatus::Failed) => return,
                Some(RuntimeStatus::Running) | Some(RuntimeStatus::Idle) => {}
            }

            // 2. Ready-node selection: first topo-order node not yet settled
            let next_agent = {
                let Some(dag) = self.dag_store.get(run_id) else {
                    tracing::error!("DAG missing for run {}, scheduler exiting", run_id);
                    return;
                };
                let order = match dag.topological_sort() {
                    Ok(order) => order,
                    Err(e) => {
                        drop(dag);
                        self.fail_run(run_id, "SYSTEM", &format!("graph corrupted: {}", e))
                            .await;
                        continue;
                    }
                };
                let Some(state) = self.runtime_states.get(run_id) else {
                    return;
                };
                order.into_iter().find(|id| {
                    !state.completed_agents.contains(id)
                        && !state.failed_agents.contains(id)
                        && !state.active_agents.contains(id)
                })
            };

            let agent_id = match next_agent {
                Some(id) => id,
                None => {
                    let active = self
                        .runtime_states
                        .get(run_id)
                        .map(|s| s.active_agents.len())
                        .unwrap_or(0);
                    if active > 0 {
                        tokio::time::sleep(IDLE_POLL).await;
                        continue;
                    }

                    // Nothing ready, nothing running: the run is done
                    if let Some(mut state) = self.runtime_states.get_mut(run_id) {
                        if !state.is_terminal() {
                            state.status = RuntimeStatus::Completed;
                            state.end_time = Some(chrono::Utc::now().to_rfc3339());
                        }
                    }
                    self.persist_run(run_id).await;
                    self.cleanup_remote_session(run_id).await;
                    tracing::info!("Run {} completed", run_id);
                    return;
                }
            };

            // 3. Dependency verification: topo order is necessary, not
            // sufficient — parents must actually be settled as completed
            let deps_ready = {
                let deps = self
                    .dag_store
                    .get(run_id)
                    .map(|dag| dag.get_dependencies(&agent_id))
                    .unwrap_or_default();
                self.runtime_states
                    .get(run_id)
                    .map(|state| deps.iter().all(|d| state.completed_agents.contains(d)))
                    .unwrap_or(false)
            };
            if !deps_ready {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            // 4. Dispatch
            tracing::info!("Dispatching agent {} in run {}", agent_id, run_id);
            self.mark_agent_active(run_id, &agent_id).await;
            self.emit_event(RuntimeEvent::new(
                run_id,
                EventType::AgentStarted,
                Some(agent_id.clone()),
                serde_json::json!({"agent_id": agent_id}),
            ));

            let payload = match self.prepare_invocation_payload(run_id, &agent_id).await {
                Ok(payload) => payload,
                Err(e) => {
                    self.handle_agent_failure(run_id, &agent_id, &e.to_string()).await;
                    continue;
                }
            };

            // 5. Result handling
            match self.invoke_agent_service(&payload).await {
                Ok(response) if response.success => {
                    self.handle_agent_success(run_id, &agent_id, &payload, response)
                        .await;
                }
                Ok(response) => {
                    let error = response
                        .error
                        .unwrap_or_else(|| "agent reported failure without detail".to_string());
                    self.handle_agent_failure(run_id, &agent_id, &error).await;
                }
                Err(e) => {
                    self.handle_agent_failure(run_id, &agent_id, &e.to_string()).await;
                }
            }
        }
    }

    async fn mark_agent_active(&self, run_id: &str, agent_id: &str) {
        let changed = {
            match self.runtime_states.get_mut(run_id) {
                Some(mut state) if !state.active_agents.contains(&agent_id.to_string()) => {
                    state.active_agents.push(agent_id.to_string());
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.persist_run(run_id).await;
        }
    }

    /// Successful response: apply delegation if permitted, store the
    /// signature and artifact, account the invocation, announce completion.
    async fn handle_agent_success(
        &self,
        run_id: &str,
        agent_id: &str,
        payload: &InvocationPayload,
        response: AgentServiceResponse,
    ) {
        if let Some(delegation) = response.delegation {
            let permitted = self
                .agent_config(run_id, agent_id)
                .map(|c| c.allow_delegation)
                .unwrap_or(false);

            if permitted {
                tracing::info!(
                    "Agent {} requested delegation: {}",
                    agent_id,
                    delegation.reason
                );
                if let Err(e) = self.apply_delegation(run_id, agent_id, delegation).await {
                    self.fail_run(run_id, agent_id, &format!("delegation error: {}", e))
                        .await;
                    return;
                }
            } else {
                tracing::warn!(
                    "Agent {} returned a delegation but is not permitted to delegate; ignoring",
                    agent_id
                );
            }
        }

        if let Some(signature) = response.thought_signature {
            let _ = self.set_thought_signature(run_id, agent_id, signature);
        }

        let mut artifact_id = None;
        if let Some(output) = &response.output {
            let agent_stored = output
                .get("artifact_stored")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            artifact_id = if agent_stored {
                Some(persistence::artifact_key(run_id, agent_id))
            } else {
                self.persistence.store_artifact(run_id, agent_id, output).await
            };

            let files_generated: Vec<String> = output
                .get("files_generated")
                .and_then(|v| v.as_array())
                .map(|files| {
                    files
                        .iter()
                        .filter_map(|f| f.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            if !files_generated.is_empty() {
                self.spawn_artifact_promotion(run_id, agent_id, files_generated);
            }
        }

        let invocation = AgentInvocation {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            model_variant: self
                .agent_config(run_id, agent_id)
                .map(|c| c.model)
                .unwrap_or_default(),
            thought_signature: None,
            tools_used: payload.tools.clone(),
            tokens_used: response.tokens_used,
            latency_ms: response.latency_ms as u64,
            status: InvocationStatus::Success,
            timestamp: chrono::Utc::now().to_rfc3339(),
            artifact_id,
            error_message: None,
        };
        if let Err(e) = self.record_invocation(run_id, invocation).await {
            tracing::error!("Failed to record invocation for {}: {}", agent_id, e);
        }

        self.emit_event(RuntimeEvent::new(
            run_id,
            EventType::AgentCompleted,
            Some(agent_id.to_string()),
            serde_json::json!({"agent_id": agent_id, "tokens_used": response.tokens_used}),
        ));
    }

    /// Failure path. A matching RequestApproval pattern converts the failure
    /// into a pause: the node is released back to the ready set (it was never
    /// completed) so resuming the run retries it. Everything else is fatal.
    async fn handle_agent_failure(&self, run_id: &str, agent_id: &str, error: &str) {
        let event_payload = serde_json::json!({"agent_id": agent_id, "error": error});
        self.emit_event(RuntimeEvent::new(
            run_id,
            EventType::AgentFailed,
            Some(agent_id.to_string()),
            event_payload.clone(),
        ));

        let rendered = event_payload.to_string();
        let pause_reason = self
            .patterns
            .patterns_for_trigger(EventType::AgentFailed.as_str())
            .into_iter()
            .filter(|p| p.condition_matches(&rendered))
            .find_map(|p| match p.action {
                PatternAction::RequestApproval { reason } => Some(reason),
                _ => None,
            });

        match pause_reason {
            Some(reason) => {
                if let Some(mut state) = self.runtime_states.get_mut(run_id) {
                    state.active_agents.retain(|a| a != agent_id);
                    state.invocations.push(AgentInvocation::annotation(
                        agent_id,
                        InvocationStatus::Paused,
                        error,
                    ));
                }
                self.request_approval(run_id, Some(agent_id), &reason).await;
            }
            None => {
                self.fail_run(run_id, agent_id, error).await;
            }
        }
    }

    /// POST the payload to the inference service. Non-2xx statuses are
    /// errors; so are bodies that fail to deserialize.
    pub(crate) async fn invoke_agent_service(
        &self,
        payload: &InvocationPayload,
    ) -> Result<AgentServiceResponse, reqwest::Error> {
        let url = self.settings.agent_invoke_url();
        tracing::debug!("Sending invocation for {} to {}", payload.agent_id, url);

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        response.json::<AgentServiceResponse>().await
    }

    /// Best-effort notification that a run is over; the agent service drops
    /// its per-run resources.
    pub(crate) async fn cleanup_remote_session(&self, run_id: &str) {
        let url = self.settings.agent_cleanup_url(run_id);
        match self.http_client.post(&url).send().await {
            Ok(_) => tracing::debug!("Remote session cleanup requested for {}", run_id),
            Err(e) => tracing::debug!("Remote cleanup for {} skipped: {}", run_id, e),
        }
    }

    /// Fire-and-forget promotion of generated files into the artifact tier.
    fn spawn_artifact_promotion(&self, run_id: &str, agent_id: &str, files: Vec<String>) {
        let workspace = self.workspace.clone();
        let workflow_id = self
            .workflows
            .get(run_id)
            .map(|w| w.id.clone())
            .unwrap_or_default();
        let user_directive = self
            .agent_config(run_id, agent_id)
            .map(|c| c.user_directive)
            .unwrap_or_default();
        let run_id = run_id.to_string();
        let agent_id = agent_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = workspace
                .promote_artifacts(&run_id, &workflow_id, &user_directive, &agent_id, &files)
                .await
            {
                tracing::warn!("Artifact promotion for run {} failed: {}", run_id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::super::RuntimeError;
    use super::*;
    use crate::models::{AgentNodeConfig, DelegationRequest, DelegationStrategy};
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Responder = Arc<dyn Fn(&InvocationPayload) -> AgentServiceResponse + Send + Sync>;

    async fn mock_invoke(
        State(responder): State<Responder>,
        Json(payload): Json<InvocationPayload>,
    ) -> Json<AgentServiceResponse> {
        Json(responder(&payload))
    }

    async fn mock_cleanup() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }

    /// Stand-in inference service on an ephemeral local port.
    async fn mock_agent_service(responder: Responder) -> u16 {
        let app = Router::new()
            .route("/invoke", post(mock_invoke))
            .route("/session/:run_id/cleanup", post(mock_cleanup))
            .with_state(responder);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    fn ok_response(agent_id: &str, tokens: usize) -> AgentServiceResponse {
        AgentServiceResponse {
            agent_id: agent_id.to_string(),
            success: true,
            output: Some(serde_json::json!({"result": format!("{} done", agent_id)})),
            error: None,
            tokens_used: tokens,
            input_tokens: tokens / 2,
            output_tokens: tokens / 2,
            cache_hit: false,
            latency_ms: 5.0,
            thought_signature: Some(format!("sig-{}", agent_id)),
            delegation: None,
        }
    }

    fn failed_response(agent_id: &str, error: &str) -> AgentServiceResponse {
        AgentServiceResponse {
            success: false,
            output: None,
            error: Some(error.to_string()),
            thought_signature: None,
            ..ok_response(agent_id, 0)
        }
    }

    #[tokio::test]
    async fn linear_chain_completes_in_dependency_order() {
        let port = mock_agent_service(Arc::new(|p| ok_response(&p.agent_id, 10))).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow(
                "chain",
                vec![worker("a", &[]), worker("b", &["a"]), worker("c", &["b"])],
            ))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert_eq!(state.completed_agents, vec!["a", "b", "c"]);
        assert!(state.failed_agents.is_empty());
        assert!(state.active_agents.is_empty());
        assert_eq!(state.total_tokens_used, 30);
        assert!(state.end_time.is_some());

        let order: Vec<&str> = state.invocations.iter().map(|i| i.agent_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        // signatures flowed back from the service
        assert_eq!(
            runtime.get_thought_signature(&run_id, "a").as_deref(),
            Some("sig-a")
        );
    }

    #[tokio::test]
    async fn diamond_join_waits_for_both_branches() {
        let port = mock_agent_service(Arc::new(|p| ok_response(&p.agent_id, 1))).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow(
                "diamond",
                vec![
                    worker("a", &[]),
                    worker("b", &["a"]),
                    worker("c", &["a"]),
                    worker("d", &["b", "c"]),
                ],
            ))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert_eq!(state.completed_agents.len(), 4);

        let order: Vec<&str> = state.invocations.iter().map(|i| i.agent_id.as_str()).collect();
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
    }

    #[tokio::test]
    async fn empty_workflow_completes_immediately() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime.start_workflow(workflow("empty", vec![])).unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert!(state.completed_agents.is_empty());
        assert!(state.invocations.is_empty());
    }

    #[tokio::test]
    async fn single_node_workflow_completes_after_one_dispatch() {
        let port = mock_agent_service(Arc::new(|p| ok_response(&p.agent_id, 7))).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow("solo", vec![worker("only", &[])]))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert_eq!(state.completed_agents, vec!["only"]);
        assert_eq!(state.invocations.len(), 1);
        assert_eq!(state.total_tokens_used, 7);
    }

    #[tokio::test]
    async fn child_delegation_reroutes_execution_through_the_new_node() {
        let responder: Responder = Arc::new(|p: &InvocationPayload| {
            if p.agent_id == "p" {
                let mut response = ok_response("p", 5);
                response.delegation = Some(DelegationRequest {
                    reason: "needs a specialist".to_string(),
                    strategy: DelegationStrategy::Child,
                    new_nodes: vec![AgentNodeConfig {
                        id: "x".to_string(),
                        role: crate::models::AgentRole::Worker,
                        model: crate::models::ModelVariant::Fast,
                        prompt: "specialist work".to_string(),
                        tools: Vec::new(),
                        depends_on: Vec::new(),
                        allow_delegation: false,
                        accepts_directive: false,
                        user_directive: String::new(),
                        position: None,
                    }],
                });
                response
            } else {
                ok_response(&p.agent_id, 5)
            }
        });
        let port = mock_agent_service(responder).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow(
                "deleg",
                vec![orchestrator("p", &[]), worker("q", &["p"])],
            ))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);

        let order: Vec<&str> = state.invocations.iter().map(|i| i.agent_id.as_str()).collect();
        assert_eq!(order, vec!["p", "x", "q"]);

        // post-surgery topology: p -> x -> q, no p -> q
        let dag = runtime.dag_store.get(&run_id).unwrap();
        assert_eq!(dag.get_children("p"), vec!["x"]);
        assert_eq!(dag.get_children("x"), vec!["q"]);
        assert_eq!(dag.get_dependencies("q"), vec!["x"]);
        drop(dag);

        let wf = runtime.workflows.get(&run_id).unwrap();
        let q = wf.agents.iter().find(|a| a.id == "q").unwrap();
        assert_eq!(q.depends_on, vec!["x"]);
    }

    #[tokio::test]
    async fn delegation_without_permission_is_ignored() {
        let responder: Responder = Arc::new(|p: &InvocationPayload| {
            let mut response = ok_response(&p.agent_id, 2);
            if p.agent_id == "plain" {
                response.delegation = Some(DelegationRequest {
                    reason: "sneaky".to_string(),
                    strategy: DelegationStrategy::Child,
                    new_nodes: vec![crate::runtime::testutil::worker("intruder", &[])],
                });
            }
            response
        });
        let port = mock_agent_service(responder).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow("no-deleg", vec![worker("plain", &[])]))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert_eq!(state.completed_agents, vec!["plain"]);
        assert!(!runtime.dag_store.get(&run_id).unwrap().has_node("intruder"));
    }

    #[tokio::test]
    async fn failure_without_matching_pattern_fails_the_run() {
        let responder: Responder = Arc::new(|p: &InvocationPayload| {
            if p.agent_id == "b" {
                failed_response("b", "model exploded")
            } else {
                ok_response(&p.agent_id, 1)
            }
        });
        let port = mock_agent_service(responder).await;
        // empty rule file: no escalation guard, failures are fatal
        let (_guard, runtime) = test_runtime_with_patterns(port, "[]");

        let run_id = runtime
            .start_workflow(workflow(
                "fatal",
                vec![worker("a", &[]), worker("b", &["a"]), worker("c", &["b"])],
            ))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Failed);
        assert_eq!(state.completed_agents, vec!["a"]);
        assert_eq!(state.failed_agents, vec!["b"]);
        let last = state.invocations.last().unwrap();
        assert_eq!(last.status, InvocationStatus::Failed);
        assert_eq!(last.error_message.as_deref(), Some("model exploded"));
    }

    #[tokio::test]
    async fn approval_pattern_pauses_then_resume_retries_the_node() {
        // first call to "flaky" fails, the retry succeeds
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let responder: Responder = Arc::new(move |p: &InvocationPayload| {
            if p.agent_id == "flaky" && counter.fetch_add(1, Ordering::SeqCst) == 0 {
                failed_response("flaky", "transient upstream error")
            } else {
                ok_response(&p.agent_id, 3)
            }
        });
        let port = mock_agent_service(responder).await;
        // built-in guards include the AgentFailed -> RequestApproval escalation
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .start_workflow(workflow(
                "hitl",
                vec![worker("flaky", &[]), worker("after", &["flaky"])],
            ))
            .unwrap();

        let paused = wait_until(&runtime, &run_id, |s| {
            s.status == RuntimeStatus::AwaitingApproval
        })
        .await;
        assert!(paused
            .invocations
            .iter()
            .any(|i| i.status == InvocationStatus::Paused && i.agent_id == "flaky"));
        // the node was released, not failed
        assert!(paused.failed_agents.is_empty());
        assert!(paused.active_agents.is_empty());

        runtime.resume_run(&run_id).unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);
        assert_eq!(state.completed_agents, vec!["flaky", "after"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_agent_service_is_a_node_failure() {
        // port 1 has no listener; with no patterns the run dies
        let (_guard, runtime) = test_runtime_with_patterns(1, "[]");
        let run_id = runtime
            .start_workflow(workflow("down", vec![worker("a", &[])]))
            .unwrap();

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Failed);
        assert_eq!(state.failed_agents, vec!["a"]);
    }

    #[tokio::test]
    async fn generated_files_are_promoted_to_the_artifact_tier() {
        let responder: Responder = Arc::new(|p: &InvocationPayload| {
            let mut response = ok_response(&p.agent_id, 1);
            response.output = Some(serde_json::json!({
                "result": "wrote a report",
                "files_generated": ["report.md"],
            }));
            response
        });
        let port = mock_agent_service(responder).await;
        let (_guard, runtime) = test_runtime(port);

        let run_id = runtime
            .register_run(workflow("files", vec![worker("writer", &[])]))
            .unwrap();
        // the agent service wrote into the session output tier
        std::fs::write(
            runtime.workspace().session_output_path(&run_id, "report.md"),
            b"# report",
        )
        .unwrap();
        runtime.spawn_scheduler(run_id.clone());

        let state = wait_until(&runtime, &run_id, |s| s.is_terminal()).await;
        assert_eq!(state.status, RuntimeStatus::Completed);

        // promotion is fire-and-forget; give it a beat
        let mut manifest = None;
        for _ in 0..100 {
            if let Ok(m) = runtime.workspace().load_manifest(&run_id).await {
                manifest = Some(m);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let manifest = manifest.expect("artifact manifest was never written");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].filename, "report.md");
        assert_eq!(manifest.files[0].agent_id, "writer");
        assert_eq!(manifest.workflow_id, "files");
    }

    #[tokio::test]
    async fn resume_is_rejected_while_running() {
        let port = mock_agent_service(Arc::new(|p| ok_response(&p.agent_id, 1))).await;
        let (_guard, runtime) = test_runtime(port);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();

        assert!(matches!(
            runtime.resume_run(&run_id),
            Err(RuntimeError::NotPaused(_))
        ));
    }
}
