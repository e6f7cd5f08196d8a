// [[CASCADE]]/apps/kernel-server/src/runtime/payload.rs
// Purpose: Invocation payload assembly: context merging, file mounts, tool policy, graph views.
// Architecture: Domain Logic Layer
// Dependencies: serde_json

use serde_json::Value;

use super::{CascadeRuntime, RuntimeError};
use crate::models::InvocationPayload;

const BASELINE_TOOLS: [&str; 3] = ["read_file", "list_files", "write_file"];

impl CascadeRuntime {
    /// Assemble everything the inference service needs to execute one node:
    /// resolved model, prompt with parent context appended, structured parent
    /// artifacts, inherited file mounts, augmented tools, and a topology view
    /// scaled to the node's privileges.
    pub async fn prepare_invocation_payload(
        &self,
        run_id: &str,
        agent_id: &str,
    ) -> Result<InvocationPayload, RuntimeError> {
        let config = self
            .agent_config(run_id, agent_id)
            .ok_or_else(|| RuntimeError::AgentNotFound(agent_id.to_string(), run_id.to_string()))?;

        // Reasoning continuity: first ancestor with a stored signature wins
        let parent_signature = config
            .depends_on
            .iter()
            .find_map(|parent_id| self.get_thought_signature(run_id, parent_id));

        let mut input_data = serde_json::Map::new();
        let mut context_appendix = String::new();
        let mut file_paths: Vec<String> = Vec::new();

        for parent_id in &config.depends_on {
            let Some(artifact) = self.persistence.fetch_artifact(run_id, parent_id).await else {
                continue;
            };

            let text = artifact
                .get("result")
                .and_then(|v| v.as_str())
                .or_else(|| artifact.get("output").and_then(|v| v.as_str()));
            if let Some(text) = text {
                context_appendix
                    .push_str(&format!("\n\n=== CONTEXT FROM AGENT {} ===\n{}\n", parent_id, text));
            }

            // Multimodal outputs propagate downstream as absolute mounts
            if let Some(files) = artifact.get("files_generated").and_then(|v| v.as_array()) {
                for filename in files.iter().filter_map(|f| f.as_str()) {
                    let path = self
                        .workspace
                        .session_output_path(run_id, filename)
                        .to_string_lossy()
                        .into_owned();
                    if !file_paths.contains(&path) {
                        file_paths.push(path);
                    }
                }
            }

            input_data.insert(parent_id.clone(), artifact);
        }

        let mut prompt = config.prompt.clone();
        if !context_appendix.is_empty() {
            prompt.push_str(&context_appendix);
        }

        let tools = augment_tools(config.tools.clone(), !file_paths.is_empty());
        let graph_view = self.render_graph_view(run_id, agent_id, config.allow_delegation)?;

        Ok(InvocationPayload {
            run_id: run_id.to_string(),
            agent_id: agent_id.to_string(),
            model: config.model.resolve(),
            prompt,
            user_directive: config.user_directive.clone(),
            input_data: Value::Object(input_data),
            parent_signature,
            thinking_level: config.model.thinking_budget(),
            file_paths,
            tools,
            allow_delegation: config.allow_delegation,
            graph_view,
        })
    }

    /// Topology rendering from one node's vantage point. Delegating nodes get
    /// the full structured graph; plain workers only see linear progress.
    fn render_graph_view(
        &self,
        run_id: &str,
        agent_id: &str,
        allow_delegation: bool,
    ) -> Result<String, RuntimeError> {
        let order = {
            let dag = self
                .dag_store
                .get(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;
            dag.topological_sort()?
        };
        let state = self
            .runtime_states
            .get(run_id)
            .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;

        let status_of = |id: &String| {
            if state.completed_agents.contains(id) {
                "COMPLETE"
            } else if state.failed_agents.contains(id) {
                "FAILED"
            } else if state.active_agents.contains(id) {
                "RUNNING"
            } else {
                "PENDING"
            }
        };

        if allow_delegation {
            let dag = self
                .dag_store
                .get(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;
            let nodes: Vec<Value> = order
                .iter()
                .map(|id| {
                    serde_json::json!({
                        "id": id,
                        "status": status_of(id),
                        "is_you": id == agent_id,
                        "dependencies": dag.get_dependencies(id),
                    })
                })
                .collect();
            Ok(Value::Array(nodes).to_string())
        } else {
            let rendered: Vec<String> = order
                .iter()
                .map(|id| {
                    let you = if id == agent_id { "(YOU)" } else { "" };
                    format!("[{}:{}{}]", id, status_of(id), you)
                })
                .collect();
            Ok(rendered.join(" -> "))
        }
    }
}

/// Deterministic tool policy: baseline file tools are always present, and
/// anything that can write or receives file mounts also gets the python
/// sandbox to work with them.
pub(crate) fn augment_tools(mut tools: Vec<String>, has_file_mounts: bool) -> Vec<String> {
    for baseline in BASELINE_TOOLS {
        if !tools.iter().any(|t| t == baseline) {
            tools.push(baseline.to_string());
        }
    }

    let needs_python = has_file_mounts || tools.iter().any(|t| t == "write_file");
    if needs_python && !tools.iter().any(|t| t == "execute_python") {
        tools.push("execute_python".to_string());
    }

    tools
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::models::{InvocationStatus, ModelVariant};

    #[test]
    fn baseline_tools_are_always_added_once() {
        let tools = augment_tools(vec!["web_search".to_string()], false);
        assert_eq!(
            tools,
            vec!["web_search", "read_file", "list_files", "write_file", "execute_python"]
        );

        // already-complete sets are left alone
        let again = augment_tools(tools.clone(), true);
        assert_eq!(again, tools);
    }

    #[test]
    fn write_capability_implies_python_sandbox() {
        let tools = augment_tools(Vec::new(), false);
        assert!(tools.iter().any(|t| t == "execute_python"));
    }

    #[tokio::test]
    async fn worker_payload_renders_linear_progress_view() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[]), worker("b", &["a"])]))
            .unwrap();

        // a finished, b is being dispatched
        runtime
            .record_invocation(
                &run_id,
                crate::models::AgentInvocation::annotation("a", InvocationStatus::Success, "ok"),
            )
            .await
            .unwrap();
        runtime
            .record_invocation(
                &run_id,
                crate::models::AgentInvocation::annotation("b", InvocationStatus::Running, "go"),
            )
            .await
            .unwrap();

        let payload = runtime.prepare_invocation_payload(&run_id, "b").await.unwrap();
        assert_eq!(payload.graph_view, "[a:COMPLETE] -> [b:RUNNING(YOU)]");
        assert!(!payload.allow_delegation);
        assert_eq!(payload.model, "fast");
        assert_eq!(payload.thinking_level, None);
        // no store configured, so no parent context is merged
        assert_eq!(payload.input_data, serde_json::json!({}));
        assert!(payload.prompt.starts_with("You are b"));
    }

    #[tokio::test]
    async fn orchestrator_payload_gets_the_structured_graph() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow(
                "wf",
                vec![orchestrator("boss", &[]), worker("w1", &["boss"])],
            ))
            .unwrap();

        let payload = runtime
            .prepare_invocation_payload(&run_id, "boss")
            .await
            .unwrap();
        assert!(payload.allow_delegation);

        let view: Vec<serde_json::Value> = serde_json::from_str(&payload.graph_view).unwrap();
        assert_eq!(view.len(), 2);
        let me = view.iter().find(|n| n["id"] == "boss").unwrap();
        assert_eq!(me["is_you"], true);
        assert_eq!(me["status"], "PENDING");
        let w1 = view.iter().find(|n| n["id"] == "w1").unwrap();
        assert_eq!(w1["dependencies"][0], "boss");
    }

    #[tokio::test]
    async fn thinking_tier_sets_the_budget() {
        let (_guard, runtime) = test_runtime(1);
        let mut deep = worker("deep", &[]);
        deep.model = ModelVariant::Thinking;
        deep.user_directive = "analyze the dataset".to_string();
        let run_id = runtime.register_run(workflow("wf", vec![deep])).unwrap();

        let payload = runtime
            .prepare_invocation_payload(&run_id, "deep")
            .await
            .unwrap();
        assert_eq!(payload.model, "thinking");
        assert_eq!(payload.thinking_level, Some(5));
        assert_eq!(payload.user_directive, "analyze the dataset");
        assert!(payload.parent_signature.is_none());
    }

    #[tokio::test]
    async fn unknown_agent_is_reported() {
        let (_guard, runtime) = test_runtime(1);
        let run_id = runtime
            .register_run(workflow("wf", vec![worker("a", &[])]))
            .unwrap();
        assert!(matches!(
            runtime.prepare_invocation_payload(&run_id, "ghost").await,
            Err(RuntimeError::AgentNotFound(_, _))
        ));
    }
}
