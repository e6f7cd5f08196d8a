// [[CASCADE]]/apps/kernel-server/src/runtime/surgery.rs
// Purpose: Delegation graph splicing. Config mutates first, then edges; topology is revalidated.
// Architecture: Domain Logic Layer
// Dependencies: serde_json

use super::{CascadeRuntime, RuntimeError};
use crate::events::{EventType, RuntimeEvent};
use crate::models::{DelegationRequest, DelegationStrategy};

impl CascadeRuntime {
    /// Splice a delegation request from node P into the live run.
    ///
    /// Child strategy: P -> [new nodes] -> original dependents of P, with the
    /// dependents' `depends_on` rewritten to match. Sibling strategy: new
    /// nodes hang off P in parallel with the existing dependents.
    ///
    /// Rollback of a half-applied splice is out of scope; the post-mutation
    /// sort failing fails the run. Well-formed delegations cannot introduce a
    /// cycle because new nodes have no incoming edges besides P's.
    pub async fn apply_delegation(
        &self,
        run_id: &str,
        parent_id: &str,
        request: DelegationRequest,
    ) -> Result<(), RuntimeError> {
        if request.new_nodes.is_empty() {
            return Err(RuntimeError::Delegation(
                "delegation carried no new nodes".to_string(),
            ));
        }

        // Snapshot P's dependents before any mutation
        let dependents = {
            let dag = self
                .dag_store
                .get(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;
            if !dag.has_node(parent_id) {
                return Err(RuntimeError::Delegation(format!(
                    "unknown delegating node: {}",
                    parent_id
                )));
            }
            for node in &request.new_nodes {
                if dag.has_node(&node.id) {
                    return Err(RuntimeError::Delegation(format!(
                        "node id already exists: {}",
                        node.id
                    )));
                }
            }
            dag.get_children(parent_id)
        };

        // Config first: the scheduler recomputes topology from the DAG on its
        // next iteration, so readers see config changes no later than edges
        {
            let mut workflow = self
                .workflows
                .get_mut(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;

            for node in &request.new_nodes {
                let mut node = node.clone();
                if !node.depends_on.iter().any(|d| d == parent_id) {
                    node.depends_on.push(parent_id.to_string());
                }
                workflow.agents.push(node);
            }

            if request.strategy == DelegationStrategy::Child {
                for agent in workflow.agents.iter_mut() {
                    if !dependents.contains(&agent.id) {
                        continue;
                    }
                    agent.depends_on.retain(|d| d != parent_id);
                    for node in &request.new_nodes {
                        if !agent.depends_on.contains(&node.id) {
                            agent.depends_on.push(node.id.clone());
                        }
                    }
                }
            }
        }

        {
            let mut dag = self
                .dag_store
                .get_mut(run_id)
                .ok_or_else(|| RuntimeError::RunNotFound(run_id.to_string()))?;

            for node in &request.new_nodes {
                dag.add_node(node.id.clone());
                // P -> new node, so the new node inherits P's context
                dag.add_edge(parent_id, &node.id)?;

                if request.strategy == DelegationStrategy::Child {
                    for dependent in &dependents {
                        dag.add_edge(&node.id, dependent)?;
                    }
                }
            }

            if request.strategy == DelegationStrategy::Child {
                for dependent in &dependents {
                    // The edge should exist; a missing one is not worth dying over
                    let _ = dag.remove_edge(parent_id, dependent);
                }
            }

            dag.topological_sort()?;
        }

        for node in &request.new_nodes {
            self.emit_event(RuntimeEvent::new(
                run_id,
                EventType::NodeCreated,
                Some(node.id.clone()),
                serde_json::json!({
                    "id": node.id,
                    "delegated_by": parent_id,
                    "strategy": request.strategy,
                    "reason": request.reason,
                }),
            ));
        }

        tracing::info!(
            "Spliced {} node(s) into run {} under {} ({:?})",
            request.new_nodes.len(),
            run_id,
            parent_id,
            request.strategy
        );
        Ok(())
    }
}
