// [[CASCADE]]/apps/kernel-server/src/patterns.rs
// Purpose: Pattern registry. Event-Condition-Action rules loaded from disk, with built-in fallbacks.
// Architecture: Sentinel Layer
// Dependencies: DashMap, Serde, Models

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::AgentNodeConfig;
use crate::settings::Settings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    /// Event type name that wakes this pattern (loose match, see registry)
    pub trigger_event: String,
    /// "*" matches anything; otherwise a substring match on the event payload
    pub condition: String,
    pub action: PatternAction,
}

impl Pattern {
    /// Condition check against the serialized event payload.
    pub fn condition_matches(&self, payload: &str) -> bool {
        self.condition == "*" || payload.contains(&self.condition)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternAction {
    /// Kill the run immediately
    Interrupt { reason: String },
    /// Pause the run and wait for a human
    RequestApproval { reason: String },
    /// Splice a remedial agent next to the triggering node
    SpawnAgent { config: AgentNodeConfig },
}

pub struct PatternRegistry {
    patterns: DashMap<String, Pattern>,
}

impl PatternRegistry {
    /// Load rules from the configured file; a missing or malformed file falls
    /// back to the built-in guard set. An existing file that parses to an
    /// empty list is honored as "no rules".
    pub fn load(settings: &Settings) -> Self {
        let path = settings.patterns_file();
        match Self::from_file(&path) {
            Ok(registry) => {
                tracing::info!(
                    "Loaded {} pattern(s) from {}",
                    registry.patterns.len(),
                    path.display()
                );
                registry
            }
            Err(e) => {
                tracing::warn!(
                    "Pattern file {} unavailable ({}). Registering built-in guards.",
                    path.display(),
                    e
                );
                Self::with_defaults()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let rules: Vec<Pattern> = serde_json::from_str(&raw).map_err(|e| e.to_string())?;

        let registry = Self {
            patterns: DashMap::new(),
        };
        for pattern in rules {
            registry.register(pattern);
        }
        Ok(registry)
    }

    pub fn with_defaults() -> Self {
        let registry = Self {
            patterns: DashMap::new(),
        };

        // Destructive filesystem access is never allowed
        registry.register(Pattern {
            id: "guard_fs_delete".to_string(),
            name: "Prevent File Deletion".to_string(),
            trigger_event: "ToolCall".to_string(),
            condition: "fs_delete".to_string(),
            action: PatternAction::Interrupt {
                reason: "Safety violation: file deletion is prohibited by system policy."
                    .to_string(),
            },
        });

        // A failed agent pauses the run for a human instead of killing it
        registry.register(Pattern {
            id: "guard_agent_failure".to_string(),
            name: "Failure Escalation".to_string(),
            trigger_event: "AgentFailed".to_string(),
            condition: "*".to_string(),
            action: PatternAction::RequestApproval {
                reason: "Agent failed. Human approval required before retry.".to_string(),
            },
        });

        registry
    }

    pub fn register(&self, pattern: Pattern) {
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns listening for an event type. The trigger matches when it
    /// equals the type name or is a substring of it (intentionally loose).
    pub fn patterns_for_trigger(&self, event_type: &str) -> Vec<Pattern> {
        self.patterns
            .iter()
            .filter(|p| event_type.contains(p.trigger_event.as_str()))
            .map(|p| p.value().clone())
            .collect()
    }
}
