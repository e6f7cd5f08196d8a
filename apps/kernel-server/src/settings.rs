// [[CASCADE]]/apps/kernel-server/src/settings.rs
// Purpose: Boot-time configuration. Resolves the environment once; nothing else reads env vars.
// Architecture: Infrastructure Layer
// Dependencies: std::env

use std::env;
use std::path::PathBuf;

const DEFAULT_KERNEL_PORT: u16 = 3000;
const DEFAULT_AGENT_HOST: &str = "127.0.0.1";
const DEFAULT_AGENT_PORT: u16 = 8000;
const DEFAULT_STORAGE_ROOT: &str = "/app/storage";

/// Resolved kernel configuration. Constructed once in `main` (or directly in
/// tests) and handed to the runtime; the rest of the kernel never touches the
/// process environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub kernel_port: u16,
    pub agent_host: String,
    pub agent_port: u16,
    pub redis_url: Option<String>,
    pub storage_root: PathBuf,
    pub patterns_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            kernel_port: parse_port("KERNEL_PORT", DEFAULT_KERNEL_PORT),
            agent_host: env::var("AGENT_HOST").unwrap_or_else(|_| DEFAULT_AGENT_HOST.to_string()),
            agent_port: parse_port("AGENT_PORT", DEFAULT_AGENT_PORT),
            redis_url: env::var("REDIS_URL").ok(),
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            patterns_path: env::var("PATTERNS_PATH").ok().map(PathBuf::from),
        }
    }

    /// Endpoint the scheduler POSTs invocation payloads to.
    pub fn agent_invoke_url(&self) -> String {
        format!("http://{}:{}/invoke", self.agent_host, self.agent_port)
    }

    /// Endpoint notified when a run reaches a terminal state so the agent
    /// service can drop per-run resources.
    pub fn agent_cleanup_url(&self, run_id: &str) -> String {
        format!(
            "http://{}:{}/session/{}/cleanup",
            self.agent_host, self.agent_port, run_id
        )
    }

    /// Location of the pattern rule file. Falls back to a well-known path
    /// inside the storage volume when PATTERNS_PATH is not set.
    pub fn patterns_file(&self) -> PathBuf {
        self.patterns_path
            .clone()
            .unwrap_or_else(|| self.storage_root.join("patterns.json"))
    }
}

fn parse_port(var: &str, fallback: u16) -> u16 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(fallback)
}
