// [[CASCADE]]/apps/kernel-server/src/workspace.rs
// Purpose: The three file tiers: library (permanent inputs), sessions (per-run scratch),
//          artifacts (promoted outputs with a manifest).
// Architecture: Infrastructure Layer
// Dependencies: std::fs, tokio::fs, serde_json, chrono

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ARTIFACT_RETENTION_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Human-readable manifest written next to a run's promoted artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub run_id: String,
    pub workflow_id: String,
    pub user_directive: String,
    pub created_at: String,
    pub expires_at: String,
    pub files: Vec<ArtifactFileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFileEntry {
    pub filename: String,
    pub agent_id: String,
    pub generated_at: String,
    pub size: u64,
    pub content_type: String,
}

/// Reject path traversal before any filename touches the filesystem.
pub fn check_filename(name: &str) -> Result<(), WorkspaceError> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(WorkspaceError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

/// Content type guessed from the extension; good enough for serving and for
/// the manifest.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".json") {
        "application/json"
    } else if lower.ends_with(".md") {
        "text/markdown"
    } else if lower.ends_with(".txt") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Workspace { root: root.into() }
    }

    pub fn library_dir(&self) -> PathBuf {
        self.root.join("library")
    }

    pub fn session_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("sessions").join(run_id)
    }

    pub fn session_input_dir(&self, run_id: &str) -> PathBuf {
        self.session_dir(run_id).join("input")
    }

    pub fn session_output_dir(&self, run_id: &str) -> PathBuf {
        self.session_dir(run_id).join("output")
    }

    pub fn artifacts_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("artifacts").join(run_id)
    }

    /// Absolute path of a file a node wrote into its session output tier.
    pub fn session_output_path(&self, run_id: &str, filename: &str) -> PathBuf {
        self.session_output_dir(run_id).join(filename)
    }

    /// Create the per-run scratch directories and snapshot the requested
    /// library files into the input tier. Missing library files warn; the run
    /// still starts.
    pub fn init_run_session(&self, run_id: &str, attached_files: &[String]) -> io::Result<()> {
        let input = self.session_input_dir(run_id);
        let output = self.session_output_dir(run_id);
        std::fs::create_dir_all(&input)?;
        std::fs::create_dir_all(&output)?;

        tracing::info!(
            "Created workspace for run {}: {}",
            run_id,
            self.session_dir(run_id).display()
        );

        for filename in attached_files {
            if check_filename(filename).is_err() {
                tracing::warn!("Skipping suspicious attached filename: {}", filename);
                continue;
            }
            let src = self.library_dir().join(filename);
            let dest = input.join(filename);

            if src.exists() {
                // Copy, not link: session mutations must never touch the library
                match std::fs::copy(&src, &dest) {
                    Ok(_) => tracing::info!("Attached file {} to run {}", filename, run_id),
                    Err(e) => tracing::error!("Failed to copy {}: {}", filename, e),
                }
            } else {
                tracing::warn!("Requested file {} not found in library", filename);
            }
        }

        Ok(())
    }

    pub async fn save_to_library(&self, filename: &str, data: &[u8]) -> Result<(), WorkspaceError> {
        check_filename(filename)?;
        let dir = self.library_dir();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(filename), data).await?;
        tracing::info!("Saved {} to library ({} bytes)", filename, data.len());
        Ok(())
    }

    pub async fn list_library(&self) -> io::Result<Vec<String>> {
        let dir = self.library_dir();
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                if let Ok(name) = entry.file_name().into_string() {
                    if !name.starts_with('.') {
                        files.push(name);
                    }
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Promote files a node generated in its session output into the
    /// long-term artifact tier and extend the run's manifest. Files that are
    /// missing from the session are skipped with a warning. Returns how many
    /// files landed.
    pub async fn promote_artifacts(
        &self,
        run_id: &str,
        workflow_id: &str,
        user_directive: &str,
        agent_id: &str,
        files: &[String],
    ) -> Result<usize, WorkspaceError> {
        let dest_dir = self.artifacts_dir(run_id);
        tokio::fs::create_dir_all(&dest_dir).await?;

        let mut manifest = match self.load_manifest(run_id).await {
            Ok(existing) => existing,
            Err(_) => {
                let now = Utc::now();
                ArtifactManifest {
                    run_id: run_id.to_string(),
                    workflow_id: workflow_id.to_string(),
                    user_directive: user_directive.to_string(),
                    created_at: now.to_rfc3339(),
                    expires_at: (now + Duration::days(ARTIFACT_RETENTION_DAYS)).to_rfc3339(),
                    files: Vec::new(),
                }
            }
        };

        let mut promoted = 0;
        for filename in files {
            if check_filename(filename).is_err() {
                tracing::warn!("Skipping suspicious generated filename: {}", filename);
                continue;
            }
            let src = self.session_output_path(run_id, filename);
            if !src.exists() {
                tracing::warn!(
                    "Generated file {} missing from session output of {}",
                    filename,
                    run_id
                );
                continue;
            }

            let dest = dest_dir.join(filename);
            let size = match tokio::fs::copy(&src, &dest).await {
                Ok(size) => size,
                Err(e) => {
                    tracing::error!("Failed to promote {}: {}", filename, e);
                    continue;
                }
            };

            manifest.files.retain(|f| f.filename != *filename);
            manifest.files.push(ArtifactFileEntry {
                filename: filename.clone(),
                agent_id: agent_id.to_string(),
                generated_at: Utc::now().to_rfc3339(),
                size,
                content_type: content_type_for(filename).to_string(),
            });
            promoted += 1;
        }

        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(dest_dir.join("metadata.json"), json).await?;

        tracing::info!("Promoted {} artifact(s) for run {}", promoted, run_id);
        Ok(promoted)
    }

    pub async fn list_artifact_runs(&self) -> io::Result<Vec<String>> {
        let dir = self.root.join("artifacts");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut runs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                if let Ok(name) = entry.file_name().into_string() {
                    runs.push(name);
                }
            }
        }
        runs.sort();
        Ok(runs)
    }

    pub async fn load_manifest(&self, run_id: &str) -> Result<ArtifactManifest, WorkspaceError> {
        let path = self.artifacts_dir(run_id).join("metadata.json");
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn delete_artifact_run(&self, run_id: &str) -> io::Result<()> {
        tokio::fs::remove_dir_all(self.artifacts_dir(run_id)).await?;
        tracing::info!("Deleted artifact run: {}", run_id);
        Ok(())
    }

    /// Copy a promoted artifact back into the permanent library.
    pub async fn promote_to_library(
        &self,
        run_id: &str,
        filename: &str,
    ) -> Result<(), WorkspaceError> {
        check_filename(filename)?;
        let src = self.artifacts_dir(run_id).join(filename);
        if !src.exists() {
            return Err(WorkspaceError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found in artifacts of {}", filename, run_id),
            )));
        }
        let dir = self.library_dir();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(&src, dir.join(filename)).await?;
        tracing::info!("Promoted artifact {} from run {} to library", filename, run_id);
        Ok(())
    }

    /// Drop a run's session scratch.
    pub fn cleanup_run(&self, run_id: &str) -> io::Result<()> {
        let path = self.session_dir(run_id);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
            tracing::info!("Cleaned up workspace for run {}", run_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    #[test]
    fn init_creates_session_tiers_and_copies_library_files() {
        let (_guard, ws) = scratch();
        std::fs::create_dir_all(ws.library_dir()).unwrap();
        std::fs::write(ws.library_dir().join("data.csv"), "a,b\n1,2\n").unwrap();

        ws.init_run_session("r1", &["data.csv".to_string(), "missing.txt".to_string()])
            .unwrap();

        assert!(ws.session_input_dir("r1").is_dir());
        assert!(ws.session_output_dir("r1").is_dir());
        assert!(ws.session_input_dir("r1").join("data.csv").is_file());
        // missing library file warns, never fails the run
        assert!(!ws.session_input_dir("r1").join("missing.txt").exists());
    }

    #[test]
    fn filename_checks_reject_traversal() {
        assert!(check_filename("report.md").is_ok());
        assert!(check_filename("../etc/passwd").is_err());
        assert!(check_filename("a/b.txt").is_err());
        assert!(check_filename("").is_err());
    }

    #[tokio::test]
    async fn promotion_copies_files_and_writes_manifest() {
        let (_guard, ws) = scratch();
        ws.init_run_session("r1", &[]).unwrap();
        std::fs::write(ws.session_output_path("r1", "plot.png"), b"png-bytes").unwrap();

        let promoted = ws
            .promote_artifacts("r1", "wf1", "make a plot", "grapher", &["plot.png".to_string()])
            .await
            .unwrap();
        assert_eq!(promoted, 1);
        assert!(ws.artifacts_dir("r1").join("plot.png").is_file());

        let manifest = ws.load_manifest("r1").await.unwrap();
        assert_eq!(manifest.run_id, "r1");
        assert_eq!(manifest.workflow_id, "wf1");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].agent_id, "grapher");
        assert_eq!(manifest.files[0].content_type, "image/png");
        assert_eq!(manifest.files[0].size, 9);
        assert!(manifest.expires_at > manifest.created_at);
    }

    #[tokio::test]
    async fn promotion_appends_to_an_existing_manifest() {
        let (_guard, ws) = scratch();
        ws.init_run_session("r1", &[]).unwrap();
        std::fs::write(ws.session_output_path("r1", "one.txt"), b"1").unwrap();
        std::fs::write(ws.session_output_path("r1", "two.txt"), b"22").unwrap();

        ws.promote_artifacts("r1", "wf1", "", "a", &["one.txt".to_string()])
            .await
            .unwrap();
        ws.promote_artifacts("r1", "wf1", "", "b", &["two.txt".to_string()])
            .await
            .unwrap();

        let manifest = ws.load_manifest("r1").await.unwrap();
        assert_eq!(manifest.files.len(), 2);
        let runs = ws.list_artifact_runs().await.unwrap();
        assert_eq!(runs, vec!["r1"]);
    }

    #[tokio::test]
    async fn promote_missing_session_file_is_skipped() {
        let (_guard, ws) = scratch();
        ws.init_run_session("r1", &[]).unwrap();

        let promoted = ws
            .promote_artifacts("r1", "wf1", "", "a", &["ghost.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(promoted, 0);
        assert!(ws.load_manifest("r1").await.unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn library_round_trip_and_promotion() {
        let (_guard, ws) = scratch();
        ws.save_to_library("notes.md", b"# hi").await.unwrap();
        assert_eq!(ws.list_library().await.unwrap(), vec!["notes.md"]);

        ws.init_run_session("r1", &[]).unwrap();
        std::fs::write(ws.session_output_path("r1", "result.json"), b"{}").unwrap();
        ws.promote_artifacts("r1", "wf1", "", "a", &["result.json".to_string()])
            .await
            .unwrap();
        ws.promote_to_library("r1", "result.json").await.unwrap();

        let mut lib = ws.list_library().await.unwrap();
        lib.sort();
        assert_eq!(lib, vec!["notes.md", "result.json"]);
    }

    #[test]
    fn cleanup_removes_session_scratch() {
        let (_guard, ws) = scratch();
        ws.init_run_session("r1", &[]).unwrap();
        assert!(ws.session_dir("r1").exists());
        ws.cleanup_run("r1").unwrap();
        assert!(!ws.session_dir("r1").exists());
        // second call is a no-op
        ws.cleanup_run("r1").unwrap();
    }

    #[test]
    fn content_types_cover_the_common_artifacts() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.csv"), "text/csv");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
