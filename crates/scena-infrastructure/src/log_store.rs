//! Session log persistence.

use scena_core::session::SessionLog;
use scena_core::Result;
use std::path::{Path, PathBuf};

use crate::paths::{write_atomic, ScenaPaths};

/// Writes session logs under `<output_dir>/logs/` in both machine and
/// human formats.
pub struct LogStore {
    logs_dir: PathBuf,
}

impl LogStore {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            logs_dir: ScenaPaths::logs_dir(output_dir),
        }
    }

    pub fn json_path(&self, session_id: &str) -> PathBuf {
        self.logs_dir.join(format!("session_{session_id}.json"))
    }

    pub fn markdown_path(&self, session_id: &str) -> PathBuf {
        self.logs_dir.join(format!("session_{session_id}.md"))
    }

    /// Persists both formats. Each file is written atomically.
    pub async fn save(&self, log: &SessionLog) -> Result<()> {
        let json = serde_json::to_string_pretty(log)?;
        write_atomic(&self.json_path(&log.session_id), &json).await?;
        write_atomic(&self.markdown_path(&log.session_id), &log.to_markdown()).await?;
        tracing::info!(session_id = %log.session_id, dir = %self.logs_dir.display(), "session log saved");
        Ok(())
    }

    /// Loads the JSON form of a previously saved session.
    pub async fn load(&self, session_id: &str) -> Result<SessionLog> {
        let path = self.json_path(session_id);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| scena_core::ScenaError::io(format!("read {}: {err}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads a session log from an explicit file path.
    pub async fn load_from(path: &Path) -> Result<SessionLog> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| scena_core::ScenaError::io(format!("read {}: {err}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }
}
