//! Unified path management for scena artifacts.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/scena/             # Config directory
//! └── personas/                # Custom personas, one TOML file each
//!
//! <output_dir>/                # Per-run artifact root (default scena_output/)
//! ├── logs/                    # Session logs (.json + .md)
//! └── reports/                 # Evaluation reports (.json + .md)
//! ```

use scena_core::{Result, ScenaError};
use std::path::{Path, PathBuf};

/// Resolves scena's config and artifact directories.
pub struct ScenaPaths;

impl ScenaPaths {
    /// Returns the scena configuration directory, `~/.config/scena` on
    /// Linux.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("scena"))
            .ok_or_else(|| ScenaError::config("cannot determine config directory"))
    }

    /// Directory holding custom persona TOML files.
    pub fn personas_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("personas"))
    }

    /// Session log directory below an output root.
    pub fn logs_dir(output_dir: &Path) -> PathBuf {
        output_dir.join("logs")
    }

    /// Evaluation report directory below an output root.
    pub fn reports_dir(output_dir: &Path) -> PathBuf {
        output_dir.join("reports")
    }
}

/// Writes `content` atomically: to a sibling `.tmp` file first, then a
/// rename over the final path. The parent directory is created if missing.
pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ScenaError::io(format!("create {}: {err}", parent.display())))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|err| ScenaError::io(format!("write {}: {err}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| ScenaError::io(format!("rename to {}: {err}", path.display())))?;
    Ok(())
}
