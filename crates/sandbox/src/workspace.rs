//! Ephemeral host directories that hold submitted source code.
//!
//! A `StagedWorkspace` owns its directory: dropping it removes the directory
//! recursively, so every exit path of an execution releases it.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sandbox_mcp_core::config::WorkspaceConfig;
use sandbox_mcp_core::{Error, Result};

/// Creates staged workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceStager {
    prefix: String,
    mount_target: String,
    base_dir: Option<PathBuf>,
}

/// A temporary directory holding `main.<ext>`, destined for a bind mount.
#[derive(Debug)]
pub struct StagedWorkspace {
    dir: TempDir,
    mount_target: String,
    source_file: PathBuf,
}

impl WorkspaceStager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            prefix: config.temp_prefix.clone(),
            mount_target: config.mount_target.clone(),
            base_dir: config.base_dir.as_ref().map(PathBuf::from),
        }
    }

    /// Stage under `base_dir` instead of the system temp dir.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn mount_target(&self) -> &str {
        &self.mount_target
    }

    /// Write `code` to `main.<extension>` in a fresh directory.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD before writing.
    pub fn stage(&self, code: impl AsRef<[u8]>, extension: &str) -> Result<StagedWorkspace> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix);
        let dir = match &self.base_dir {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::staging(format!("failed to create temporary directory: {}", e)))?;

        // The container user is not necessarily the owner of the directory.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755))
                .map_err(|e| Error::staging(format!("failed to set permissions: {}", e)))?;
        }

        let text = String::from_utf8_lossy(code.as_ref());
        let source_file = dir.path().join(format!("main.{}", extension));
        let mut file = std::fs::File::create(&source_file)
            .map_err(|e| Error::staging(format!("failed to create source file: {}", e)))?;
        file.write_all(text.as_bytes())
            .map_err(|e| Error::staging(format!("failed to write code to source file: {}", e)))?;

        tracing::debug!(path = %dir.path().display(), bytes = text.len(), "Workspace staged");

        Ok(StagedWorkspace {
            dir,
            mount_target: self.mount_target.clone(),
            source_file,
        })
    }
}

impl Default for WorkspaceStager {
    fn default() -> Self {
        Self::new(&WorkspaceConfig::default())
    }
}

impl StagedWorkspace {
    pub fn host_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn mount_target(&self) -> &str {
        &self.mount_target
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Remove the directory now, reporting failures that `Drop` would swallow.
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().display().to_string();
        self.dir
            .close()
            .map_err(|e| Error::staging(format!("failed to remove {}: {}", path, e)))
    }
}
