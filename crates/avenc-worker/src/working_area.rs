//! Per-job scratch directories.
//!
//! A working area is created fresh for every pipeline execution and never
//! shared. It is removed by [`WorkingArea::destroy`], or on drop if the
//! pipeline is torn down early.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use avenc_models::EncodingParams;

use crate::error::{WorkerError, WorkerResult};

const AREA_PREFIX: &str = "job-";

#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    /// Create a uniquely named directory under `root`, creating `root` if
    /// needed.
    pub async fn create(root: &Path) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(WorkerError::WorkingArea)?;

        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(AREA_PREFIX).tempdir_in(root)
        })
        .await
        .map_err(|e| WorkerError::WorkingArea(std::io::Error::other(e)))?
        .map_err(WorkerError::WorkingArea)?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded source goes; the format hint is the suffix.
    pub fn source_path(&self, format_hint: &str) -> PathBuf {
        self.dir.path().join(format!("source.{}", format_hint))
    }

    /// Where the transcoder writes its output.
    pub fn output_path(&self, params: &EncodingParams) -> PathBuf {
        self.dir.path().join(params.output_file_name())
    }

    /// Remove the directory and everything in it.
    pub async fn destroy(self) -> std::io::Result<()> {
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(std::io::Error::other)?
    }
}
