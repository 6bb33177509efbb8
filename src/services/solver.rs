use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{LinkError, Result};
use crate::models::PartitionTask;
use crate::services::partition::remove_stale;

/// External relocation program run once per partition
///
/// Implementations block; the pool runs them on blocking threads.
pub trait RelocationSolver: Send + Sync {
    /// Relocate one partition whose inputs are already on disk, returning the output path
    fn relocate(&self, task: &PartitionTask) -> Result<PathBuf>;
}

/// hypoDD invoked as a subprocess
#[derive(Debug, Clone)]
pub struct HypoDd {
    binary: PathBuf,
}

impl HypoDd {
    pub fn new(hypo_root: &Path) -> Self {
        Self {
            binary: hypo_root.join("hypoDD"),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl RelocationSolver for HypoDd {
    fn relocate(&self, task: &PartitionTask) -> Result<PathBuf> {
        // only a file written by this run counts as output
        remove_stale(&task.paths.reloc_file)?;

        let log = File::create(&task.paths.solver_log)
            .map_err(|e| LinkError::io(&task.paths.solver_log, e))?;

        tracing::info!("run hypoDD: grid {}", task.id);
        let status = Command::new(&self.binary)
            .arg(&task.paths.control_file)
            .stdout(Stdio::from(log))
            .stderr(Stdio::null())
            .status()
            .map_err(|e| LinkError::PartitionFailure {
                partition: task.id.to_string(),
                reason: format!("cannot start {}: {}", self.binary.display(), e),
            })?;

        if !status.success() {
            tracing::warn!("hypoDD exited with {} for grid {}", status, task.id);
        }

        // a non-zero exit can still leave a usable reloc file
        if !task.paths.reloc_file.exists() {
            return Err(LinkError::PartitionFailure {
                partition: task.id.to_string(),
                reason: format!("no output at {}", task.paths.reloc_file.display()),
            });
        }

        Ok(task.paths.reloc_file.clone())
    }
}
