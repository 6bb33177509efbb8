//! One handler per pipeline stage.
//!
//! Handlers read their inputs from the configured paths, call into `core`,
//! and write their outputs back to disk.

pub mod mk_pha;
pub mod relocate;
pub mod select_dt;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Settings, DEFAULT_PROFILE};
use crate::error::{LinkError, Result};
use crate::models::RelocationReport;
use crate::services::HypoDd;

pub use mk_pha::mk_pha;
pub use relocate::relocate;
pub use select_dt::{select_dt, SelectOptions};

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| LinkError::io(path, e))
}

/// Create the parent directory of an output file if needed
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| LinkError::io(dir, e))
        }
        _ => Ok(()),
    }
}

/// Run all three stages in order with the default selection profile
pub async fn run_all(settings: &Settings) -> Result<RelocationReport> {
    mk_pha(settings)?;
    select_dt(
        settings,
        &SelectOptions {
            profile: DEFAULT_PROFILE.to_string(),
            input: None,
            output: None,
        },
    )?;
    relocate(settings, Arc::new(HypoDd::new(&settings.paths.hypo_root))).await
}
