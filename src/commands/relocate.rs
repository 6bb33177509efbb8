use std::fs;
use std::sync::Arc;

use chrono::Utc;

use crate::config::Settings;
use crate::error::{LinkError, Result};
use crate::formats::{parse_catalog, read_pairs};
use crate::models::{IdSource, RelocationReport};
use crate::services::{
    merge_outputs, plan_partitions, remove_partition_files, MergedPaths, PartitionPool,
    RelocationSolver, SharedInputs,
};

use super::read_text;

/// Relocate the working catalog partition by partition and merge the results
///
/// The report is written to `<output_dir>/<ctlg_code>_report.json` before the
/// zero-output check, so a failed run still leaves its per-partition reasons.
pub async fn relocate(
    settings: &Settings,
    solver: Arc<dyn RelocationSolver>,
) -> Result<RelocationReport> {
    let paths = &settings.paths;
    let relocation = &settings.relocation;

    for dir in [&paths.input_dir, &paths.output_dir] {
        fs::create_dir_all(dir).map_err(|e| LinkError::io(dir, e))?;
    }

    let events = parse_catalog(&read_text(&paths.working_catalog)?, IdSource::Explicit)?;
    let pairs = read_pairs(&read_text(&paths.dt_output)?);
    let control_template = read_text(&paths.hypodd_template)?;
    tracing::info!("relocating {} events linked by {} pairs", events.len(), pairs.len());

    let tasks = plan_partitions(&events, relocation, paths);
    let shared = Arc::new(SharedInputs {
        events,
        pairs,
        control_template,
        dep_corr: relocation.dep_corr,
    });

    let pool = PartitionPool::new(solver, relocation.num_workers);
    let outcomes = pool.run(tasks.clone(), shared).await;

    let merged = MergedPaths::from_settings(paths);
    merge_outputs(&tasks, &merged)?;
    if !relocation.keep_grids {
        remove_partition_files(&tasks);
    }

    let partitions: Vec<_> = outcomes.into_values().collect();
    let report = RelocationReport {
        ctlg_code: paths.ctlg_code.clone(),
        total_relocated: partitions.iter().map(|p| p.relocated).sum(),
        failed_partitions: partitions.iter().filter(|p| p.failure.is_some()).count(),
        partitions,
        finished_at: Utc::now(),
    };

    let report_path = paths.output_dir.join(format!("{}_report.json", paths.ctlg_code));
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| LinkError::io(&report_path, std::io::Error::other(e)))?;
    fs::write(&report_path, json).map_err(|e| LinkError::io(&report_path, e))?;

    tracing::info!(
        "relocated {} events; {} of {} partitions failed",
        report.total_relocated,
        report.failed_partitions,
        report.partitions.len()
    );

    if report.total_relocated == 0 {
        return Err(LinkError::NoOutput);
    }
    Ok(report)
}
