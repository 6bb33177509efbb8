use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{PathSettings, RelocationSettings};
use crate::core::{grid_cells, is_within_bounding_box, merge_relocated, pad_box, padded_box};
use crate::error::{LinkError, Result};
use crate::formats::{
    format_event_dat_line, format_merged_header, parse_reloc, render_control_file, write_pairs,
};
use crate::models::{
    BoundingBox, DtPair, EventIndex, PartitionId, PartitionOutcome, PartitionPaths, PartitionTask,
};
use crate::services::solver::RelocationSolver;

/// Read-only data shared by every partition task
#[derive(Debug)]
pub struct SharedInputs {
    pub events: EventIndex,
    pub pairs: Vec<DtPair>,
    pub control_template: String,
    pub dep_corr: f64,
}

/// Final merged output files
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPaths {
    pub ctlg: PathBuf,
    pub pha: PathBuf,
    pub pha_full: PathBuf,
}

impl MergedPaths {
    pub fn from_settings(paths: &PathSettings) -> Self {
        let code = &paths.ctlg_code;
        Self {
            ctlg: paths.output_dir.join(format!("{}.ctlg", code)),
            pha: paths.output_dir.join(format!("{}.pha", code)),
            pha_full: paths.output_dir.join(format!("{}_full.pha", code)),
        }
    }
}

pub fn partition_paths(paths: &PathSettings, id: PartitionId) -> PartitionPaths {
    let (input, output, code) = (&paths.input_dir, &paths.output_dir, &paths.ctlg_code);
    PartitionPaths {
        event_file: input.join(format!("event_{}.dat", id)),
        dt_file: input.join(format!("dt_{}.cc", id)),
        control_file: input.join(format!("hypoDD_{}.inp", id)),
        reloc_file: output.join(format!("hypoDD_{}.reloc", id)),
        solver_log: output.join(format!("{}.hypoDD", id)),
        ctlg: output.join(format!("{}_{}.ctlg", code, id)),
        pha: output.join(format!("{}_{}.pha", code, id)),
        pha_full: output.join(format!("{}_{}_full.pha", code, id)),
    }
}

/// Cell that owns a point; shared edges go to the higher column or row
fn owner_of(lat: f64, lon: f64, region: &BoundingBox, grids: [usize; 2]) -> Option<(usize, usize)> {
    if !is_within_bounding_box(lat, lon, region) {
        return None;
    }
    let (cols, rows) = (grids[0].max(1), grids[1].max(1));
    let min = region.min();
    let col = ((lon - min.x) / region.width() * cols as f64).floor() as usize;
    let row = ((lat - min.y) / region.height() * rows as f64).floor() as usize;
    Some((col.min(cols - 1), row.min(rows - 1)))
}

/// Split the study region into partition tasks
///
/// Each partition owns the events of its cell and reads every event within
/// the cell padded by `xy_pad`. Events outside the unpadded region constrain
/// their neighbours but are owned by no partition.
pub fn plan_partitions(
    events: &EventIndex,
    relocation: &RelocationSettings,
    paths: &PathSettings,
) -> Vec<PartitionTask> {
    let region = padded_box(relocation.lat_range, relocation.lon_range, [0.0, 0.0]);

    grid_cells(&region, relocation.num_grids)
        .into_iter()
        .map(|((col, row), cell)| {
            let id = PartitionId { col, row };
            let padded = pad_box(&cell, relocation.xy_pad);
            let members = events
                .iter()
                .filter(|e| is_within_bounding_box(e.latitude, e.longitude, &padded))
                .map(|e| e.event_id.clone())
                .collect();
            let owned = events
                .iter()
                .filter(|e| {
                    let owner = owner_of(e.latitude, e.longitude, &region, relocation.num_grids);
                    owner == Some((col, row))
                })
                .map(|e| e.event_id.clone())
                .collect();

            PartitionTask {
                id,
                cell,
                members,
                owned,
                paths: partition_paths(paths, id),
            }
        })
        .collect()
}

fn write_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<fs::File>) -> std::io::Result<()>,
) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| LinkError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| LinkError::io(path, e))
}

/// Write the solver inputs of one partition; returns the number of pairs written
pub fn prepare_inputs(task: &PartitionTask, shared: &SharedInputs) -> Result<usize> {
    let members: HashSet<&str> = task.members.iter().map(String::as_str).collect();

    let mut skipped_ids = 0usize;
    write_file(&task.paths.event_file, |w| {
        for event in shared.events.iter().filter(|e| members.contains(e.event_id.as_str())) {
            match format_event_dat_line(event, shared.dep_corr) {
                Some(line) => writeln!(w, "{}", line)?,
                None => skipped_ids += 1,
            }
        }
        Ok(())
    })?;
    if skipped_ids > 0 {
        tracing::warn!(
            "grid {}: {} events with non-numeric ids left out of event file",
            task.id,
            skipped_ids
        );
    }

    let pairs: Vec<DtPair> = shared
        .pairs
        .iter()
        .filter(|p| {
            members.contains(p.header.observed_id.as_str())
                && members.contains(p.header.reference_id.as_str())
        })
        .cloned()
        .collect();
    write_file(&task.paths.dt_file, |w| write_pairs(w, &pairs))?;

    let control = render_control_file(&shared.control_template, &task.paths);
    fs::write(&task.paths.control_file, control)
        .map_err(|e| LinkError::io(&task.paths.control_file, e))?;

    Ok(pairs.len())
}

/// Delete a file left by an earlier run; a missing file is fine
pub(crate) fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(LinkError::io(path, e)),
        _ => Ok(()),
    }
}

/// Prepare, relocate, and format one partition
///
/// Outputs of an earlier run are removed first, so a partition that fails or
/// skips the solver leaves nothing behind for the merge.
pub fn run_partition(
    task: &PartitionTask,
    shared: &SharedInputs,
    solver: &dyn RelocationSolver,
) -> Result<PartitionOutcome> {
    for path in [&task.paths.ctlg, &task.paths.pha, &task.paths.pha_full] {
        remove_stale(path)?;
    }

    let pairs = prepare_inputs(task, shared)?;
    if pairs == 0 {
        tracing::info!("grid {}: no linked pairs, solver skipped", task.id);
        return Ok(PartitionOutcome {
            partition: task.id,
            members: task.members.len(),
            pairs,
            relocated: 0,
            failure: None,
        });
    }
    let reloc_path = solver.relocate(task)?;

    let text = fs::read_to_string(&reloc_path).map_err(|e| LinkError::io(&reloc_path, e))?;
    let owned: HashSet<&str> = task.owned.iter().map(String::as_str).collect();
    let relocated: Vec<_> = parse_reloc(&text)
        .into_iter()
        .filter(|r| owned.contains(r.event_id.as_str()))
        .collect();
    let merged = merge_relocated(&shared.events, &relocated, shared.dep_corr);

    write_file(&task.paths.ctlg, |w| {
        for event in &merged {
            writeln!(w, "{}", format_merged_header(event, false))?;
        }
        Ok(())
    })?;
    write_file(&task.paths.pha, |w| {
        for event in &merged {
            writeln!(w, "{}", format_merged_header(event, false))?;
            for line in &event.phase_lines {
                writeln!(w, "{}", line)?;
            }
        }
        Ok(())
    })?;
    write_file(&task.paths.pha_full, |w| {
        for event in &merged {
            writeln!(w, "{}", format_merged_header(event, true))?;
            for line in &event.phase_lines {
                writeln!(w, "{}", line)?;
            }
        }
        Ok(())
    })?;

    tracing::info!(
        "grid {}: relocated {} of {} owned events",
        task.id,
        merged.len(),
        task.owned.len()
    );

    Ok(PartitionOutcome {
        partition: task.id,
        members: task.members.len(),
        pairs,
        relocated: merged.len(),
        failure: None,
    })
}

/// Bounded pool running one blocking task per partition
pub struct PartitionPool {
    solver: Arc<dyn RelocationSolver>,
    workers: usize,
}

impl PartitionPool {
    pub fn new(solver: Arc<dyn RelocationSolver>, workers: usize) -> Self {
        Self {
            solver,
            workers: workers.max(1),
        }
    }

    /// Run every task; a failed partition yields an outcome with zero events
    pub async fn run(
        &self,
        tasks: Vec<PartitionTask>,
        shared: Arc<SharedInputs>,
    ) -> BTreeMap<PartitionId, PartitionOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();

        tracing::info!("Running {} partitions on {} workers", tasks.len(), self.workers);

        for task in tasks {
            let semaphore = semaphore.clone();
            let solver = self.solver.clone();
            let shared = shared.clone();

            set.spawn(async move {
                let (id, members) = (task.id, task.members.len());
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return PartitionOutcome::failed(id, members, e.to_string()),
                };

                let joined = tokio::task::spawn_blocking(move || {
                    run_partition(&task, &shared, solver.as_ref())
                })
                .await;

                match joined {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        tracing::warn!("grid {} contributes no events: {}", id, e);
                        PartitionOutcome::failed(id, members, e.to_string())
                    }
                    Err(e) => {
                        tracing::warn!("grid {} task aborted: {}", id, e);
                        PartitionOutcome::failed(id, members, e.to_string())
                    }
                }
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.partition, outcome);
                }
                Err(e) => tracing::error!("partition task lost: {}", e),
            }
        }
        outcomes
    }
}

/// Concatenate per-partition files in partition order, skipping missing ones
///
/// Returns the number of files that were found.
pub fn concat_files(sources: &[PathBuf], target: &Path) -> Result<usize> {
    let mut found = 0usize;
    write_file(target, |w| {
        for source in sources {
            match fs::read(source) {
                Ok(bytes) => {
                    w.write_all(&bytes)?;
                    found += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("no output at {}", source.display());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    })?;

    if found < sources.len() {
        tracing::warn!(
            "{}: {} of {} partition files missing",
            target.display(),
            sources.len() - found,
            sources.len()
        );
    }
    Ok(found)
}

/// Merge partition outputs into the final catalog and phase files
pub fn merge_outputs(tasks: &[PartitionTask], merged: &MergedPaths) -> Result<()> {
    let mut ordered: Vec<&PartitionTask> = tasks.iter().collect();
    ordered.sort_by_key(|t| t.id);

    let ctlg: Vec<PathBuf> = ordered.iter().map(|t| t.paths.ctlg.clone()).collect();
    let pha: Vec<PathBuf> = ordered.iter().map(|t| t.paths.pha.clone()).collect();
    let pha_full: Vec<PathBuf> = ordered.iter().map(|t| t.paths.pha_full.clone()).collect();

    concat_files(&ctlg, &merged.ctlg)?;
    concat_files(&pha, &merged.pha)?;
    concat_files(&pha_full, &merged.pha_full)?;
    Ok(())
}

/// Remove per-partition inputs and outputs
pub fn remove_partition_files(tasks: &[PartitionTask]) {
    for task in tasks {
        let p = &task.paths;
        let files = [
            &p.event_file,
            &p.dt_file,
            &p.control_file,
            &p.reloc_file,
            &p.ctlg,
            &p.pha,
            &p.pha_full,
        ];
        for path in files {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("cannot remove {}: {}", path.display(), e);
                }
            }
        }
    }
}
