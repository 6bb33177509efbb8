use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::Settings;
use crate::core::PairLinker;
use crate::error::{LinkError, Result};
use crate::formats::{parse_catalog, parse_stations, write_pairs};
use crate::models::{IdSource, LinkStats};

use super::{ensure_parent, read_text};

/// Per-invocation overrides for `select-dt`
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Name of the `[linkage.<profile>]` bundle
    pub profile: String,
    /// Replaces `paths.dt_input`
    pub input: Option<PathBuf>,
    /// Replaces `paths.dt_output`
    pub output: Option<PathBuf>,
}

/// Select differential-time pairs against the working catalog
pub fn select_dt(settings: &Settings, options: &SelectOptions) -> Result<LinkStats> {
    let paths = &settings.paths;
    let thresholds = settings.thresholds(&options.profile)?.clone();
    let input = options.input.as_ref().unwrap_or(&paths.dt_input);
    let output = options.output.as_ref().unwrap_or(&paths.dt_output);

    // mk-pha always writes explicit ids
    let events = parse_catalog(&read_text(&paths.working_catalog)?, IdSource::Explicit)?;
    let stations = parse_stations(&read_text(&paths.station_file)?);
    tracing::info!(
        "selecting with profile '{}': {} events, {} stations",
        options.profile,
        events.len(),
        stations.len()
    );

    let text = read_text(input)?;
    let linker = PairLinker::new(&events, &stations, thresholds);
    let result = linker.select_text(&text);

    ensure_parent(output)?;
    let file = File::create(output).map_err(|e| LinkError::io(output, e))?;
    let mut writer = BufWriter::new(file);
    write_pairs(&mut writer, &result.pairs)
        .and_then(|_| writer.flush())
        .map_err(|e| LinkError::io(output, e))?;

    tracing::info!("wrote {} pairs to {}", result.pairs.len(), output.display());
    Ok(result.stats)
}
