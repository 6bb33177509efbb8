use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::Settings;
use crate::core::restrict_to_box;
use crate::error::{LinkError, Result};
use crate::formats::{parse_catalog, write_catalog};

use super::{ensure_parent, read_text};

/// Build the working catalog: the full catalog restricted to the padded study box
///
/// Returns the number of events written.
pub fn mk_pha(settings: &Settings) -> Result<usize> {
    let paths = &settings.paths;
    let bounds = settings.relocation.bounds()?;

    tracing::info!("reading catalog {}", paths.catalog_file.display());
    let text = read_text(&paths.catalog_file)?;
    let catalog = parse_catalog(&text, paths.catalog_ids)?;
    let subset = restrict_to_box(&catalog, &bounds);

    let target = &paths.working_catalog;
    ensure_parent(target)?;
    let file = File::create(target).map_err(|e| LinkError::io(target, e))?;
    let mut writer = BufWriter::new(file);
    let written = write_catalog(&mut writer, subset.iter())
        .and_then(|n| writer.flush().map(|_| n))
        .map_err(|e| LinkError::io(target, e))?;

    tracing::info!("wrote {} events to {}", written, target.display());
    Ok(written)
}
