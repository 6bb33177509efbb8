use chrono::{Datelike, Timelike};

use crate::models::{EventRecord, PartitionPaths};

/// One `event.dat` row: date, hhmmsscc, lat, lon, depth, mag, eh, ez, rms, id
///
/// `depth_offset` is added to the catalog depth. Returns `None` for ids the
/// solver cannot read (it expects integers).
pub fn format_event_dat_line(event: &EventRecord, depth_offset: f64) -> Option<String> {
    let id: u64 = event.event_id.parse().ok()?;
    let t = &event.origin_time;
    let centis = t.nanosecond().min(999_999_999) / 10_000_000;

    Some(format!(
        "{:04}{:02}{:02}  {:02}{:02}{:02}{:02}   {:8.4}   {:9.4}   {:7.3}  {:5.2}  {:6.2}  {:6.2}  {:5.2}  {:>9}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        centis,
        event.latitude,
        event.longitude,
        event.depth_km + depth_offset,
        event.magnitude,
        0.0,
        0.0,
        0.0,
        id
    ))
}

/// Rewrite a hypoDD control file so its input and output paths point at one partition
///
/// Lines naming `dt.cc`, `event.dat` or `hypoDD.reloc` are replaced by the
/// partition's files; everything else is copied as is. The `dt.ct` line keeps
/// the template's catalog file, which has its own layout and is not split per
/// partition.
pub fn render_control_file(template: &str, paths: &PartitionPaths) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    for line in template.lines() {
        let replacement = if line.contains("dt.cc") {
            Some(&paths.dt_file)
        } else if line.contains("event.dat") {
            Some(&paths.event_file)
        } else if line.contains("hypoDD.reloc") {
            Some(&paths.reloc_file)
        } else {
            None
        };

        match replacement {
            Some(path) => out.push_str(&path.display().to_string()),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
