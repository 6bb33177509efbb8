use chrono::{DateTime, NaiveDate, Utc};

use crate::models::RelocatedEvent;

/// Column of the year field; year..seconds occupy six columns from here
const TIME_COLUMN: usize = 10;

/// The solver can round seconds up to a full minute; clamp to the last millisecond
pub fn normalize_seconds(sec: &str) -> &str {
    if sec == "60.000" {
        "59.999"
    } else {
        sec
    }
}

/// Build a UTC timestamp from the solver's split date-time columns
pub fn parse_split_time(fields: [&str; 6]) -> Option<DateTime<Utc>> {
    let [year, month, day, hour, minute, sec] = fields;
    let sec: f64 = normalize_seconds(sec).parse().ok()?;
    if !(0.0..60.0).contains(&sec) {
        return None;
    }
    let whole = sec.trunc();
    let micros = (((sec - whole) * 1e6).round() as u32).min(999_999);

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?
        .and_hms_micro_opt(hour.parse().ok()?, minute.parse().ok()?, whole as u32, micros)
        .map(|naive| naive.and_utc())
}

/// Parse one row of `hypoDD.reloc`
///
/// Columns: id lat lon depth x y z ex ey ez yr mo dy hr mi sc [mag ...]
pub fn parse_reloc_line(line: &str) -> Result<RelocatedEvent, String> {
    let codes: Vec<&str> = line.split_whitespace().collect();
    if codes.len() < TIME_COLUMN + 6 {
        return Err(format!("reloc row has {} columns, expected at least 16", codes.len()));
    }

    let number = |i: usize| -> Result<f64, String> {
        codes[i].parse::<f64>().map_err(|_| format!("bad number '{}' in column {}", codes[i], i))
    };

    let mut time_fields = [""; 6];
    time_fields.copy_from_slice(&codes[TIME_COLUMN..TIME_COLUMN + 6]);
    let origin_time = parse_split_time(time_fields)
        .ok_or_else(|| format!("bad origin time '{}'", time_fields.join(" ")))?;

    Ok(RelocatedEvent {
        event_id: codes[0].to_string(),
        latitude: number(1)?,
        longitude: number(2)?,
        depth_km: number(3)?,
        origin_time,
    })
}

/// Parse solver output, skipping rows that do not parse
pub fn parse_reloc(text: &str) -> Vec<RelocatedEvent> {
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match parse_reloc_line(line) {
            Ok(event) => events.push(event),
            Err(reason) => {
                tracing::debug!("Skipping reloc row: {}", reason);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} unreadable reloc rows", skipped);
    }
    events
}
