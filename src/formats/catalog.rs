use chrono::{DateTime, Utc};
use std::io::Write;

use crate::error::{LinkError, Result};
use crate::models::{EventIndex, EventRecord, IdSource, MergedEvent, PhaseLine};

use super::{format_timestamp, parse_timestamp};

/// A header's first field is longer than this; station codes are not
pub const HEADER_DISCRIMINATOR_LEN: usize = 10;

#[inline]
fn is_header(first_field: &str) -> bool {
    first_field.trim().len() > HEADER_DISCRIMINATOR_LEN
}

enum ParseState {
    /// No header seen yet
    Start,
    /// Phase lines go to this event
    Open(EventRecord),
    /// Current header was dropped; its phase lines are dropped too
    Skipping,
}

/// Parse a comma-separated catalog into an event index
///
/// Header lines are `origin_time,lat,lon,depth,mag[,event_id]`, phase lines
/// `station,arrival_1,arrival_2[,...]`. Malformed headers are dropped along
/// with their phases. Fails only if a phase line precedes every header.
pub fn parse_catalog(text: &str, id_source: IdSource) -> Result<EventIndex> {
    let mut index = EventIndex::new();
    let mut state = ParseState::Start;
    let mut next_seq = 0usize;
    let (mut malformed, mut duplicates) = (0usize, 0usize);

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let codes: Vec<&str> = line.split(',').map(str::trim).collect();

        if is_header(codes[0]) {
            let seq = next_seq;
            next_seq += 1;

            if let ParseState::Open(event) = std::mem::replace(&mut state, ParseState::Skipping) {
                if !index.insert(event) {
                    duplicates += 1;
                }
            }

            match parse_header(&codes, id_source, seq) {
                Ok(event) if index.contains(&event.event_id) => {
                    tracing::warn!(
                        "Duplicate event id {} at line {}, keeping first",
                        event.event_id,
                        line_no + 1
                    );
                    duplicates += 1;
                }
                Ok(event) => state = ParseState::Open(event),
                Err(reason) => {
                    tracing::warn!("{}", LinkError::malformed(line_no + 1, reason));
                    malformed += 1;
                }
            }
            continue;
        }

        match &mut state {
            ParseState::Start => {
                return Err(LinkError::malformed(line_no + 1, "phase line before any event header"));
            }
            ParseState::Open(event) => event.phases.push(parse_phase(&codes, line)),
            ParseState::Skipping => {}
        }
    }

    if let ParseState::Open(event) = state {
        if !index.insert(event) {
            duplicates += 1;
        }
    }

    if malformed > 0 || duplicates > 0 {
        tracing::warn!(
            "Catalog: dropped {} malformed and {} duplicate events",
            malformed,
            duplicates
        );
    }
    tracing::info!("Catalog parsed: {} events", index.len());

    Ok(index)
}

fn parse_header(
    codes: &[&str],
    id_source: IdSource,
    seq: usize,
) -> std::result::Result<EventRecord, String> {
    if codes.len() < 5 {
        return Err(format!("event header has {} fields, expected at least 5", codes.len()));
    }

    let origin_time =
        parse_timestamp(codes[0]).ok_or_else(|| format!("bad origin time '{}'", codes[0]))?;
    let mut values = [0.0f64; 4];
    for (value, code) in values.iter_mut().zip(&codes[1..5]) {
        *value = code.parse().map_err(|_| format!("bad number '{}'", code))?;
    }

    let event_id = match id_source {
        IdSource::Sequential => seq.to_string(),
        IdSource::Explicit => match codes.last() {
            Some(id) if codes.len() > 5 && !id.is_empty() => id.to_string(),
            _ => return Err("event header has no id field".to_string()),
        },
    };

    Ok(EventRecord {
        event_id,
        origin_time,
        latitude: values[0],
        longitude: values[1],
        depth_km: values[2],
        magnitude: values[3],
        phases: Vec::new(),
    })
}

fn parse_phase(codes: &[&str], raw: &str) -> PhaseLine {
    PhaseLine {
        station: codes[0].to_string(),
        p_arrival: codes.get(1).and_then(|c| parse_timestamp(c)),
        s_arrival: codes.get(2).and_then(|c| parse_timestamp(c)),
        raw: raw.trim_end().to_string(),
    }
}

/// `origin_time,lat,lon,depth,mag[,event_id]`
pub fn format_event_header(event: &EventRecord, with_id: bool) -> String {
    header_line(
        &event.origin_time,
        [event.latitude, event.longitude, event.depth_km, event.magnitude],
        with_id.then_some(event.event_id.as_str()),
    )
}

/// Header line for a relocated event, same layout as the input catalog
pub fn format_merged_header(event: &MergedEvent, with_id: bool) -> String {
    header_line(
        &event.origin_time,
        [event.latitude, event.longitude, event.depth_km, event.magnitude],
        with_id.then_some(event.event_id.as_str()),
    )
}

fn header_line(origin_time: &DateTime<Utc>, values: [f64; 4], event_id: Option<&str>) -> String {
    let [lat, lon, dep, mag] = values;
    let mut line = format!("{},{},{},{},{}", format_timestamp(origin_time), lat, lon, dep, mag);
    if let Some(id) = event_id {
        line.push(',');
        line.push_str(id);
    }
    line
}

/// Write events with explicit ids, each followed by its phase lines verbatim
pub fn write_catalog<'a, W, I>(writer: &mut W, events: I) -> std::io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut count = 0;
    for event in events {
        writeln!(writer, "{}", format_event_header(event, true))?;
        for phase in &event.phases {
            writeln!(writer, "{}", phase.raw)?;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
2019-07-04T17:33:49.000000Z,35.705,-117.504,10.5,6.4,38443183
CI.CLC,2019-07-04T17:33:52.10Z,2019-07-04T17:33:54.60Z
CI.SLA,2019-07-04T17:33:55.30Z,-1
2019-07-04T17:35:10.500000Z,35.71,-117.51,8.2,2.1,38443207
CI.CLC,2019-07-04T17:35:13.00Z,2019-07-04T17:35:15.40Z
";

    #[test]
    fn test_parse_explicit_ids() {
        let index = parse_catalog(CATALOG, IdSource::Explicit).unwrap();

        assert_eq!(index.len(), 2);
        let event = index.get("38443183").unwrap();
        assert_eq!(event.latitude, 35.705);
        assert_eq!(event.depth_km, 10.5);
        assert_eq!(event.magnitude, 6.4);
        assert_eq!(event.phases.len(), 2);
        assert_eq!(event.phases[0].station, "CI.CLC");
        assert!(event.phases[0].s_arrival.is_some());
        assert!(event.phases[1].s_arrival.is_none());
        assert_eq!(event.phases[1].raw, "CI.SLA,2019-07-04T17:33:55.30Z,-1");
    }

    #[test]
    fn test_parse_sequential_ids() {
        let index = parse_catalog(CATALOG, IdSource::Sequential).unwrap();

        let ids: Vec<&str> = index.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
        assert_eq!(index.get("1").unwrap().phases.len(), 1);
    }

    #[test]
    fn test_phase_before_header_fails() {
        let text = "CI.CLC,2019-07-04T17:33:52.10Z,-1\n";
        let err = parse_catalog(text, IdSource::Sequential).unwrap_err();
        assert!(matches!(err, LinkError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_malformed_header_drops_its_phases() {
        let text = "\
2019-07-04T17:33:49.000000Z,not-a-lat,-117.504,10.5,6.4
CI.CLC,2019-07-04T17:33:52.10Z,-1
2019-07-04T17:35:10.500000Z,35.710,-117.510,8.2,2.1
CI.SLA,2019-07-04T17:35:13.00Z,-1
";
        let index = parse_catalog(text, IdSource::Sequential).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.get("0").is_none());
        let event = index.get("1").unwrap();
        assert_eq!(event.phases.len(), 1);
        assert_eq!(event.phases[0].station, "CI.SLA");
    }

    #[test]
    fn test_duplicate_id_keeps_first_event() {
        let text = "\
2019-07-04T17:33:49.000000Z,35.705,-117.504,10.5,6.4,38443183
CI.CLC,2019-07-04T17:33:52.10Z,-1
2019-07-04T17:40:00.000000Z,35.9,-117.7,3.0,1.2,38443183
CI.SLA,2019-07-04T17:40:03.00Z,-1
CI.WRC2,2019-07-04T17:40:04.00Z,-1
2019-07-04T17:45:00.000000Z,35.71,-117.51,8.2,2.1,38443207
CI.CCC,2019-07-04T17:45:02.00Z,-1
";
        let index = parse_catalog(text, IdSource::Explicit).unwrap();

        assert_eq!(index.len(), 2);
        let event = index.get("38443183").unwrap();
        assert_eq!(event.latitude, 35.705);
        assert_eq!(event.phases.len(), 1);
        assert_eq!(event.phases[0].station, "CI.CLC");

        let next = index.get("38443207").unwrap();
        assert_eq!(next.phases.len(), 1);
        assert_eq!(next.phases[0].station, "CI.CCC");
    }

    #[test]
    fn test_ten_character_first_field_is_a_phase() {
        let text = "\
2019-07-04T17:33:49.000000Z,35.705,-117.504,10.5,6.4
CI.ABCDEFG,2019-07-04T17:33:52.10Z,-1
";
        let index = parse_catalog(text, IdSource::Sequential).unwrap();

        assert_eq!(index.len(), 1);
        let event = index.get("0").unwrap();
        assert_eq!(event.phases.len(), 1);
        assert_eq!(event.phases[0].station, "CI.ABCDEFG");

        // a bare date is still too short for a header
        let err = parse_catalog("2019-07-04,35.705,-117.504,10.5,6.4\n", IdSource::Sequential)
            .unwrap_err();
        assert!(matches!(err, LinkError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_explicit_ids_require_id_field() {
        let text = "2019-07-04T17:33:49.000000Z,35.705,-117.504,10.5,6.4\n";
        let index = parse_catalog(text, IdSource::Explicit).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_write_catalog_roundtrips_phase_lines() {
        let index = parse_catalog(CATALOG, IdSource::Explicit).unwrap();
        let mut out = Vec::new();
        let written = write_catalog(&mut out, index.iter()).unwrap();

        assert_eq!(written, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, CATALOG);
    }
}
