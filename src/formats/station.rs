use crate::error::LinkError;
use crate::models::{GainPeriod, GainSpec, Station, StationIndex};

use super::parse_timestamp;

/// Parse a station file into an index keyed by station code
///
/// Lines are `net.sta,lat,lon[,ele[,gain...]]`. The gain layout is resolved by
/// the number of fields after the elevation: 1 uniform, 3 per channel, 5 per
/// channel with a validity window. Repeated lines of the last kind extend the
/// station's gain history. Unrecognised lines are dropped.
pub fn parse_stations(text: &str) -> StationIndex {
    let mut stations = StationIndex::new();
    let mut malformed = 0usize;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let station = match parse_station_line(line) {
            Ok(station) => station,
            Err(reason) => {
                tracing::warn!("{}", LinkError::malformed(line_no + 1, reason));
                malformed += 1;
                continue;
            }
        };

        match stations.get_mut(&station.code) {
            Some(existing) => match (&mut existing.gain, station.gain) {
                (Some(GainSpec::TimeVarying(history)), Some(GainSpec::TimeVarying(more))) => {
                    history.extend(more);
                }
                _ => {
                    tracing::warn!(
                        "Duplicate station {} at line {}, keeping first",
                        station.code,
                        line_no + 1
                    );
                }
            },
            None => {
                stations.insert(station.code.clone(), station);
            }
        }
    }

    if malformed > 0 {
        tracing::warn!("Station file: dropped {} malformed lines", malformed);
    }
    tracing::info!("Stations parsed: {}", stations.len());

    stations
}

fn number(code: &str) -> Result<f64, String> {
    code.parse::<f64>().map_err(|_| format!("bad number '{}'", code))
}

fn parse_station_line(line: &str) -> Result<Station, String> {
    let codes: Vec<&str> = line.split(',').map(str::trim).collect();
    if codes.len() < 3 || codes[0].is_empty() {
        return Err(format!("station line has {} fields, expected at least 3", codes.len()));
    }

    let elevation_km = codes.get(3).map(|c| number(c)).transpose()?;
    let gain = match codes.get(4..).unwrap_or_default() {
        [] => None,
        [g] => Some(GainSpec::Uniform(number(g)?)),
        [e, n, z] => Some(GainSpec::PerChannel(number(e)?, number(n)?, number(z)?)),
        [e, n, z, start, end] => Some(GainSpec::TimeVarying(vec![GainPeriod {
            gains: (number(e)?, number(n)?, number(z)?),
            start: parse_timestamp(start).ok_or_else(|| format!("bad time '{}'", start))?,
            end: parse_timestamp(end).ok_or_else(|| format!("bad time '{}'", end))?,
        }])),
        other => return Err(format!("{} gain fields, expected 1, 3 or 5", other.len())),
    };

    Ok(Station {
        code: codes[0].to_string(),
        latitude: number(codes[1])?,
        longitude: number(codes[2])?,
        elevation_km,
        gain,
    })
}
