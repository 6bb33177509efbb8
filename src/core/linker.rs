use std::collections::{HashMap, HashSet};

use crate::core::filters::{admit_line, admit_pair, LineRejection, PairRejection};
use crate::error::LinkError;
use crate::formats::dtcc::{group_pairs, parse_data_line, parse_header, RawPair};
use crate::models::{DtLine, DtPair, EventIndex, LinkStats, LinkThresholds, StationIndex};

/// Input lines between progress reports
const PROGRESS_INTERVAL: usize = 1_000_000;

/// Result of a selection pass
#[derive(Debug)]
pub struct LinkResult {
    pub pairs: Vec<DtPair>,
    pub stats: LinkStats,
}

/// Selects differential-time pairs worth passing to the relocation solver
///
/// # Pipeline Stages
/// 1. Group lines by pair header
/// 2. Look up both events; drop the pair if either is unknown
/// 3. Coarse admission on event separation
/// 4. Fine admission per observation (aperture, correlation, dt bound)
/// 5. Station cap and minimum distinct-station count
/// 6. Neighbour cap per observed event
///
/// Output keeps input order, so identical input gives identical output.
#[derive(Debug, Clone)]
pub struct PairLinker<'a> {
    events: &'a EventIndex,
    stations: &'a StationIndex,
    thresholds: LinkThresholds,
}

impl<'a> PairLinker<'a> {
    pub fn new(
        events: &'a EventIndex,
        stations: &'a StationIndex,
        thresholds: LinkThresholds,
    ) -> Self {
        Self {
            events,
            stations,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &LinkThresholds {
        &self.thresholds
    }

    /// Run selection over a line stream
    pub fn select<'b, I>(&self, lines: I) -> LinkResult
    where
        I: IntoIterator<Item = &'b str>,
    {
        let mut stats = LinkStats::default();
        let mut pairs = Vec::new();
        let mut neighbors: HashMap<String, usize> = HashMap::new();
        let mut next_report = PROGRESS_INTERVAL;

        let mut groups = group_pairs(lines);
        while let Some(raw) = groups.next() {
            stats.pairs_read += 1;
            stats.obs_read += raw.body.len();

            if let Some(pair) = self.link_pair(&raw, &mut stats) {
                if self.neighbor_capped(&pair, &mut neighbors) {
                    stats.pairs_neighbor_capped += 1;
                } else {
                    stats.pairs_kept += 1;
                    stats.obs_kept += pair.lines.len();
                    pairs.push(pair);
                }
            }

            if groups.lines_read() >= next_report {
                tracing::info!(
                    "done {} lines | {} pairs selected",
                    groups.lines_read(),
                    pairs.len()
                );
                next_report += PROGRESS_INTERVAL;
            }
        }

        stats.lines_read = groups.lines_read();
        stats.orphan_lines = groups.orphans();

        tracing::info!(
            "Selected {} of {} pairs ({} of {} observations)",
            stats.pairs_kept,
            stats.pairs_read,
            stats.obs_kept,
            stats.obs_read
        );
        tracing::info!(
            "Dropped pairs: {} malformed, {} unknown event, {} location, {} depth, {} too few stations, {} neighbour cap",
            stats.pairs_malformed,
            stats.pairs_missing_event,
            stats.pairs_location_rejected,
            stats.pairs_depth_rejected,
            stats.pairs_too_few_stations,
            stats.pairs_neighbor_capped
        );
        tracing::info!(
            "Dropped observations: {} malformed, {} unknown station, {} distance, {} cc, {} dt, {} station cap; {} orphan lines",
            stats.obs_malformed,
            stats.obs_missing_station,
            stats.obs_distance_rejected,
            stats.obs_cc_rejected,
            stats.obs_dt_rejected,
            stats.obs_station_capped,
            stats.orphan_lines
        );

        LinkResult { pairs, stats }
    }

    /// Convenience wrapper over a whole file's text
    pub fn select_text(&self, text: &str) -> LinkResult {
        self.select(text.lines())
    }

    fn link_pair(&self, raw: &RawPair<'_>, stats: &mut LinkStats) -> Option<DtPair> {
        let header = match parse_header(raw.header) {
            Ok(header) => header,
            Err(reason) => {
                tracing::debug!("Dropping pair: {}", reason);
                stats.pairs_malformed += 1;
                return None;
            }
        };

        let (observed, reference) = match (
            self.events.get(&header.observed_id),
            self.events.get(&header.reference_id),
        ) {
            (Some(observed), Some(reference)) => (observed, reference),
            (observed, _) => {
                let id = if observed.is_none() {
                    &header.observed_id
                } else {
                    &header.reference_id
                };
                let err = LinkError::MissingReference {
                    kind: "event",
                    id: id.clone(),
                };
                tracing::debug!("Dropping pair: {}", err);
                stats.pairs_missing_event += 1;
                return None;
            }
        };

        match admit_pair(observed, reference, &self.thresholds) {
            Ok(_) => {}
            Err(PairRejection::Location) => {
                stats.pairs_location_rejected += 1;
                return None;
            }
            Err(PairRejection::Depth) => {
                stats.pairs_depth_rejected += 1;
                return None;
            }
        }

        let mut lines: Vec<DtLine> = Vec::with_capacity(raw.body.len());
        for text in &raw.body {
            let line = match parse_data_line(text) {
                Ok(line) => line,
                Err(reason) => {
                    tracing::debug!("Dropping observation in {}: {}", header.raw, reason);
                    stats.obs_malformed += 1;
                    continue;
                }
            };
            let Some(station) = self.stations.get(&line.station) else {
                tracing::debug!(
                    "Dropping observation: {}",
                    LinkError::MissingReference { kind: "station", id: line.station.clone() }
                );
                stats.obs_missing_station += 1;
                continue;
            };

            match admit_line(&line, station, observed, reference, &self.thresholds) {
                Ok(()) => lines.push(line),
                Err(LineRejection::Distance) => stats.obs_distance_rejected += 1,
                Err(LineRejection::Correlation) => stats.obs_cc_rejected += 1,
                Err(LineRejection::TimeDifference) => stats.obs_dt_rejected += 1,
            }
        }

        if let Some(max_sta) = self.thresholds.max_sta {
            stats.obs_station_capped += cap_stations(&mut lines, max_sta);
        }

        let pair = DtPair { header, lines };
        if pair.station_count() < self.thresholds.min_sta {
            stats.pairs_too_few_stations += 1;
            return None;
        }

        Some(pair)
    }

    fn neighbor_capped(&self, pair: &DtPair, neighbors: &mut HashMap<String, usize>) -> bool {
        let Some(max_nbr) = self.thresholds.max_nbr else {
            return false;
        };
        let count = neighbors.entry(pair.header.observed_id.clone()).or_insert(0);
        if *count >= max_nbr {
            return true;
        }
        *count += 1;
        false
    }
}

/// Keep only lines from the first `max_sta` distinct stations; returns how many were removed
fn cap_stations(lines: &mut Vec<DtLine>, max_sta: usize) -> usize {
    let before = lines.len();
    let mut kept: HashSet<String> = HashSet::new();
    lines.retain(|line| {
        if kept.contains(&line.station) {
            return true;
        }
        if kept.len() < max_sta {
            kept.insert(line.station.clone());
            return true;
        }
        false
    });
    before - lines.len()
}
