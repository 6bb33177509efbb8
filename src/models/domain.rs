use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Catalog event with hypocenter and its phase picks
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event_id: String,
    pub origin_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    /// Phase picks in file order
    pub phases: Vec<PhaseLine>,
}

/// One station line of a catalog event
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseLine {
    pub station: String,
    pub p_arrival: Option<DateTime<Utc>>,
    pub s_arrival: Option<DateTime<Utc>>,
    /// Line as read, without the trailing newline
    pub raw: String,
}

/// How catalog event identifiers are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    /// Trailing header field carries the id
    Explicit,
    /// Zero-based header count
    Sequential,
}

/// Events keyed by id, iterable in file order
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    events: Vec<EventRecord>,
    by_id: HashMap<String, usize>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event; returns false (and keeps the existing one) on a duplicate id
    pub fn insert(&mut self, event: EventRecord) -> bool {
        if self.by_id.contains_key(&event.event_id) {
            return false;
        }
        self.by_id.insert(event.event_id.clone(), self.events.len());
        self.events.push(event);
        true
    }

    pub fn get(&self, event_id: &str) -> Option<&EventRecord> {
        self.by_id.get(event_id).map(|&i| &self.events[i])
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.by_id.contains_key(event_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<EventRecord> for EventIndex {
    fn from_iter<T: IntoIterator<Item = EventRecord>>(iter: T) -> Self {
        let mut index = EventIndex::new();
        for event in iter {
            index.insert(event);
        }
        index
    }
}

/// Station gain, resolved by the number of trailing fields on the station line
#[derive(Debug, Clone, PartialEq)]
pub enum GainSpec {
    Uniform(f64),
    PerChannel(f64, f64, f64),
    TimeVarying(Vec<GainPeriod>),
}

/// Per-channel gain valid over `[start, end]`
#[derive(Debug, Clone, PartialEq)]
pub struct GainPeriod {
    pub gains: (f64, f64, f64),
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_km: Option<f64>,
    pub gain: Option<GainSpec>,
}

pub type StationIndex = HashMap<String, Station>;

/// Phase type of a differential-time observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseTag {
    P,
    S,
}

impl FromStr for PhaseTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P" => Ok(PhaseTag::P),
            "S" => Ok(PhaseTag::S),
            other => Err(format!("unknown phase tag '{}'", other)),
        }
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseTag::P => write!(f, "P"),
            PhaseTag::S => write!(f, "S"),
        }
    }
}

/// Header of a differential-time pair (`# observed reference [otc]`)
#[derive(Debug, Clone, PartialEq)]
pub struct DtHeader {
    pub observed_id: String,
    pub reference_id: String,
    pub raw: String,
}

/// Station observation within a differential-time pair
#[derive(Debug, Clone, PartialEq)]
pub struct DtLine {
    pub station: String,
    pub dt: f64,
    pub weight: f64,
    pub phase: PhaseTag,
    pub raw: String,
}

impl DtLine {
    /// Correlation proxy derived from the weight
    #[inline]
    pub fn cc(&self) -> f64 {
        self.weight * self.weight
    }
}

/// A header with the observations that survived selection
#[derive(Debug, Clone, PartialEq)]
pub struct DtPair {
    pub header: DtHeader,
    pub lines: Vec<DtLine>,
}

impl DtPair {
    /// Number of distinct stations among the lines
    pub fn station_count(&self) -> usize {
        let mut seen: Vec<&str> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !seen.contains(&line.station.as_str()) {
                seen.push(&line.station);
            }
        }
        seen.len()
    }
}

/// Threshold bundle for one linkage pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LinkThresholds {
    /// Minimum weight^2
    #[validate(range(min = 0.0, max = 1.0))]
    pub cc: f64,
    /// Maximum epicentral separation of the two events (exclusive)
    #[validate(range(min = 0.0))]
    pub loc_dev_km: f64,
    /// Maximum depth separation of the two events (exclusive)
    #[validate(range(min = 0.0))]
    pub dep_dev_km: f64,
    /// Maximum station distance, measured from the closer event
    #[validate(range(min = 0.0))]
    pub dist_km: f64,
    #[validate(range(min = 0.0))]
    pub dt_p: f64,
    #[validate(range(min = 0.0))]
    pub dt_s: f64,
    #[validate(range(min = 1))]
    pub min_sta: usize,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_sta: Option<usize>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_nbr: Option<usize>,
}

impl LinkThresholds {
    #[inline]
    pub fn dt_bound(&self, phase: PhaseTag) -> f64 {
        match phase {
            PhaseTag::P => self.dt_p,
            PhaseTag::S => self.dt_s,
        }
    }
}

/// Inclusive origin-time interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[inline]
    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start && *t <= self.end
    }
}

/// Time window plus padded lat/lon region
#[derive(Debug, Clone, Copy)]
pub struct SpatiotemporalBox {
    pub window: TimeWindow,
    pub region: BoundingBox,
}

/// Geographic box; x is longitude, y is latitude
pub type BoundingBox = geo::Rect<f64>;

/// Hypocenter reported by the relocation solver
#[derive(Debug, Clone, PartialEq)]
pub struct RelocatedEvent {
    pub event_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub origin_time: DateTime<Utc>,
}

/// Relocated event ready for output: new hypocenter, original magnitude and picks
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEvent {
    pub event_id: String,
    pub origin_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub phase_lines: Vec<String>,
}

/// Grid cell index `(column, row)`, i.e. (lon, lat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartitionId {
    pub col: usize,
    pub row: usize,
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.col, self.row)
    }
}

/// One unit of work for the relocation pool
#[derive(Debug, Clone)]
pub struct PartitionTask {
    pub id: PartitionId,
    pub cell: BoundingBox,
    /// Events inside the padded cell, in catalog order
    pub members: Vec<String>,
    /// Events inside the unpadded cell; only these are kept from the solver output
    pub owned: Vec<String>,
    pub paths: PartitionPaths,
}

/// Files read and written by one partition
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPaths {
    pub event_file: std::path::PathBuf,
    pub dt_file: std::path::PathBuf,
    pub control_file: std::path::PathBuf,
    pub reloc_file: std::path::PathBuf,
    pub solver_log: std::path::PathBuf,
    pub ctlg: std::path::PathBuf,
    pub pha: std::path::PathBuf,
    pub pha_full: std::path::PathBuf,
}
