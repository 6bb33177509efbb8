use serde::Serialize;

use super::PartitionId;

/// Counters collected while selecting differential times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub lines_read: usize,
    pub orphan_lines: usize,
    pub pairs_read: usize,
    pub pairs_malformed: usize,
    pub pairs_missing_event: usize,
    pub pairs_location_rejected: usize,
    pub pairs_depth_rejected: usize,
    pub pairs_too_few_stations: usize,
    pub pairs_neighbor_capped: usize,
    pub pairs_kept: usize,
    pub obs_read: usize,
    pub obs_malformed: usize,
    pub obs_missing_station: usize,
    pub obs_distance_rejected: usize,
    pub obs_cc_rejected: usize,
    pub obs_dt_rejected: usize,
    pub obs_station_capped: usize,
    pub obs_kept: usize,
}

/// Result of one partition task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionOutcome {
    pub partition: PartitionId,
    pub members: usize,
    pub pairs: usize,
    pub relocated: usize,
    /// Set when the partition contributed nothing because of a failure
    pub failure: Option<String>,
}

impl PartitionOutcome {
    pub fn failed(partition: PartitionId, members: usize, reason: impl Into<String>) -> Self {
        Self {
            partition,
            members,
            pairs: 0,
            relocated: 0,
            failure: Some(reason.into()),
        }
    }
}

/// Summary written next to the merged relocation outputs
#[derive(Debug, Clone, Serialize)]
pub struct RelocationReport {
    #[serde(rename = "ctlgCode")]
    pub ctlg_code: String,
    #[serde(rename = "totalRelocated")]
    pub total_relocated: usize,
    #[serde(rename = "failedPartitions")]
    pub failed_partitions: usize,
    pub partitions: Vec<PartitionOutcome>,
    #[serde(rename = "finishedAt")]
    pub finished_at: chrono::DateTime<chrono::Utc>,
}
