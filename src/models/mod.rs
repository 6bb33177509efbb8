// Model exports
pub mod domain;
pub mod report;

pub use domain::{
    BoundingBox, DtHeader, DtLine, DtPair, EventIndex, EventRecord, GainPeriod, GainSpec, IdSource,
    LinkThresholds, MergedEvent, PartitionId, PartitionPaths, PartitionTask, PhaseLine, PhaseTag,
    RelocatedEvent, SpatiotemporalBox, Station, StationIndex, TimeWindow,
};
pub use report::{LinkStats, PartitionOutcome, RelocationReport};
