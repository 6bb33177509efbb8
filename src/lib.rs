//! hypo-link - differential-time pair linkage and partitioned relocation
//!
//! This library selects cross-correlation differential times between nearby
//! earthquakes and drives a double-difference relocation solver over a grid of
//! overlapping partitions, merging the relocated events back into a catalog.

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod formats;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{planar_distance_km, LinkResult, PairLinker};
pub use config::Settings;
pub use error::{LinkError, Result};
pub use models::{DtPair, EventIndex, EventRecord, LinkStats, LinkThresholds, Station, StationIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // one degree of latitude is 111 km
        let d = planar_distance_km(35.0, -117.5, 36.0, -117.5);
        assert!((d - 111.0).abs() < 1e-9);
        assert!(LinkError::NoOutput.is_fatal());
    }
}
