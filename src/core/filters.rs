use crate::core::distance::planar_distance_km;
use crate::models::{DtLine, EventRecord, LinkThresholds, PhaseTag, Station};

/// Separation between the two events of a pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDeviation {
    pub loc_dev_km: f64,
    pub dep_dev_km: f64,
}

/// Why a pair failed coarse admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRejection {
    Location,
    Depth,
}

/// Why a single observation failed fine admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRejection {
    Distance,
    Correlation,
    TimeDifference,
}

#[inline]
pub fn pair_deviation(observed: &EventRecord, reference: &EventRecord) -> PairDeviation {
    PairDeviation {
        loc_dev_km: planar_distance_km(
            observed.latitude,
            observed.longitude,
            reference.latitude,
            reference.longitude,
        ),
        dep_dev_km: (observed.depth_km - reference.depth_km).abs(),
    }
}

/// Coarse (header level) admission
///
/// Both separations must be strictly below their thresholds.
#[inline]
pub fn admit_pair(
    observed: &EventRecord,
    reference: &EventRecord,
    thresholds: &LinkThresholds,
) -> Result<PairDeviation, PairRejection> {
    let deviation = pair_deviation(observed, reference);

    if !(deviation.loc_dev_km < thresholds.loc_dev_km) {
        return Err(PairRejection::Location);
    }
    if !(deviation.dep_dev_km < thresholds.dep_dev_km) {
        return Err(PairRejection::Depth);
    }

    Ok(deviation)
}

/// Station is within `dist_km` of at least one of the two events
#[inline]
pub fn within_aperture(
    station: &Station,
    observed: &EventRecord,
    reference: &EventRecord,
    thresholds: &LinkThresholds,
) -> bool {
    let observed_dist = planar_distance_km(
        station.latitude,
        station.longitude,
        observed.latitude,
        observed.longitude,
    );
    let reference_dist = planar_distance_km(
        station.latitude,
        station.longitude,
        reference.latitude,
        reference.longitude,
    );

    observed_dist.min(reference_dist) <= thresholds.dist_km
}

/// `weight^2 >= cc`
#[inline]
pub fn passes_correlation(weight: f64, thresholds: &LinkThresholds) -> bool {
    weight * weight >= thresholds.cc
}

/// `|dt| <= bound` for the phase
#[inline]
pub fn passes_dt_bound(dt: f64, phase: PhaseTag, thresholds: &LinkThresholds) -> bool {
    dt.abs() <= thresholds.dt_bound(phase)
}

/// Fine (observation level) admission, checked in order: distance, correlation, dt
#[inline]
pub fn admit_line(
    line: &DtLine,
    station: &Station,
    observed: &EventRecord,
    reference: &EventRecord,
    thresholds: &LinkThresholds,
) -> Result<(), LineRejection> {
    if !within_aperture(station, observed, reference, thresholds) {
        return Err(LineRejection::Distance);
    }
    if !passes_correlation(line.weight, thresholds) {
        return Err(LineRejection::Correlation);
    }
    if !passes_dt_bound(line.dt, line.phase, thresholds) {
        return Err(LineRejection::TimeDifference);
    }
    Ok(())
}
