use crate::core::distance::{is_within_bounding_box, padded_box};
use crate::models::{
    EventIndex, EventRecord, MergedEvent, RelocatedEvent, SpatiotemporalBox, TimeWindow,
};

/// Event lies in the box's time window and region (both inclusive)
#[inline]
pub fn is_within_box(event: &EventRecord, bounds: &SpatiotemporalBox) -> bool {
    bounds.window.contains(&event.origin_time)
        && is_within_bounding_box(event.latitude, event.longitude, &bounds.region)
}

/// Keep the events inside a padded lat/lon box and time window
///
/// `padding` is `[lon_deg, lat_deg]`, applied outward on both sides.
pub fn restrict(
    events: &EventIndex,
    window: TimeWindow,
    lat_range: [f64; 2],
    lon_range: [f64; 2],
    padding: [f64; 2],
) -> EventIndex {
    let bounds = SpatiotemporalBox {
        window,
        region: padded_box(lat_range, lon_range, padding),
    };
    restrict_to_box(events, &bounds)
}

pub fn restrict_to_box(events: &EventIndex, bounds: &SpatiotemporalBox) -> EventIndex {
    let subset: EventIndex = events
        .iter()
        .filter(|event| is_within_box(event, bounds))
        .cloned()
        .collect();

    tracing::info!(
        "Restricted catalog to {} of {} events",
        subset.len(),
        events.len()
    );
    subset
}

/// Attach relocated hypocenters to their catalog events
///
/// Depth is corrected by subtracting `depth_correction` and rounded to 10 m.
/// Magnitude and phase lines come from the catalog. Relocated ids absent from
/// the catalog are skipped; catalog events the solver dropped do not appear.
pub fn merge_relocated(
    working: &EventIndex,
    relocated: &[RelocatedEvent],
    depth_correction: f64,
) -> Vec<MergedEvent> {
    let mut merged = Vec::with_capacity(relocated.len());
    let mut unknown = 0usize;

    for reloc in relocated {
        let Some(event) = working.get(&reloc.event_id) else {
            unknown += 1;
            continue;
        };

        merged.push(MergedEvent {
            event_id: reloc.event_id.clone(),
            origin_time: reloc.origin_time,
            latitude: reloc.latitude,
            longitude: reloc.longitude,
            depth_km: round_centi(reloc.depth_km - depth_correction),
            magnitude: event.magnitude,
            phase_lines: event.phases.iter().map(|p| p.raw.clone()).collect(),
        });
    }

    if unknown > 0 {
        tracing::warn!("Skipped {} relocated events missing from the working catalog", unknown);
    }
    merged
}

#[inline]
fn round_centi(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
