// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod linker;
pub mod spatiotemporal;

pub use distance::{grid_cells, is_within_bounding_box, pad_box, padded_box, planar_distance_km};
pub use filters::{admit_line, admit_pair, LineRejection, PairDeviation, PairRejection};
pub use linker::{LinkResult, PairLinker};
pub use spatiotemporal::{is_within_box, merge_relocated, restrict, restrict_to_box};
