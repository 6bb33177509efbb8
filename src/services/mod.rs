// Service exports
pub mod partition;
pub mod solver;

pub use partition::{
    concat_files, merge_outputs, partition_paths, plan_partitions, prepare_inputs,
    remove_partition_files, run_partition, MergedPaths, PartitionPool, SharedInputs,
};
pub use solver::{HypoDd, RelocationSolver};
