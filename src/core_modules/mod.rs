pub mod artifact_store;
pub mod compositor;
pub mod palette;
pub mod pitch_plate;
pub mod position;
pub mod scheduler;
pub mod spatial_accumulator;
pub mod zone_coverage;
