pub mod analysis;
pub mod backup;
pub mod core;
pub mod gradebook;
pub mod preferences;
pub mod tabular;
