//! Local storage layout for downloaded models.

pub mod paths;

pub use paths::StoragePaths;
