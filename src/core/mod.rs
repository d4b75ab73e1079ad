//! Core processing modules for date pairing, assembly, and selection

pub mod dataset;
pub mod dates;
pub mod select;

// Re-export main types
pub use dataset::{ChlDataset, GranuleGrid, GranuleReader};
pub use dates::DateExtractor;
pub use select::{ChlSlice, Selector, SliceStats, DEFAULT_CLIP_FLOOR};
