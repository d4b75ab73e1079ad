//! chlora: A PACE OCI Chlorophyll-a Acquisition and Preprocessing Pipeline
//!
//! This library turns NASA Ocean Color Level-3 mapped chlorophyll granules into
//! analysis-ready regional slices: it authenticates against Earthdata, searches
//! CMR, downloads the matching granules, stacks them along a time axis derived
//! from their filenames, and extracts cleaned spatial subsets.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, ChlCube, ChlError, ChlGrid, ChlResult, ChlValue, CoordAxis,
    DatedGranule, Granule, GranuleHandle, LocalGranule, TemporalRange,
};

pub use io::{CmrClient, Credentials, EarthdataAuth, GranuleFetcher, SearchParams, SliceWriter};
pub use pipeline::{ChlPipeline, PipelineParams, Region};
