use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

/// Chlorophyll-a concentration value (mg m^-3)
pub type ChlValue = f32;

/// 2D chlorophyll grid (lat x lon)
pub type ChlGrid = Array2<ChlValue>;

/// 3D chlorophyll stack (time x lat x lon)
pub type ChlCube = Array3<ChlValue>;

/// 1D coordinate axis in decimal degrees
pub type CoordAxis = Array1<f64>;

/// Inclusive date range for granule searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TemporalRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for TemporalRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Granule record returned by the CMR archive search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Granule {
    /// Producer granule ID (the .nc filename)
    pub name: String,
    /// Direct HTTPS download URL
    pub download_url: String,
    /// Archive-reported size in MB, when present
    pub size_mb: Option<f64>,
}

/// Cheap reference to a remote granule, openable on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleHandle {
    pub name: String,
    pub url: String,
}

/// Granule handle paired with the date parsed from its filename
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatedGranule {
    pub handle: GranuleHandle,
    pub date: DateTime<Utc>,
}

/// Granule materialized on local disk, date still attached
#[derive(Debug, Clone)]
pub struct LocalGranule {
    pub path: std::path::PathBuf,
    pub date: DateTime<Utc>,
}

/// Error types for the chlorophyll pipeline
#[derive(Debug, thiserror::Error)]
pub enum ChlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Granule search error: {0}")]
    Search(String),

    #[error("Could not extract date from: {path}")]
    DateExtraction { path: String },

    #[error("Mismatch: found {dates} dates for {files} files")]
    CountMismatch { dates: usize, files: usize },

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Selection error: {0}")]
    Selection(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for pipeline operations
pub type ChlResult<T> = Result<T, ChlError>;
