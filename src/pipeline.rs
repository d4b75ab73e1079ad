use crate::core::{ChlDataset, ChlSlice, DateExtractor, Selector, DEFAULT_CLIP_FLOOR};
use crate::io::{CmrClient, EarthdataAuth, GranuleFetcher, SearchParams, SliceWriter};
use crate::types::{BoundingBox, ChlResult, ChlValue};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Spatial target of a pipeline run
#[derive(Debug, Clone)]
pub enum Region {
    /// All cells whose coordinates fall inside a bounding box
    Box(BoundingBox),
    /// The single grid cell nearest to a point
    Point { lat: f64, lon: f64 },
}

/// End-to-end pipeline parameters
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Granule search settings
    pub search: SearchParams,
    /// Spatial target
    pub region: Region,
    /// Timestamp resolved to the nearest available time step
    pub target_time: DateTime<Utc>,
    /// Concentration floor applied after masking
    pub clip_floor: ChlValue,
    /// Directory for downloaded granules; a scratch directory when unset
    pub download_dir: Option<PathBuf>,
    /// Optional NetCDF output path for the cleaned slice
    pub output: Option<PathBuf>,
}

impl PipelineParams {
    /// Parameters for a region and target date with defaults everywhere else
    pub fn new(region: Region, target_time: DateTime<Utc>) -> Self {
        Self {
            search: SearchParams::default(),
            region,
            target_time,
            clip_floor: DEFAULT_CLIP_FLOOR,
            download_dir: None,
            output: None,
        }
    }
}

/// Acquisition and preprocessing pipeline
///
/// Runs the full chain: Earthdata login, granule search, filename date
/// pairing, download, time stack assembly, spatial/temporal selection,
/// and cleanup of non-positive values.
pub struct ChlPipeline {
    params: PipelineParams,
}

impl ChlPipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    /// Run the pipeline end to end, logging in first
    pub fn run(&self) -> ChlResult<ChlSlice> {
        let auth = EarthdataAuth::login()?;
        self.run_with_auth(&auth)
    }

    /// Run against an already authenticated session
    pub fn run_with_auth(&self, auth: &EarthdataAuth) -> ChlResult<ChlSlice> {
        let cmr = CmrClient::new()?;
        let granules = cmr.search_granules(&self.params.search)?;

        let handles = GranuleFetcher::open_all(&granules);
        let dated = DateExtractor::pair_with_dates(handles)?;

        let fetcher = match &self.params.download_dir {
            Some(dir) => GranuleFetcher::new(auth, dir.clone())?,
            None => GranuleFetcher::with_scratch_dir(auth)?,
        };
        let local = fetcher.fetch_all(&dated)?;

        let dataset = ChlDataset::assemble(&local)?;
        if let Some((start, end)) = dataset.time_span() {
            log::info!(
                "Time axis spans {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            );
        }

        let slice = Self::select_and_clean(
            &dataset,
            &self.params.region,
            self.params.target_time,
            self.params.clip_floor,
        )?;

        if let Some(ref path) = self.params.output {
            SliceWriter::write(&slice, path)?;
        }

        let stats = slice.stats();
        log::info!(
            "Slice at {}: {}/{} valid cells, range {:.3}..{:.3} mg m^-3",
            slice.time.format("%Y-%m-%d"),
            stats.valid,
            stats.total,
            stats.min,
            stats.max
        );

        Ok(slice)
    }

    /// Spatial subset, nearest-time cut, zero masking, floor clipping
    ///
    /// Split out from `run` so an assembled stack can be processed
    /// without any network round trips.
    pub fn select_and_clean(
        dataset: &ChlDataset,
        region: &Region,
        target_time: DateTime<Utc>,
        clip_floor: ChlValue,
    ) -> ChlResult<ChlSlice> {
        let subset = match region {
            Region::Box(bbox) => Selector::select_region(dataset, bbox)?,
            Region::Point { lat, lon } => Selector::select_cell(dataset, *lat, *lon)?,
        };

        let mut slice = Selector::nearest_time(&subset, target_time)?;
        slice.mask_nonpositive();
        slice.clip_floor(clip_floor);

        Ok(slice)
    }
}
