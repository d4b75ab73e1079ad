use crate::core::dataset::ChlDataset;
use crate::types::{BoundingBox, ChlError, ChlGrid, ChlResult, ChlValue, CoordAxis};
use chrono::{DateTime, Utc};
use ndarray::{s, Axis};

/// Default concentration floor applied after masking (mg m^-3)
pub const DEFAULT_CLIP_FLOOR: ChlValue = 0.01;

/// Single time step cut from the assembled stack
#[derive(Debug, Clone)]
pub struct ChlSlice {
    pub time: DateTime<Utc>,
    pub lat: CoordAxis,
    pub lon: CoordAxis,
    pub values: ChlGrid,
}

/// Summary statistics over the finite cells of a slice
#[derive(Debug, Clone, Copy)]
pub struct SliceStats {
    pub valid: usize,
    pub total: usize,
    pub min: ChlValue,
    pub max: ChlValue,
    pub mean: ChlValue,
}

impl ChlSlice {
    /// Replace every value that is not strictly positive with NaN
    ///
    /// Concentrations at or below zero cannot be log-scaled; they are
    /// treated as missing from here on.
    pub fn mask_nonpositive(&mut self) {
        self.values
            .mapv_inplace(|v| if v > 0.0 { v } else { f32::NAN });
    }

    /// Raise every value below `floor` to `floor`
    ///
    /// NaN compares false against the floor and passes through untouched.
    pub fn clip_floor(&mut self, floor: ChlValue) {
        self.values
            .mapv_inplace(|v| if v < floor { floor } else { v });
    }

    /// Compute min/max/mean over finite cells
    pub fn stats(&self) -> SliceStats {
        let mut valid = 0usize;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;

        for &v in self.values.iter() {
            if v.is_finite() {
                valid += 1;
                if v < min {
                    min = v;
                }
                if v > max {
                    max = v;
                }
                sum += v as f64;
            }
        }

        if valid == 0 {
            min = f32::NAN;
            max = f32::NAN;
        }
        let mean = if valid > 0 {
            (sum / valid as f64) as f32
        } else {
            f32::NAN
        };

        SliceStats {
            valid,
            total: self.values.len(),
            min,
            max,
            mean,
        }
    }
}

/// Spatial and temporal selection over an assembled stack
pub struct Selector;

impl Selector {
    /// Cut the stack down to the cells whose coordinates fall inside the box
    ///
    /// Selection is by coordinate value, so it works whether the latitude
    /// axis runs north-to-south (as L3M grids do) or south-to-north.
    pub fn select_region(dataset: &ChlDataset, bbox: &BoundingBox) -> ChlResult<ChlDataset> {
        let (lat0, lat1) =
            Self::axis_window(&dataset.lat, bbox.min_lat, bbox.max_lat).ok_or_else(|| {
                ChlError::Selection(format!(
                    "No latitude cells inside {}..{}",
                    bbox.min_lat, bbox.max_lat
                ))
            })?;
        let (lon0, lon1) =
            Self::axis_window(&dataset.lon, bbox.min_lon, bbox.max_lon).ok_or_else(|| {
                ChlError::Selection(format!(
                    "No longitude cells inside {}..{}",
                    bbox.min_lon, bbox.max_lon
                ))
            })?;

        log::info!(
            "Region window: {} lat cells, {} lon cells",
            lat1 - lat0 + 1,
            lon1 - lon0 + 1
        );

        Ok(ChlDataset {
            times: dataset.times.clone(),
            lat: dataset.lat.slice(s![lat0..=lat1]).to_owned(),
            lon: dataset.lon.slice(s![lon0..=lon1]).to_owned(),
            chlor_a: dataset
                .chlor_a
                .slice(s![.., lat0..=lat1, lon0..=lon1])
                .to_owned(),
        })
    }

    /// Reduce the stack to the single grid cell nearest to a point
    pub fn select_cell(dataset: &ChlDataset, lat: f64, lon: f64) -> ChlResult<ChlDataset> {
        let i = Self::nearest_cell_index(&dataset.lat, lat)?;
        let j = Self::nearest_cell_index(&dataset.lon, lon)?;

        log::info!(
            "Nearest cell to ({:.4}, {:.4}) is ({:.4}, {:.4})",
            lat,
            lon,
            dataset.lat[i],
            dataset.lon[j]
        );

        Ok(ChlDataset {
            times: dataset.times.clone(),
            lat: dataset.lat.slice(s![i..=i]).to_owned(),
            lon: dataset.lon.slice(s![j..=j]).to_owned(),
            chlor_a: dataset.chlor_a.slice(s![.., i..=i, j..=j]).to_owned(),
        })
    }

    /// Pull out the time step closest to the target timestamp
    pub fn nearest_time(dataset: &ChlDataset, target: DateTime<Utc>) -> ChlResult<ChlSlice> {
        let idx = Self::nearest_time_index(&dataset.times, target)?;

        log::info!(
            "Nearest time step to {} is {} (index {})",
            target.format("%Y-%m-%d"),
            dataset.times[idx].format("%Y-%m-%d"),
            idx
        );

        Ok(ChlSlice {
            time: dataset.times[idx],
            lat: dataset.lat.clone(),
            lon: dataset.lon.clone(),
            values: dataset.chlor_a.index_axis(Axis(0), idx).to_owned(),
        })
    }

    /// Index of the timestamp with the smallest absolute distance to the target
    ///
    /// The axis is chronologically sorted, so when two timestamps are
    /// equally distant the first one wins and the earlier date is chosen.
    pub fn nearest_time_index(times: &[DateTime<Utc>], target: DateTime<Utc>) -> ChlResult<usize> {
        if times.is_empty() {
            return Err(ChlError::Selection(
                "Cannot select from an empty time axis".to_string(),
            ));
        }

        let mut best = 0usize;
        let mut best_dist = i64::MAX;
        for (i, t) in times.iter().enumerate() {
            let dist = (*t - target).num_seconds().abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }

        Ok(best)
    }

    /// Index of the axis value closest to the target coordinate
    fn nearest_cell_index(axis: &CoordAxis, target: f64) -> ChlResult<usize> {
        if axis.is_empty() {
            return Err(ChlError::Selection(
                "Cannot select from an empty coordinate axis".to_string(),
            ));
        }

        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (i, &v) in axis.iter().enumerate() {
            let dist = (v - target).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }

        Ok(best)
    }

    /// First and last axis index whose value lies inside [lo, hi]
    ///
    /// The axis is monotonic in either direction, so the matching indices
    /// form one contiguous window.
    fn axis_window(axis: &CoordAxis, lo: f64, hi: f64) -> Option<(usize, usize)> {
        let mut first = None;
        let mut last = None;
        for (i, &v) in axis.iter().enumerate() {
            if v >= lo && v <= hi {
                if first.is_none() {
                    first = Some(i);
                }
                last = Some(i);
            }
        }
        match (first, last) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }
}
