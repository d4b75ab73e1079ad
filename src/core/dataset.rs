use crate::types::{ChlCube, ChlError, ChlGrid, ChlResult, CoordAxis, LocalGranule};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3, Axis};
use std::path::Path;

/// NetCDF variable holding the mapped chlorophyll field
pub const CHLOR_A_VAR: &str = "chlor_a";

/// Coordinate axes and chlorophyll field of a single granule
#[derive(Debug, Clone)]
pub struct GranuleGrid {
    pub lat: CoordAxis,
    pub lon: CoordAxis,
    pub chlor_a: ChlGrid,
}

/// Assembled (time, lat, lon) chlorophyll stack
///
/// The time axis is built from filename dates during assembly. Whatever
/// time metadata the granules carry internally is never consulted.
#[derive(Debug, Clone)]
pub struct ChlDataset {
    pub times: Vec<DateTime<Utc>>,
    pub lat: CoordAxis,
    pub lon: CoordAxis,
    pub chlor_a: ChlCube,
}

impl ChlDataset {
    /// Stack local granules along a new leading time dimension
    ///
    /// Granules must arrive date-sorted and share one grid; a shape
    /// mismatch aborts the assembly. Each stack level keeps the date
    /// that was paired with its granule.
    pub fn assemble(granules: &[LocalGranule]) -> ChlResult<Self> {
        if granules.is_empty() {
            return Err(ChlError::Assembly("No granules to assemble".to_string()));
        }

        log::info!("Assembling {} granules into a time stack", granules.len());

        let first = GranuleReader::read(&granules[0].path)?;
        let (nlat, nlon) = first.chlor_a.dim();

        let mut cube = Array3::zeros((granules.len(), nlat, nlon));
        cube.index_axis_mut(Axis(0), 0).assign(&first.chlor_a);

        for (k, granule) in granules.iter().enumerate().skip(1) {
            let grid = GranuleReader::read(&granule.path)?;
            if grid.chlor_a.dim() != (nlat, nlon) {
                return Err(ChlError::Assembly(format!(
                    "Grid shape {:?} of {} does not match expected {:?}",
                    grid.chlor_a.dim(),
                    granule.path.display(),
                    (nlat, nlon)
                )));
            }
            cube.index_axis_mut(Axis(0), k).assign(&grid.chlor_a);
        }

        let times: Vec<DateTime<Utc>> = granules.iter().map(|g| g.date).collect();

        log::info!(
            "Assembled stack: {} time steps on a {}x{} grid",
            times.len(),
            nlat,
            nlon
        );

        Ok(Self {
            times,
            lat: first.lat,
            lon: first.lon,
            chlor_a: cube,
        })
    }

    /// (time, lat, lon) extent of the stack
    pub fn dim(&self) -> (usize, usize, usize) {
        self.chlor_a.dim()
    }

    /// First and last timestamp on the time axis
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.times.first(), self.times.last()) {
            (Some(a), Some(b)) => Some((*a, *b)),
            _ => None,
        }
    }
}

/// Reads coordinate axes and the chlorophyll field from L3M granules
pub struct GranuleReader;

impl GranuleReader {
    /// Read one granule from disk
    ///
    /// Fill values become NaN and `scale_factor`/`add_offset` are applied
    /// when present. The field must be 2D and agree with the coordinate
    /// axis lengths.
    pub fn read(path: &Path) -> ChlResult<GranuleGrid> {
        let file = netcdf::open(path)?;

        let lat = Self::read_axis(&file, "lat", path)?;
        let lon = Self::read_axis(&file, "lon", path)?;

        let var = file.variable(CHLOR_A_VAR).ok_or_else(|| {
            ChlError::Assembly(format!(
                "Variable '{}' not found in {}",
                CHLOR_A_VAR,
                path.display()
            ))
        })?;

        let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        if dims != [lat.len(), lon.len()] {
            return Err(ChlError::Assembly(format!(
                "Variable '{}' in {} has shape {:?}, expected [{}, {}]",
                CHLOR_A_VAR,
                path.display(),
                dims,
                lat.len(),
                lon.len()
            )));
        }

        let scale = Self::attr_f64(&var, "scale_factor").unwrap_or(1.0);
        let offset = Self::attr_f64(&var, "add_offset").unwrap_or(0.0);
        let fill = Self::attr_f32(&var, "_FillValue");

        let raw: Vec<f32> = var.get_values(..)?;
        let values: Vec<f32> = raw
            .iter()
            .map(|&v| {
                if Self::is_missing(v, fill) {
                    f32::NAN
                } else {
                    (v as f64 * scale + offset) as f32
                }
            })
            .collect();

        let chlor_a = Array2::from_shape_vec((lat.len(), lon.len()), values)
            .map_err(|e| ChlError::Assembly(format!("Bad grid in {}: {}", path.display(), e)))?;

        log::debug!(
            "Read {}: {}x{} cells",
            path.display(),
            lat.len(),
            lon.len()
        );

        Ok(GranuleGrid { lat, lon, chlor_a })
    }

    /// Read a 1D coordinate variable
    fn read_axis(file: &netcdf::File, name: &str, path: &Path) -> ChlResult<CoordAxis> {
        let var = file.variable(name).ok_or_else(|| {
            ChlError::Assembly(format!(
                "Coordinate '{}' not found in {}",
                name,
                path.display()
            ))
        })?;
        let values: Vec<f64> = var.get_values(..)?;
        Ok(Array1::from(values))
    }

    fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
        var.attribute_value(name)
            .and_then(|r| r.ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Double(d) => Some(d),
                netcdf::AttributeValue::Float(f) => Some(f as f64),
                _ => None,
            })
    }

    fn attr_f32(var: &netcdf::Variable, name: &str) -> Option<f32> {
        var.attribute_value(name)
            .and_then(|r| r.ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Float(f) => Some(f),
                netcdf::AttributeValue::Double(d) => Some(d as f32),
                _ => None,
            })
    }

    fn is_missing(v: f32, fill: Option<f32>) -> bool {
        if !v.is_finite() {
            return true;
        }
        match fill {
            Some(f) => v == f,
            // No declared fill: treat CF default-range magnitudes as missing
            None => v.abs() > 1.0e30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn write_granule(
        dir: &TempDir,
        name: &str,
        lat: &[f64],
        lon: &[f64],
        values: &[f32],
        fill: Option<f32>,
        scale: Option<f64>,
    ) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = netcdf::create(&path).unwrap();

        file.add_dimension("lat", lat.len()).unwrap();
        file.add_dimension("lon", lon.len()).unwrap();

        {
            let mut v = file.add_variable::<f64>("lat", &["lat"]).unwrap();
            v.put_values(lat, ..).unwrap();
        }
        {
            let mut v = file.add_variable::<f64>("lon", &["lon"]).unwrap();
            v.put_values(lon, ..).unwrap();
        }
        {
            let mut v = file.add_variable::<f32>("chlor_a", &["lat", "lon"]).unwrap();
            if let Some(f) = fill {
                v.put_attribute("_FillValue", f).unwrap();
            }
            if let Some(s) = scale {
                v.put_attribute("scale_factor", s).unwrap();
            }
            v.put_values(values, ..).unwrap();
        }

        path
    }

    #[test]
    fn test_read_masks_fill_and_applies_scale() {
        let dir = TempDir::new().unwrap();
        let path = write_granule(
            &dir,
            "granule.nc",
            &[40.0, 39.0],
            &[-125.0, -124.0],
            &[1.0, -32767.0, 3.0, 4.0],
            Some(-32767.0),
            Some(2.0),
        );

        let grid = GranuleReader::read(&path).unwrap();

        assert_eq!(grid.lat.to_vec(), vec![40.0, 39.0]);
        assert_eq!(grid.chlor_a[[0, 0]], 2.0);
        assert!(grid.chlor_a[[0, 1]].is_nan());
        assert_eq!(grid.chlor_a[[1, 0]], 6.0);
        assert_eq!(grid.chlor_a[[1, 1]], 8.0);
    }

    #[test]
    fn test_read_without_attributes_passes_values_through() {
        let dir = TempDir::new().unwrap();
        let path = write_granule(
            &dir,
            "plain.nc",
            &[40.0],
            &[-125.0, -124.0],
            &[0.5, 1.5],
            None,
            None,
        );

        let grid = GranuleReader::read(&path).unwrap();
        assert_eq!(grid.chlor_a[[0, 0]], 0.5);
        assert_eq!(grid.chlor_a[[0, 1]], 1.5);
    }

    #[test]
    fn test_read_missing_variable_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("lat", 1).unwrap();
            let mut v = file.add_variable::<f64>("lat", &["lat"]).unwrap();
            v.put_values(&[40.0], ..).unwrap();
        }

        let err = GranuleReader::read(&path).unwrap_err();
        assert!(err.to_string().contains("'lon' not found"));
    }

    #[test]
    fn test_assemble_keeps_date_order_and_values() {
        let dir = TempDir::new().unwrap();
        let lat = [40.0, 39.0];
        let lon = [-125.0, -124.0];

        let a = write_granule(&dir, "a.nc", &lat, &lon, &[1.0, 2.0, 3.0, 4.0], None, None);
        let b = write_granule(&dir, "b.nc", &lat, &lon, &[5.0, 6.0, 7.0, 8.0], None, None);

        let granules = vec![
            LocalGranule {
                path: a,
                date: utc(2024, 6, 4),
            },
            LocalGranule {
                path: b,
                date: utc(2024, 6, 10),
            },
        ];

        let ds = ChlDataset::assemble(&granules).unwrap();

        assert_eq!(ds.dim(), (2, 2, 2));
        assert_eq!(ds.times, vec![utc(2024, 6, 4), utc(2024, 6, 10)]);
        assert_eq!(ds.chlor_a[[0, 0, 0]], 1.0);
        assert_eq!(ds.chlor_a[[1, 1, 1]], 8.0);
        assert_eq!(ds.time_span(), Some((utc(2024, 6, 4), utc(2024, 6, 10))));
    }

    #[test]
    fn test_assemble_rejects_mismatched_grids() {
        let dir = TempDir::new().unwrap();

        let a = write_granule(
            &dir,
            "a.nc",
            &[40.0, 39.0],
            &[-125.0, -124.0],
            &[1.0, 2.0, 3.0, 4.0],
            None,
            None,
        );
        let b = write_granule(&dir, "b.nc", &[40.0], &[-125.0], &[5.0], None, None);

        let granules = vec![
            LocalGranule {
                path: a,
                date: utc(2024, 6, 4),
            },
            LocalGranule {
                path: b,
                date: utc(2024, 6, 10),
            },
        ];

        let err = ChlDataset::assemble(&granules).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_assemble_empty_fails() {
        let err = ChlDataset::assemble(&[]).unwrap_err();
        assert!(err.to_string().contains("No granules"));
    }
}
