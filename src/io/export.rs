use crate::core::select::ChlSlice;
use crate::types::ChlResult;
use chrono::Utc;
use std::path::Path;

/// Fill value written for missing cells (CF default for f32)
pub const FILL_VALUE_F32: f32 = 9.96921e+36;

/// Writes a cleaned slice to a CF-styled NetCDF file
pub struct SliceWriter;

impl SliceWriter {
    /// Write the slice to `path`, overwriting any existing file
    ///
    /// NaN cells are stored as the declared `_FillValue`. The slice's
    /// timestamp lands in the `time_coverage_start`/`end` global
    /// attributes, the same place the Level-3 products keep it.
    pub fn write(slice: &ChlSlice, path: &Path) -> ChlResult<()> {
        log::info!(
            "Writing {}x{} slice to {}",
            slice.lat.len(),
            slice.lon.len(),
            path.display()
        );

        let mut file = netcdf::create(path)?;

        file.add_dimension("lat", slice.lat.len())?;
        file.add_dimension("lon", slice.lon.len())?;

        {
            let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
            lat_var.put_attribute("long_name", "latitude")?;
            lat_var.put_attribute("standard_name", "latitude")?;
            lat_var.put_attribute("units", "degrees_north")?;
            let lat: Vec<f64> = slice.lat.to_vec();
            lat_var.put_values(&lat, ..)?;
        }

        {
            let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
            lon_var.put_attribute("long_name", "longitude")?;
            lon_var.put_attribute("standard_name", "longitude")?;
            lon_var.put_attribute("units", "degrees_east")?;
            let lon: Vec<f64> = slice.lon.to_vec();
            lon_var.put_values(&lon, ..)?;
        }

        {
            let mut chl_var = file.add_variable::<f32>("chlor_a", &["lat", "lon"])?;
            chl_var.put_attribute("long_name", "Chlorophyll Concentration, OCI Algorithm")?;
            chl_var.put_attribute(
                "standard_name",
                "mass_concentration_of_chlorophyll_in_sea_water",
            )?;
            chl_var.put_attribute("units", "mg m^-3")?;
            chl_var.put_attribute("_FillValue", FILL_VALUE_F32)?;

            let values: Vec<f32> = slice
                .values
                .iter()
                .map(|&v| if v.is_nan() { FILL_VALUE_F32 } else { v })
                .collect();
            chl_var.put_values(&values, ..)?;
        }

        file.add_attribute("Conventions", "CF-1.8")?;
        file.add_attribute("source", "PACE OCI Level-3 mapped chlorophyll")?;
        file.add_attribute(
            "time_coverage_start",
            slice.time.format("%Y-%m-%dT%H:%M:%SZ").to_string().as_str(),
        )?;
        file.add_attribute(
            "time_coverage_end",
            (slice.time + chrono::Duration::days(1))
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string()
                .as_str(),
        )?;
        file.add_attribute(
            "history",
            format!(
                "{}: Created by chlora",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            )
            .as_str(),
        )?;

        log::info!("Wrote {}", path.display());
        Ok(())
    }
}
