use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use std::path::PathBuf;

use chlora::{
    BoundingBox, ChlPipeline, PipelineParams, Region, SearchParams, TemporalRange,
};

#[derive(Parser, Debug)]
#[command(name = "chlora")]
#[command(about = "Fetch PACE OCI chlorophyll granules and extract a cleaned regional slice")]
struct Args {
    /// Target timestamp, RFC 3339 or YYYY-MM-DD (resolved to the nearest granule date)
    #[arg(long)]
    time: String,

    /// Point latitude in degrees north (with --lon, selects the nearest cell)
    #[arg(long, requires = "lon", conflicts_with = "bbox")]
    lat: Option<f64>,

    /// Point longitude in degrees east
    #[arg(long, requires = "lat", conflicts_with = "bbox")]
    lon: Option<f64>,

    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long)]
    bbox: Option<String>,

    /// CMR collection short name
    #[arg(long, default_value = "PACE_OCI_L3M_CHL")]
    short_name: String,

    /// First day of the search window
    #[arg(long, default_value = "2024-06-04")]
    start: NaiveDate,

    /// Last day of the search window
    #[arg(long, default_value = "2024-11-11")]
    end: NaiveDate,

    /// Granule name pattern passed to CMR
    #[arg(long, default_value = "*.DAY.*.4km.*")]
    pattern: String,

    /// Granules per CMR page
    #[arg(long, default_value = "2000")]
    page_size: usize,

    /// Concentration floor in mg m^-3
    #[arg(long, default_value = "0.01")]
    clip_floor: f32,

    /// Keep downloaded granules in this directory instead of a scratch dir
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Write the cleaned slice to this NetCDF file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let region = parse_region(&args)?;
    let target_time = parse_time(&args.time)?;

    let mut params = PipelineParams::new(region, target_time);
    params.search = SearchParams {
        short_name: args.short_name.clone(),
        temporal: TemporalRange::new(args.start, args.end),
        granule_pattern: args.pattern.clone(),
        page_size: args.page_size,
    };
    params.clip_floor = args.clip_floor;
    params.download_dir = args.download_dir.clone();
    params.output = args.output.clone();

    let slice = ChlPipeline::new(params).run()?;

    let stats = slice.stats();
    let (nlat, nlon) = slice.values.dim();
    println!("Time step:  {}", slice.time.format("%Y-%m-%d"));
    println!("Grid:       {} x {} cells, {} valid", nlat, nlon, stats.valid);
    if stats.valid > 0 {
        println!(
            "Chlor-a:    {:.3}..{:.3} mg m^-3, mean {:.3}",
            stats.min, stats.max, stats.mean
        );
    }
    if let Some(path) = &args.output {
        println!("Output:     {}", path.display());
    }

    Ok(())
}

/// Point or box target from the command line flags
fn parse_region(args: &Args) -> Result<Region> {
    if let Some(spec) = &args.bbox {
        return Ok(Region::Box(parse_bbox(spec)?));
    }
    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Ok(Region::Point { lat, lon }),
        _ => bail!("Give either --bbox or both --lat and --lon"),
    }
}

/// RFC 3339 instant or bare date taken as midnight UTC
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Cannot parse '{}' as RFC 3339 or YYYY-MM-DD", s))?;
    Ok(DateTime::from_naive_utc_and_offset(
        day.and_time(NaiveTime::MIN),
        Utc,
    ))
}

/// Four comma separated values: min_lon,min_lat,max_lon,max_lat
fn parse_bbox(spec: &str) -> Result<BoundingBox> {
    let parts: Vec<f64> = spec
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Cannot parse bounding box '{}'", spec))?;

    if parts.len() != 4 {
        bail!("Bounding box needs four values: min_lon,min_lat,max_lon,max_lat");
    }

    Ok(BoundingBox {
        min_lon: parts[0],
        max_lon: parts[2],
        min_lat: parts[1],
        max_lat: parts[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_time_bare_date() {
        let t = parse_time("2024-08-01").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_time_rfc3339() {
        let t = parse_time("2024-08-01T12:30:00Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 8, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_time_garbage_fails() {
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("-125.5, 37.0, -122.0, 40.0").unwrap();
        assert_eq!(bbox.min_lon, -125.5);
        assert_eq!(bbox.min_lat, 37.0);
        assert_eq!(bbox.max_lon, -122.0);
        assert_eq!(bbox.max_lat, 40.0);
    }

    #[test]
    fn test_parse_bbox_wrong_arity_fails() {
        assert!(parse_bbox("-125.5, 37.0, -122.0").is_err());
    }
}
