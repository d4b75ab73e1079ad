use crate::types::{ChlError, ChlResult, DatedGranule, GranuleHandle};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;

/// Extracts acquisition dates from PACE OCI granule filenames
pub struct DateExtractor;

impl DateExtractor {
    /// Parse the acquisition date embedded in a granule filename
    ///
    /// Level-3 mapped granules carry their day as `PACE_OCI.YYYYMMDD`.
    /// The parsed day becomes a UTC midnight timestamp. Works on bare
    /// filenames and on full paths.
    pub fn extract_date(path: &str) -> ChlResult<DateTime<Utc>> {
        let re = Regex::new(r"PACE_OCI\.(\d{8})")
            .map_err(|e| ChlError::Processing(format!("Regex error: {}", e)))?;

        let caps = re.captures(path).ok_or_else(|| ChlError::DateExtraction {
            path: path.to_string(),
        })?;

        // Eight digits that do not form a calendar date are rejected too
        let day = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").map_err(|_| {
            ChlError::DateExtraction {
                path: path.to_string(),
            }
        })?;

        Ok(DateTime::from_naive_utc_and_offset(
            day.and_time(NaiveTime::MIN),
            Utc,
        ))
    }

    /// Pair each granule handle with its filename date, sorted by date
    ///
    /// Extraction is fail-fast: the first unparseable name aborts the
    /// whole batch. The archive does not guarantee listing order, so the
    /// pairs are sorted chronologically before they are returned, and
    /// each date stays attached to the handle it was parsed from.
    pub fn pair_with_dates(handles: Vec<GranuleHandle>) -> ChlResult<Vec<DatedGranule>> {
        let mut dates = Vec::with_capacity(handles.len());
        for handle in &handles {
            dates.push(Self::extract_date(&handle.name)?);
        }

        Self::validate_counts(dates.len(), handles.len())?;

        let mut dated: Vec<DatedGranule> = handles
            .into_iter()
            .zip(dates)
            .map(|(handle, date)| DatedGranule { handle, date })
            .collect();
        dated.sort_by_key(|g| g.date);

        log::info!("Paired {} granules with filename dates", dated.len());
        Ok(dated)
    }

    /// Check that every file produced exactly one date
    fn validate_counts(dates: usize, files: usize) -> ChlResult<()> {
        if dates != files {
            return Err(ChlError::CountMismatch { dates, files });
        }
        Ok(())
    }
}
