use crate::io::auth::EarthdataAuth;
use crate::types::{ChlError, ChlResult, DatedGranule, Granule, GranuleHandle, LocalGranule};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Downloads granules into a per-run directory
///
/// Each granule is fetched once per run; a file already present under the
/// destination directory is reused without touching the network.
pub struct GranuleFetcher<'a> {
    auth: &'a EarthdataAuth,
    dest_dir: PathBuf,
    // Keeps a run-scoped scratch directory alive until the fetcher drops
    _scratch: Option<TempDir>,
}

impl<'a> GranuleFetcher<'a> {
    /// Fetcher writing into the given directory, created if missing
    pub fn new(auth: &'a EarthdataAuth, dest_dir: impl Into<PathBuf>) -> ChlResult<Self> {
        let dest_dir = dest_dir.into();
        std::fs::create_dir_all(&dest_dir)?;
        Ok(Self {
            auth,
            dest_dir,
            _scratch: None,
        })
    }

    /// Fetcher writing into a temporary directory removed after the run
    pub fn with_scratch_dir(auth: &'a EarthdataAuth) -> ChlResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("chlora-granules-")
            .tempdir()?;
        log::debug!("Scratch directory: {}", scratch.path().display());
        Ok(Self {
            auth,
            dest_dir: scratch.path().to_path_buf(),
            _scratch: Some(scratch),
        })
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Turn search results into openable handles without touching the network
    pub fn open_all(granules: &[Granule]) -> Vec<GranuleHandle> {
        granules
            .iter()
            .map(|g| GranuleHandle {
                name: g.name.clone(),
                url: g.download_url.clone(),
            })
            .collect()
    }

    /// Download one granule, reusing a file already present in this run
    pub fn fetch(&self, handle: &GranuleHandle) -> ChlResult<PathBuf> {
        let output_path = self.dest_dir.join(&handle.name);

        if output_path.exists() {
            log::info!("Granule {} already present, skipping download", handle.name);
            return Ok(output_path);
        }

        log::info!("Downloading {}", handle.url);
        let response = self.auth.get(&handle.url).send()?.error_for_status()?;

        let content = response.bytes()?;
        if content.len() < 1024 {
            return Err(ChlError::Processing(format!(
                "Downloaded {} is only {} bytes, likely an error page",
                handle.name,
                content.len()
            )));
        }

        std::fs::write(&output_path, &content)?;
        log::info!("Saved {} ({} bytes)", output_path.display(), content.len());

        Ok(output_path)
    }

    /// Download every dated granule in order, keeping dates attached
    pub fn fetch_all(&self, dated: &[DatedGranule]) -> ChlResult<Vec<LocalGranule>> {
        let mut local = Vec::with_capacity(dated.len());
        for (i, granule) in dated.iter().enumerate() {
            log::info!(
                "Fetching granule {} of {}: {}",
                i + 1,
                dated.len(),
                granule.handle.name
            );
            let path = self.fetch(&granule.handle)?;
            local.push(LocalGranule {
                path,
                date: granule.date,
            });
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_all_maps_names_and_urls() {
        let granules = vec![Granule {
            name: "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc".to_string(),
            download_url: "https://obdaac-tea.earthdatacloud.nasa.gov/ob-cumulus-prod-public/PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc".to_string(),
            size_mb: Some(23.71),
        }];

        let handles = GranuleFetcher::open_all(&granules);

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].name, granules[0].name);
        assert_eq!(handles[0].url, granules[0].download_url);
    }

    #[test]
    fn test_fetch_reuses_existing_file() {
        let auth = EarthdataAuth::from_token("edl-test-token").unwrap();
        let dir = TempDir::new().unwrap();
        let fetcher = GranuleFetcher::new(&auth, dir.path()).unwrap();

        let name = "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc";
        std::fs::write(dir.path().join(name), b"cached bytes").unwrap();

        // The URL is unreachable on purpose; the cached file must win
        let handle = GranuleHandle {
            name: name.to_string(),
            url: "https://invalid.invalid/granule.nc".to_string(),
        };

        let path = fetcher.fetch(&handle).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"cached bytes");
    }

    #[test]
    fn test_scratch_dir_is_created() {
        let auth = EarthdataAuth::from_token("edl-test-token").unwrap();
        let fetcher = GranuleFetcher::with_scratch_dir(&auth).unwrap();
        assert!(fetcher.dest_dir().is_dir());
    }
}
