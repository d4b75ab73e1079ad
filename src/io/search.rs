use crate::io::USER_AGENT;
use crate::types::{ChlError, ChlResult, Granule, TemporalRange};
use chrono::NaiveDate;
use serde::Deserialize;

/// CMR granule search endpoint
pub const CMR_SEARCH_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.json";

/// Granule search parameters
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Collection short name in the CMR catalog
    pub short_name: String,
    /// Inclusive acquisition date range
    pub temporal: TemporalRange,
    /// Glob pattern matched against granule names
    pub granule_pattern: String,
    /// Granules requested per page
    pub page_size: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            short_name: "PACE_OCI_L3M_CHL".to_string(),
            temporal: TemporalRange::new(
                NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
                NaiveDate::from_ymd_opt(2024, 11, 11).unwrap(),
            ),
            granule_pattern: "*.DAY.*.4km.*".to_string(),
            page_size: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CmrResponse {
    feed: CmrFeed,
}

#[derive(Debug, Deserialize)]
struct CmrFeed {
    #[serde(default)]
    entry: Vec<CmrEntry>,
}

#[derive(Debug, Deserialize)]
struct CmrEntry {
    title: String,
    #[serde(default)]
    producer_granule_id: Option<String>,
    #[serde(default)]
    granule_size: Option<String>,
    #[serde(default)]
    links: Vec<CmrLink>,
}

#[derive(Debug, Deserialize)]
struct CmrLink {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    inherited: bool,
    href: String,
}

/// Client for the CMR granule catalog
pub struct CmrClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl CmrClient {
    pub fn new() -> ChlResult<Self> {
        Self::with_endpoint(CMR_SEARCH_URL)
    }

    /// Build a client against a non-default endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> ChlResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChlError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Page through the catalog until the result set is exhausted
    ///
    /// Paging uses the `CMR-Search-After` cursor header. An empty result
    /// set is an error since the pipeline has nothing to assemble.
    pub fn search_granules(&self, params: &SearchParams) -> ChlResult<Vec<Granule>> {
        log::info!(
            "Searching {} granules matching '{}' in {}",
            params.short_name,
            params.granule_pattern,
            params.temporal
        );

        let temporal = Self::temporal_query(&params.temporal);
        let page_size = params.page_size.to_string();

        let mut granules = Vec::new();
        let mut search_after: Option<String> = None;

        loop {
            let mut request = self.client.get(&self.endpoint).query(&[
                ("short_name", params.short_name.as_str()),
                ("temporal", temporal.as_str()),
                ("readable_granule_name", params.granule_pattern.as_str()),
                ("options[readable_granule_name][pattern]", "true"),
                ("sort_key", "start_date"),
                ("page_size", page_size.as_str()),
            ]);
            if let Some(ref cursor) = search_after {
                request = request.header("CMR-Search-After", cursor);
            }

            let response = request.send()?;
            if !response.status().is_success() {
                return Err(ChlError::Search(format!(
                    "CMR returned HTTP {} for {}",
                    response.status().as_u16(),
                    params.short_name
                )));
            }

            search_after = response
                .headers()
                .get("CMR-Search-After")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let page: CmrResponse = response.json()?;
            let count = page.feed.entry.len();
            for entry in page.feed.entry {
                granules.push(Self::to_granule(entry)?);
            }

            log::debug!("CMR page held {} granules", count);

            if count < params.page_size || search_after.is_none() {
                break;
            }
        }

        if granules.is_empty() {
            return Err(ChlError::Search(format!(
                "No granules found for {} matching '{}' in {}",
                params.short_name, params.granule_pattern, params.temporal
            )));
        }

        log::info!("Found {} granules", granules.len());
        Ok(granules)
    }

    /// Inclusive ISO 8601 window covering both endpoint days in full
    fn temporal_query(range: &TemporalRange) -> String {
        format!("{}T00:00:00Z,{}T23:59:59Z", range.start, range.end)
    }

    /// Map one catalog entry to a granule, picking its direct data link
    fn to_granule(entry: CmrEntry) -> ChlResult<Granule> {
        let name = entry
            .producer_granule_id
            .clone()
            .unwrap_or_else(|| entry.title.clone());

        let link = entry
            .links
            .iter()
            .find(|l| !l.inherited && l.rel.ends_with("/data#"))
            .ok_or_else(|| ChlError::Search(format!("Granule {} has no data link", name)))?;

        let size_mb = entry.granule_size.as_deref().and_then(|s| s.parse().ok());

        Ok(Granule {
            name,
            download_url: link.href.clone(),
            size_mb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "feed": {
            "updated": "2024-11-12T00:00:00.000Z",
            "id": "https://cmr.earthdata.nasa.gov:443/search/granules.json",
            "title": "ECHO granule metadata",
            "entry": [
                {
                    "producer_granule_id": "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc",
                    "time_start": "2024-06-04T00:00:00.000Z",
                    "updated": "2024-06-05T03:12:00.000Z",
                    "dataset_id": "PACE OCI Level-3 Global Mapped Chlorophyll (CHL)",
                    "title": "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc",
                    "granule_size": "23.71",
                    "links": [
                        {
                            "rel": "http://esipfed.org/ns/fedsearch/1.1/data#",
                            "title": "Download link",
                            "hreflang": "en-US",
                            "href": "https://obdaac-tea.earthdatacloud.nasa.gov/ob-cumulus-prod-public/PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc"
                        },
                        {
                            "rel": "http://esipfed.org/ns/fedsearch/1.1/metadata#",
                            "hreflang": "en-US",
                            "href": "https://cmr.earthdata.nasa.gov/search/concepts/G0000000-OB_CLOUD.xml"
                        },
                        {
                            "inherited": true,
                            "rel": "http://esipfed.org/ns/fedsearch/1.1/data#",
                            "hreflang": "en-US",
                            "href": "https://oceandata.sci.gsfc.nasa.gov/"
                        }
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_cmr_page() {
        let page: CmrResponse = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.feed.entry.len(), 1);

        let granule = CmrClient::to_granule(page.feed.entry.into_iter().next().unwrap()).unwrap();
        assert_eq!(
            granule.name,
            "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc"
        );
        // The inherited collection-level link must not win
        assert!(granule.download_url.starts_with("https://obdaac-tea."));
        assert_eq!(granule.size_mb, Some(23.71));
    }

    #[test]
    fn test_entry_without_data_link_fails() {
        let entry = CmrEntry {
            title: "PACE_OCI.20240604.L3m.DAY.CHL.V3_0.chlor_a.4km.NRT.nc".to_string(),
            producer_granule_id: None,
            granule_size: None,
            links: vec![CmrLink {
                rel: "http://esipfed.org/ns/fedsearch/1.1/metadata#".to_string(),
                inherited: false,
                href: "https://cmr.earthdata.nasa.gov/search/concepts/G1.xml".to_string(),
            }],
        };

        let err = CmrClient::to_granule(entry).unwrap_err();
        assert!(err.to_string().contains("no data link"));
    }

    #[test]
    fn test_temporal_query_covers_full_days() {
        let params = SearchParams::default();
        assert_eq!(
            CmrClient::temporal_query(&params.temporal),
            "2024-06-04T00:00:00Z,2024-11-11T23:59:59Z"
        );
    }

    #[test]
    fn test_default_params_match_collection() {
        let params = SearchParams::default();
        assert_eq!(params.short_name, "PACE_OCI_L3M_CHL");
        assert_eq!(params.granule_pattern, "*.DAY.*.4km.*");
    }
}
