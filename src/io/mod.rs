//! I/O modules for Earthdata access, granule search, download, and export

pub mod auth;
pub mod export;
pub mod fetch;
pub mod search;

pub use auth::{Credentials, EarthdataAuth};
pub use export::SliceWriter;
pub use fetch::GranuleFetcher;
pub use search::{CmrClient, SearchParams};

/// User agent sent on every outbound request
pub(crate) const USER_AGENT: &str = "chlora/0.1.0 (PACE Chlorophyll Pipeline)";
