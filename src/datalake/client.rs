use crate::errors::{AppError, AppResult};
use crate::models::AccessGrant;
use std::time::Duration;
use url::Url;

/// HTTP client bound to one container URL.
///
/// The URL carries the access token as its query string; every request this
/// client builds preserves that query, so the grant travels with each call.
#[derive(Debug, Clone)]
pub struct ContainerClient {
    http: reqwest::Client,
    container_url: Url,
}

impl ContainerClient {
    /// Builds a client from an access grant with a per-request timeout.
    ///
    /// The grant is taken by reference and copied; callers keep ownership so
    /// each execution unit can hold its own.
    pub fn from_grant(grant: &AccessGrant, timeout: Duration) -> AppResult<Self> {
        Self::from_container_url(grant.container_url.clone(), timeout)
    }

    /// Builds a client from a raw container URL (token already in the query).
    pub fn from_container_url(container_url: Url, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            container_url,
        })
    }

    pub fn container_url(&self) -> &Url {
        &self.container_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// URL for one page of a prefix listing, with an optional continuation
    /// marker from the previous page.
    pub(crate) fn list_page_url(&self, prefix: &str, marker: Option<&str>) -> Url {
        let mut url = self.container_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("prefix", prefix);
            if let Some(marker) = marker {
                pairs.append_pair("marker", marker);
            }
        }
        url
    }

    /// URL for one object, the token query kept intact.
    pub(crate) fn object_url(&self, name: &str) -> AppResult<Url> {
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::TransferError(format!(
                    "Container URL cannot address object '{name}'"
                ))
            })?
            .pop_if_empty()
            .extend(name.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}
