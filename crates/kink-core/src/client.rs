use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::now_playing;
use crate::protocol::NowPlaying;

/// Timed HTTP access to the now-playing endpoint and to album art.
///
/// Every call takes its timeout explicitly; callers pass the poll interval.
/// There are no retries here, the next reconciliation tick is the retry.
#[derive(Clone)]
pub struct MetadataClient {
    http: Client,
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(concat!("kink-radio/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { http }
    }

    async fn get_ok(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        if resp.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(resp)
    }

    /// GET the document and decode it as JSON.
    pub async fn fetch_document(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        let resp = self.get_ok(url, timeout).await?;
        let body = resp.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// True iff the metadata endpoint answers HTTP 200 within `timeout`.
    pub async fn probe_connectivity(&self, url: &str, timeout: Duration) -> bool {
        match self.get_ok(url, timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Connectivity probe failed: {}", e);
                false
            }
        }
    }

    /// Current metadata for `station`.  A failed request or an undecodable
    /// body yields an empty record for the station, never an error.
    pub async fn fetch_now_playing(&self, url: &str, station: &str, timeout: Duration) -> NowPlaying {
        match self.fetch_document(url, timeout).await {
            Ok(doc) => now_playing::extract(&doc, station),
            Err(e) => {
                warn!("Now-playing fetch failed: {}", e);
                NowPlaying::empty_for(station)
            }
        }
    }

    /// Station ids offered by the endpoint, sorted.  Empty on failure.
    pub async fn list_stations(&self, url: &str, timeout: Duration) -> Vec<String> {
        match self.fetch_document(url, timeout).await {
            Ok(doc) => now_playing::station_ids(&doc),
            Err(e) => {
                warn!("Station list fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Raw bytes of an image, only on HTTP 200.
    pub async fn fetch_image(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let resp = self.get_ok(url, timeout).await?;
        let bytes = resp.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
