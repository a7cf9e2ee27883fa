// Release index HTTP client
//
// Wraps `reqwest::Client` with index URL handling, status checking, and
// JSON decoding that keeps the raw body around for diagnostics.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

// ── Wire models ─────────────────────────────────────────────────────

/// A release as listed by the index.
///
/// Only the fields the cache needs are modelled; everything else in the
/// GitHub payload is ignored.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Release {
    /// Display name. GitHub sends `null` for releases without a title.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the release index and artifact downloads.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    index_url: Url,
    timeout: Duration,
}

impl ReleaseClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(index_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            index_url,
            timeout: transport.timeout,
        })
    }

    /// The release index URL.
    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    /// Fetch the release index, in server order.
    pub async fn list_releases(&self) -> Result<Vec<Release>, Error> {
        self.get_json(self.index_url.clone()).await
    }

    /// Download an artifact and return its body verbatim.
    pub async fn download(&self, url: &str) -> Result<Bytes, Error> {
        let url = Url::parse(url)?;
        let resp = self.send(url).await?;
        let body = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        debug!(bytes = body.len(), "artifact downloaded");
        Ok(body)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.send(url).await?;
        let body = resp.text().await.map_err(|e| self.map_transport(e))?;
        trace!(body_len = body.len(), "decoding JSON body");
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send a GET request and reject non-success statuses.
    async fn send(&self, url: Url) -> Result<reqwest::Response, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}
