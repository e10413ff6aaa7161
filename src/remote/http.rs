//! HTTP cache service client
//!
//! Objects live at `{url}/cache/{blake3(key) as hex}`: `GET` reads, `PUT`
//! writes, `404` is a miss.

use super::RemoteCacheClient;
use crate::model::Checksum;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Authentication for the cache service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Auth {
    /// Sent as a bearer token
    Token(String),
    #[default]
    None,
}

/// Where and how to reach the cache service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub url: String,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RemoteSettings {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteSettings {
            url: url.into(),
            auth: Auth::None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Full object URL for a cache key
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/cache/{}",
            self.url.trim_end_matches('/'),
            Checksum::digest(key.as_bytes()).to_hex()
        )
    }
}

/// Blocking HTTP client for the cache service
#[cfg(feature = "remote")]
pub struct HttpCacheClient {
    settings: RemoteSettings,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpCacheClient {
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(HttpCacheClient { settings, client })
    }

    /// Add auth headers to a request
    fn add_auth(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.settings.auth {
            Auth::Token(token) => builder.header("Authorization", format!("Bearer {}", token)),
            Auth::None => builder,
        }
    }
}

#[cfg(feature = "remote")]
impl RemoteCacheClient for HttpCacheClient {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.settings.object_url(key);
        let response = self
            .add_auth(self.client.get(&url))
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(Error::Http(format!("GET {} failed: {} - {}", url, status, text)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let url = self.settings.object_url(key);
        let response = self
            .add_auth(self.client.put(&url))
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(Error::Http(format!("PUT {} failed: {} - {}", url, status, text)));
        }
        Ok(())
    }
}

/// Stub implementation when the remote feature is disabled
#[cfg(not(feature = "remote"))]
pub struct HttpCacheClient;

#[cfg(not(feature = "remote"))]
impl HttpCacheClient {
    pub fn new(_settings: RemoteSettings) -> Result<Self> {
        Err(Error::Config(
            "Remote feature not enabled. Compile with --features remote".into(),
        ))
    }
}

#[cfg(not(feature = "remote"))]
impl RemoteCacheClient for HttpCacheClient {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::Network("remote feature not enabled".into()))
    }

    fn put(&self, _key: &str, _data: Vec<u8>) -> Result<()> {
        Err(Error::Network("remote feature not enabled".into()))
    }
}
