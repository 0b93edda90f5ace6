//! HTTP fetch adapter for the stable-version marker and the binary download.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

/// Fetches a URL and returns the response body.
///
/// Non-success statuses are errors; there is no retry.
pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`HttpFetch`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("provisioner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    #[instrument(skip(self))]
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let body = response
            .bytes()
            .with_context(|| format!("read body of {url}"))?;
        debug!(bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}
