//! Install file downloads.

use std::io::Write;

use reqwest::blocking::Client;
use reqwest::Proxy;
use tracing::{debug, info};

use crate::error::CharmError;

use super::traits::Fetcher;

/// Fetcher backed by a blocking HTTP client.
#[derive(Debug, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn client(url: &str, proxy: Option<&str>) -> Result<Client, CharmError> {
        let mut builder = Client::builder();
        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy).map_err(|e| CharmError::Download {
                url: url.to_string(),
                message: format!("Invalid proxy '{}': {}", proxy, e),
            })?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| CharmError::Download {
            url: url.to_string(),
            message: format!("Failed to build HTTP client: {}", e),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&mut self, url: &str, proxy: Option<&str>, dest: &mut dyn Write) -> Result<u64, CharmError> {
        debug!(url = %url, proxied = proxy.is_some(), "Downloading install file");

        let download_error = |message: String| CharmError::Download {
            url: url.to_string(),
            message,
        };

        let mut response = Self::client(url, proxy)?
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!("HTTP status {}", response.status())));
        }

        let bytes = response
            .copy_to(dest)
            .map_err(|e| download_error(e.to_string()))?;

        info!(url = %url, bytes = bytes, "Install file downloaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_proxy_is_download_error() {
        let result = HttpFetcher::client("http://example.invalid/cadvisor.deb", Some("::not a proxy::"));
        assert!(matches!(result, Err(CharmError::Download { .. })));
    }
}
