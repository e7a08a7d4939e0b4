use std::time::Duration;

use reqwest::blocking::Client;

use super::ImageryError;

/// Fetches encoded image bytes for a URL. Called from worker threads.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError>;
}

/// Blocking HTTP source for the WMS endpoint
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError> {
        let fetch_err = |reason: String| ImageryError::Fetch { url: url.to_string(), reason };

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let bytes = resp.bytes().map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
