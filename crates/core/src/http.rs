//! HTTP transport
//!
//! All remote fetches (manifest, base package, loader installer) go through
//! the [`HttpClient`] trait so that tests can substitute [`MockHttpClient`]
//! for the reqwest-backed implementation.

use crate::errors::NetworkError;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Progress of a streaming download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Advertised content length; `None` when the server sent none
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completed percentage, when the total is known
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.downloaded as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// Callback observing download progress
pub type ProgressCallback<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// HTTP client trait for launcher downloads
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and return the whole response body
    async fn get_bytes(&self, url: &str) -> Result<Bytes, NetworkError>;

    /// Stream a GET response body into `dest`, returning the number of bytes written.
    ///
    /// The file is flushed and closed before this returns.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<u64, NetworkError>;
}

/// Default HTTP client implementation using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default configuration (no timeout)
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_timeout(None)
    }

    /// Create a new ReqwestClient with an optional overall request timeout
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, NetworkError> {
        let mut client_builder = reqwest::Client::builder().user_agent(concat!(
            "blocklaunch/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(timeout_duration) = timeout {
            client_builder = client_builder.timeout(timeout_duration);
            debug!(
                "Configured HTTP client with timeout: {:?}",
                timeout_duration
            );
        }

        let client = client_builder.build().map_err(|e| NetworkError::Transport {
            url: String::new(),
            message: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        if !response.status().is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

/// Improve error messages for common network issues
fn transport_error(url: &str, e: &reqwest::Error) -> NetworkError {
    let message = if e.is_timeout() {
        "request timed out. Check network connectivity.".to_string()
    } else if e.is_connect() {
        "connection failed. Check that the server is reachable and network connectivity is available.".to_string()
    } else if e.is_body() || e.is_decode() {
        format!("failed to read response body: {}", e)
    } else {
        e.to_string()
    };
    NetworkError::Transport {
        url: url.to_string(),
        message,
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestClient {
    #[instrument(skip(self))]
    async fn get_bytes(&self, url: &str) -> Result<Bytes, NetworkError> {
        let response = self.send(url).await?;
        response.bytes().await.map_err(|e| transport_error(url, &e))
    }

    #[instrument(skip(self, dest, on_progress), fields(dest = %dest.display()))]
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<u64, NetworkError> {
        let mut response = self.send(url).await?;
        let total = response.content_length();
        let io_err = |source| NetworkError::Io {
            url: url.to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut downloaded = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(url, &e))?
        {
            file.write_all(&chunk).await.map_err(io_err)?;
            downloaded += chunk.len() as u64;
            on_progress(DownloadProgress { downloaded, total });
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(downloaded)
    }
}

#[derive(Debug, Clone)]
struct MockResponse {
    status: u16,
    body: Bytes,
    advertise_length: bool,
}

/// Mock HTTP client for testing
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `body` with a 200 status and a content length
    pub async fn add_response(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.insert(url.into(), 200, body.into(), true).await;
    }

    /// Serve `body` with a 200 status but without a content length
    pub async fn add_response_without_length(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
    ) {
        self.insert(url.into(), 200, body.into(), false).await;
    }

    /// Answer `url` with an error status
    pub async fn add_status(&self, url: impl Into<String>, status: u16) {
        self.insert(url.into(), status, Bytes::new(), true).await;
    }

    async fn insert(&self, url: String, status: u16, body: Bytes, advertise_length: bool) {
        let mut responses = self.responses.lock().await;
        responses.insert(
            url,
            MockResponse {
                status,
                body,
                advertise_length,
            },
        );
    }

    /// Number of requests made for `url`
    pub async fn request_count(&self, url: &str) -> usize {
        let requests = self.requests.lock().await;
        requests.iter().filter(|u| u.as_str() == url).count()
    }

    async fn respond(&self, url: &str) -> Result<MockResponse, NetworkError> {
        self.requests.lock().await.push(url.to_string());
        let responses = self.responses.lock().await;
        let response = responses
            .get(url)
            .cloned()
            .ok_or_else(|| NetworkError::Transport {
                url: url.to_string(),
                message: "no mock response registered".to_string(),
            })?;
        if !(200..300).contains(&response.status) {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn get_bytes(&self, url: &str) -> Result<Bytes, NetworkError> {
        Ok(self.respond(url).await?.body)
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressCallback<'_>,
    ) -> Result<u64, NetworkError> {
        let response = self.respond(url).await?;
        let total = response
            .advertise_length
            .then_some(response.body.len() as u64);
        let io_err = |source| NetworkError::Io {
            url: url.to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let chunk_size = (response.body.len() / 4).max(1);
        let mut downloaded = 0u64;
        for chunk in response.body.chunks(chunk_size) {
            file.write_all(chunk).await.map_err(io_err)?;
            downloaded += chunk.len() as u64;
            on_progress(DownloadProgress { downloaded, total });
        }
        file.flush().await.map_err(io_err)?;
        Ok(downloaded)
    }
}
