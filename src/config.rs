//! Configuration types for the Scipher client.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The backend location is the only knob most
//! callers touch, and it comes from a single environment variable
//! (`SCIPHER_API_URL`) with a localhost default.

use crate::error::ScipherError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "SCIPHER_API_URL";

/// Base URL used when `SCIPHER_API_URL` is unset or empty.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Largest file the upload gate accepts: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for a Scipher client.
///
/// Built via [`ClientConfig::builder()`], [`ClientConfig::from_env()`] or
/// [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use scipher_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://127.0.0.1:9000/")
///     .poll_interval_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "http://127.0.0.1:9000");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash. Default: `http://localhost:8080`.
    pub base_url: String,

    /// Delay between status queries while a document is processing. Default: 2000.
    ///
    /// Queries are serialised: the next one is only issued after the previous
    /// response has been handled, so a slow backend stretches the interval
    /// rather than stacking requests.
    pub poll_interval_ms: u64,

    /// Whole-request timeout in seconds. Default: 30.
    ///
    /// Applies to every call including the upload, so very slow links with
    /// large PDFs may need more.
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Upload size limit enforced before any network call. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Optional observer for session milestones.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn SessionProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with the base URL taken from `SCIPHER_API_URL` when set.
    pub fn from_env() -> Result<Self, ScipherError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                builder = builder.base_url(url);
            }
        }
        builder.build()
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientConfigBuilder")
            .field(&self.config)
            .finish()
    }
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ScipherError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ScipherError::InvalidConfig(format!("base URL '{}' is not valid: {e}", c.base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScipherError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.poll_interval_ms == 0 {
            return Err(ScipherError::InvalidConfig(
                "Poll interval must be ≥ 1 ms".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ScipherError::InvalidConfig(
                "Upload limit must be > 0 bytes".into(),
            ));
        }
        Ok(self.config)
    }
}
