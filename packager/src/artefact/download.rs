//! Release archive and documentation downloads.
//!
//! Provides a trait-based abstraction over HTTP so the fetcher can be tested
//! without network access. The production [`HttpDownloader`] retries
//! transient failures (transport errors and 5xx responses) with exponential
//! backoff; a 404 is reported immediately as [`DownloadError::NotFound`].

use std::path::Path;
use std::time::Duration;

/// Trait for downloading release assets.
///
/// # Examples
///
/// ```
/// use native_packager::artefact::download::{HttpDownloader, RetryPolicy};
/// use std::time::Duration;
///
/// let downloader = HttpDownloader::new(Duration::from_secs(30), RetryPolicy::none());
/// // Use downloader.download_to_file(url, dest) in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader: Send + Sync {
    /// Download `url` and write the body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] on HTTP 404,
    /// [`DownloadError::HttpError`] on other request failures, and
    /// [`DownloadError::Io`] if `dest` cannot be written.
    fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;

    /// Download `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// As for [`ArtefactDownloader::download_to_file`].
    fn download_text(&self, url: &str) -> Result<String, DownloadError>;
}

/// Errors arising from download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// HTTP status, when the server answered.
        status: Option<u16>,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested asset was not found (HTTP 404).
    #[error("asset not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether retrying the request may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::artefact::download::DownloadError;
    ///
    /// let err = DownloadError::HttpError {
    ///     url: "https://example.test".into(),
    ///     status: Some(503),
    ///     reason: "unavailable".into(),
    /// };
    /// assert!(err.is_transient());
    /// assert!(!DownloadError::NotFound { url: "https://example.test".into() }.is_transient());
    /// ```
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status: None, .. } => true,
            Self::HttpError {
                status: Some(code), ..
            } => (500..600).contains(code),
            Self::NotFound { .. } | Self::Io(_) => false,
        }
    }
}

/// Retry schedule for transient download failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// Retry up to `retries` times, doubling the delay from `initial_backoff`.
    #[must_use]
    pub fn new(retries: u32, initial_backoff: Duration) -> Self {
        Self {
            retries,
            initial_backoff,
        }
    }

    /// Never retry.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use native_packager::artefact::download::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(1));
    /// assert_eq!(policy.backoff(0), Duration::from_secs(1));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(4));
    /// ```
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Run `op`, retrying transient failures and sleeping through `sleep`.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-transient error.
    pub fn run<T>(
        &self,
        url: &str,
        mut op: impl FnMut() -> Result<T, DownloadError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, DownloadError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retries => {
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "download of {url} failed ({err}); retrying in {}ms",
                        delay.as_millis()
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// HTTP-based downloader using a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl HttpDownloader {
    /// Create a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            retry,
        }
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        log::debug!("GET {url} -> {}", dest.display());
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        let copied = std::io::copy(&mut response.into_body().as_reader(), &mut file);
        if let Err(e) = copied {
            drop(file);
            let _ = std::fs::remove_file(dest);
            return Err(DownloadError::HttpError {
                url: url.to_owned(),
                status: None,
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                status: None,
                reason: e.to_string(),
            })
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.retry
            .run(url, || self.fetch_to_file(url, dest), std::thread::sleep)
    }

    fn download_text(&self, url: &str) -> Result<String, DownloadError> {
        self.retry
            .run(url, || self.fetch_text(url), std::thread::sleep)
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(code) => DownloadError::HttpError {
            url: url.to_owned(),
            status: Some(*code),
            reason: format!("HTTP status {code}"),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            status: None,
            reason: other.to_string(),
        },
    }
}
