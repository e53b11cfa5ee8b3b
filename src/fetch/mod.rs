// src/fetch/mod.rs

pub mod tables;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::{path::Path, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{CorrectionError, Result};

pub use tables::{extract_table, list_tables, Layout, TableSelection, TableSummary};

/// Where the rate page's HTML comes from.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_html(&self) -> Result<String>;

    /// Label for logs and error messages.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: TableSource + ?Sized> TableSource for Box<T> {
    async fn fetch_html(&self) -> Result<String> {
        (**self).fetch_html().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Upper bound on extra attempts after a transient failure.
pub const MAX_RETRIES: u32 = 3;

/// Whether a failed attempt is worth repeating.
struct Failure {
    error: CorrectionError,
    transient: bool,
}

/// Plain HTTP GET of the rate page.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpSource {
    /// `max_retries` is clamped to [`MAX_RETRIES`].
    pub fn new(url: &str, timeout: Duration, user_agent: &str, max_retries: u32) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| CorrectionError::Config(format!("invalid url {url:?}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| CorrectionError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            max_retries: max_retries.min(MAX_RETRIES),
            initial_backoff: Duration::from_millis(500),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.url,
            Duration::from_secs(settings.timeout_secs),
            &settings.user_agent,
            settings.max_retries,
        )
    }

    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    fn failure(&self, status: Option<u16>, reason: impl ToString, transient: bool) -> Failure {
        Failure {
            error: CorrectionError::fetch(self.url.as_str(), status, reason),
            transient,
        }
    }

    async fn get_text_core(&self) -> std::result::Result<String, Failure> {
        debug!(url = %self.url, "fetching rate page");
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                self.failure(None, reason, true)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let transient =
                status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            return Err(self.failure(
                Some(status.as_u16()),
                format!("HTTP {status}"),
                transient,
            ));
        }

        resp.text()
            .await
            .map_err(|e| self.failure(Some(status.as_u16()), format!("reading body: {e}"), true))
    }

    async fn get_text_with_retry(&self) -> Result<String> {
        let mut attempts = 0;
        loop {
            match self.get_text_core().await {
                Ok(t) => return Ok(t),
                Err(f) if f.transient && attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = self.initial_backoff * 2u32.pow(attempts - 1);
                    warn!(url = %self.url, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %f.error, "Retrying");
                    sleep(backoff).await;
                }
                Err(f) => {
                    error!(url = %self.url, attempts = attempts + 1, error = %f.error, "fetch failed");
                    return Err(f.error);
                }
            }
        }
    }
}

#[async_trait]
impl TableSource for HttpSource {
    #[instrument(level = "info", skip(self), fields(url = %self.url))]
    async fn fetch_html(&self) -> Result<String> {
        self.get_text_with_retry().await
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// HTML already in memory: a saved copy of the page, or a test fixture.
#[derive(Debug, Clone)]
pub struct StaticSource {
    label: String,
    html: String,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            html: html.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path)
            .map_err(|e| CorrectionError::fetch(path.display().to_string(), None, e))?;
        Ok(Self::new(path.display().to_string(), html))
    }
}

#[async_trait]
impl TableSource for StaticSource {
    async fn fetch_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
