//! Thin client for the admin API: bulk status jobs and log queries.
//!
//! `AdminApi` is the seam the tools are written against; `AdminClient` is the
//! reqwest-backed implementation. Every GET goes through the configured
//! `RetryPolicy` (no retries by default) and every request carries a timeout.

use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::AdminConfig;
use crate::context::SiteContext;
use crate::job::{JobDetails, JobStart, JobStatus};
use crate::log_viewer::{LogEntry, LogRange, LogResponse};
use crate::retry::{with_retry, RetryPolicy};

/// Paths submitted with every bulk status job.
const BULK_STATUS_PATHS: &[&str] = &["/*"];

/// Header carrying the admin auth token.
const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Largest error body kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum AdminError {
    /// 401 from the admin API: not logged in or missing role
    Unauthorized,
    /// Any other non-success status
    Http { status: u16, body: String },
    /// Connection, TLS or timeout failure
    Network(String),
    /// The response body was not the expected JSON
    Parse(String),
    /// Invalid URL or client setup
    Config(String),
}

impl AdminError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdminError::Network(_) => true,
            AdminError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::Unauthorized => write!(f, "401 Unauthorized"),
            AdminError::Http { status, body } if body.is_empty() => {
                write!(f, "Admin API returned HTTP {status}")
            }
            AdminError::Http { status, body } => {
                write!(f, "Admin API returned HTTP {status}: {body}")
            }
            AdminError::Network(msg) => write!(f, "Admin API request failed: {msg}"),
            AdminError::Parse(msg) => write!(f, "Failed to parse admin API response: {msg}"),
            AdminError::Config(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdminError::Parse(e.to_string())
        } else {
            AdminError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// API seam
// ---------------------------------------------------------------------------

/// Operations the admin tools need from the remote service.
pub trait AdminApi: Send + Sync + 'static {
    /// `POST /status/{owner}/{repo}/{ref}/*` with `{"paths":["/*"]}`.
    fn start_status_job(
        &self,
        site: &SiteContext,
    ) -> impl Future<Output = Result<JobStart, AdminError>> + Send;

    /// `GET {job_url}`.
    fn job_status(&self, job_url: &str)
        -> impl Future<Output = Result<JobStatus, AdminError>> + Send;

    /// `GET {job_url}/details`.
    fn job_details(
        &self,
        job_url: &str,
    ) -> impl Future<Output = Result<JobDetails, AdminError>> + Send;

    /// `GET /log/{owner}/{repo}/{ref}?from&to`, entries in the order the
    /// service returned them (oldest first). 401 maps to `Unauthorized`.
    fn fetch_logs(
        &self,
        site: &SiteContext,
        range: &LogRange,
    ) -> impl Future<Output = Result<Vec<LogEntry>, AdminError>> + Send;

    /// Where an operator signs in to the admin API.
    fn login_url(&self) -> String;
}

// ---------------------------------------------------------------------------
// reqwest client
// ---------------------------------------------------------------------------

pub struct AdminClient {
    http: reqwest::Client,
    base: String,
    auth_token: Option<String>,
    retry: RetryPolicy,
}

impl AdminClient {
    pub fn new(config: &AdminConfig) -> Result<Self, AdminError> {
        url::Url::parse(config.api_base())
            .map_err(|e| AdminError::Config(format!("Invalid admin API base URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("sidekick-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdminError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: config.api_base().to_string(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
            retry: config.retry.clone(),
        })
    }

    /// Job links may be absolute or relative to the API base.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base, url.trim_start_matches('/'))
        }
    }

    fn status_url(&self, site: &SiteContext) -> String {
        format!(
            "{}/status/{}/{}/{}/*",
            self.base, site.owner, site.repo, site.git_ref
        )
    }

    fn log_url(&self, site: &SiteContext, range: &LogRange) -> Result<url::Url, AdminError> {
        let mut url = url::Url::parse(&format!(
            "{}/log/{}/{}/{}",
            self.base, site.owner, site.repo, site.git_ref
        ))
        .map_err(|e| AdminError::Config(format!("Invalid log URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("from", &range.from_param())
            .append_pair("to", &range.to_param());
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTH_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AdminError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status.as_u16() == 401 {
            return Err(AdminError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AdminError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, label: &str, url: &str) -> Result<T, AdminError> {
        tracing::debug!(request = label, url, "GET");
        with_retry(&self.retry, label, || self.send_json(self.http.get(url))).await
    }
}

impl AdminApi for AdminClient {
    async fn start_status_job(&self, site: &SiteContext) -> Result<JobStart, AdminError> {
        let url = self.status_url(site);
        tracing::debug!(%site, url, "starting bulk status job");
        let body = serde_json::json!({ "paths": BULK_STATUS_PATHS });
        self.send_json(self.http.post(&url).json(&body)).await
    }

    async fn job_status(&self, job_url: &str) -> Result<JobStatus, AdminError> {
        self.get_json("job_status", &self.resolve(job_url)).await
    }

    async fn job_details(&self, job_url: &str) -> Result<JobDetails, AdminError> {
        let url = format!("{}/details", self.resolve(job_url).trim_end_matches('/'));
        self.get_json("job_details", &url).await
    }

    async fn fetch_logs(
        &self,
        site: &SiteContext,
        range: &LogRange,
    ) -> Result<Vec<LogEntry>, AdminError> {
        let url = self.log_url(site, range)?;
        let response: Option<LogResponse> = self.get_json("fetch_logs", url.as_str()).await?;
        Ok(response.map(|r| r.entries).unwrap_or_default())
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.base)
    }
}
