//! REST source reader
//!
//! Reads one upstream collection with `GET {base_url}/{endpoint}?{case_param}={id}`
//! plus any static filter parameters configured for the source.
//!
//! All readers built by `http_source_set` share one HTTP client and one
//! rate limiter, so the configured requests-per-second applies to the
//! service as a whole.

use super::SourceSet;
use crate::types::{CaseId, RawResponse, SourceError, SourceKind, SourceReader};
use async_trait::async_trait;
use finca_common::config::{get_user_agent, SourcesConfig};
use finca_common::{Error, Result};
use governor::{Quota, RateLimiter};
use reqwest::{header, Client};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate limiter shared by every reader of one source set
pub type SharedRateLimiter = Arc<
    RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
>;

/// Build a limiter allowing `requests_per_second` requests
///
/// # Errors
/// `Error::Config` when `requests_per_second` is zero
pub fn rate_limiter(requests_per_second: u32) -> Result<SharedRateLimiter> {
    let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| {
        Error::Config("sources.requests_per_second must be at least 1".to_string())
    })?;
    Ok(Arc::new(RateLimiter::direct(Quota::per_second(rate))))
}

/// Build the HTTP client used by all source readers
///
/// # Errors
/// `Error::Internal` if the TLS backend cannot be initialised
pub fn build_client(config: &SourcesConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// `SourceReader` backed by a REST collection endpoint
pub struct HttpSourceReader {
    kind: SourceKind,
    client: Client,
    url: String,
    case_param: String,
    filter: Vec<(String, String)>,
    token: Option<String>,
    user_agent: String,
    timeout: Duration,
    rate_limiter: SharedRateLimiter,
}

impl HttpSourceReader {
    pub fn new(
        kind: SourceKind,
        client: Client,
        url: impl Into<String>,
        case_param: impl Into<String>,
        rate_limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            kind,
            client,
            url: url.into(),
            case_param: case_param.into(),
            filter: Vec::new(),
            token: None,
            user_agent: get_user_agent(),
            timeout: Duration::ZERO,
            rate_limiter,
        }
    }

    /// Static query parameters sent with every request
    pub fn with_filter(mut self, filter: Vec<(String, String)>) -> Self {
        self.filter = filter;
        self
    }

    /// Bearer token sent in the Authorization header
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Client timeout, used only to label timeout errors
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn transport_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.timeout.as_millis() as u64)
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SourceReader for HttpSourceReader {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, case_id: &CaseId) -> std::result::Result<RawResponse, SourceError> {
        self.rate_limiter.until_ready().await;

        debug!(source = %self.kind, case_id = %case_id, url = %self.url, "Querying source");

        let mut request = self
            .client
            .get(&self.url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT, "application/json")
            .query(&[(self.case_param.as_str(), case_id.as_str())]);
        if !self.filter.is_empty() {
            request = request.query(&self.filter);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// Join base URL and endpoint with exactly one slash
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Build the three REST readers described by `config`
///
/// # Errors
/// Returns error if the HTTP client or rate limiter cannot be built
pub fn http_source_set(config: &SourcesConfig, token: Option<String>) -> Result<SourceSet> {
    let client = build_client(config)?;
    let limiter = rate_limiter(config.requests_per_second)?;

    let reader = |kind: SourceKind, endpoint: &str| -> Arc<dyn SourceReader> {
        Arc::new(
            HttpSourceReader::new(
                kind,
                client.clone(),
                endpoint_url(&config.base_url, endpoint),
                config.case_param.clone(),
                Arc::clone(&limiter),
            )
            .with_filter(config.filter_for(kind.name()))
            .with_token(token.clone())
            .with_timeout(config.timeout()),
        )
    };

    SourceSet::new(
        reader(SourceKind::ParcelSurvey, &config.parcel_survey_endpoint),
        reader(SourceKind::ConstructionSurvey, &config.construction_survey_endpoint),
        reader(SourceKind::Deed, &config.deed_endpoint),
    )
}
