//! # Status Lookup
//!
//! The poller never talks to the network directly. It asks a [`StatusLookup`]
//! for the current status of a transaction once per tick, which keeps the
//! polling logic testable with in-memory implementations.
//!
//! [`HttpStatusLookup`] is the production implementation, querying the REST
//! backend's transaction-status endpoint.

use crate::{
    config::BackendConfig,
    error::LookupError,
    status::{TxId, TxStatus},
};
use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::Deserialize;

/// A source of truth for transaction statuses.
///
/// Implementations must be safe to call repeatedly for the same identifier.
#[async_trait]
pub trait StatusLookup: Send + Sync {
    /// Fetches the current status of `id`.
    async fn lookup_status(&self, id: &TxId) -> Result<TxStatus, LookupError>;
}

/// Queries `GET {base_url}{status_path}` on the REST backend.
#[derive(Debug, Clone)]
pub struct HttpStatusLookup {
    client: Client,
    base_url: Url,
    template: PathTemplate,
    auth_token: Option<String>,
}

/// `status_path` split around its `{id}` placeholder.
///
/// The identifier always lands in a single path segment, together with any
/// literal text sharing that segment in the template (e.g. `tx-{id}.json`).
#[derive(Debug, Clone)]
struct PathTemplate {
    leading: Vec<String>,
    segment_prefix: String,
    segment_suffix: String,
    trailing: Vec<String>,
}

impl PathTemplate {
    fn parse(status_path: &str) -> Self {
        // Without a placeholder the identifier becomes the last segment.
        let (before, after) = match status_path.split_once("{id}") {
            Some((before, after)) => (before.to_string(), after),
            None => (format!("{}/", status_path.trim_end_matches('/')), ""),
        };

        let mut leading: Vec<String> = before.split('/').map(str::to_string).collect();
        let segment_prefix = leading.pop().unwrap_or_default();
        leading.retain(|s| !s.is_empty());

        let mut trailing = after.split('/').map(str::to_string);
        let segment_suffix = trailing.next().unwrap_or_default();
        let trailing = trailing.filter(|s| !s.is_empty()).collect();

        Self {
            leading,
            segment_prefix,
            segment_suffix,
            trailing,
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

impl HttpStatusLookup {
    pub fn new(config: &BackendConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Self::with_client(client, config)
    }

    /// Builds a lookup around an existing `reqwest` client, e.g. one shared
    /// with the rest of the application.
    pub fn with_client(client: Client, config: &BackendConfig) -> Result<Self, LookupError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| LookupError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::InvalidUrl(format!(
                "{}: cannot carry a path",
                config.base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            template: PathTemplate::parse(&config.status_path),
            auth_token: config.auth_token.clone(),
        })
    }

    /// The URL queried for `id`.
    ///
    /// The identifier is percent-encoded as one path segment, so `/`, `?`,
    /// `#` and `%` in it never change which resource is addressed. A segment
    /// that would be exactly `.` or `..` has no encoded form and is rejected.
    pub fn status_url(&self, id: &TxId) -> Result<Url, LookupError> {
        let segment = format!(
            "{}{}{}",
            self.template.segment_prefix,
            id.as_str(),
            self.template.segment_suffix
        );
        if segment == "." || segment == ".." {
            return Err(LookupError::InvalidUrl(format!(
                "identifier '{}' cannot be addressed as a path segment",
                id
            )));
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                LookupError::InvalidUrl(format!("{}: cannot carry a path", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(&self.template.leading)
                .push(&segment)
                .extend(&self.template.trailing);
        }
        Ok(url)
    }
}

#[async_trait]
impl StatusLookup for HttpStatusLookup {
    async fn lookup_status(&self, id: &TxId) -> Result<TxStatus, LookupError> {
        let url = self.status_url(id)?;
        let mut request = self.client.get(url).header(header::ACCEPT, "application/json");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let code = response.status();
        if !code.is_success() {
            return Err(LookupError::HttpStatus(code.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: StatusResponse =
            serde_json::from_slice(&body).map_err(|e| LookupError::Decode(e.to_string()))?;
        parsed.status.parse()
    }
}
