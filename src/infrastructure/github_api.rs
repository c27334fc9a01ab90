use super::error::ApiError;
use super::graphql::{GraphQlOperation, GraphQlRequest, GraphQlResponse};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub use reqwest::Method;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker for endpoints that answer with an empty body
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct EmptyResponse;

/// Error body GitHub attaches to most non-2xx REST responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[allow(dead_code)]
    documentation_url: Option<String>,
}

/// GitHub API client speaking both GraphQL and REST.
///
/// The token is supplied per call rather than baked into the client, so one
/// client serves every account in the credential store.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a client against `base_url` (e.g. `https://api.github.com`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidRequest("empty API base URL".to_string()));
        }

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `{query, variables}` to `/graphql` and unwrap the response envelope
    pub async fn execute_graphql<V, T>(
        &self,
        query: &str,
        variables: &V,
        token: &str,
    ) -> Result<T, ApiError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(format!("{}/graphql", self.base_url))
            .bearer_auth(token)
            .json(&GraphQlRequest { query, variables });

        let envelope: GraphQlResponse = self.send(request).await?;
        envelope.into_result()
    }

    /// Run a typed GraphQL operation
    pub async fn query<Q: GraphQlOperation>(
        &self,
        variables: &Q::Variables,
        token: &str,
    ) -> Result<Q::Data, ApiError> {
        debug!(operation = Q::NAME, "GraphQL request");
        self.execute_graphql(Q::QUERY, variables, token).await
    }

    /// Call a REST endpoint relative to the base URL
    pub async fn execute_rest<B, T>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
        token: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%method, endpoint, "REST request");
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, endpoint))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    /// Send a prepared request through status classification and decoding.
    /// Used directly by the OAuth token exchange, which targets another host.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        check_status(status, &headers, &body)?;
        decode(&body)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Map a non-2xx response onto the error taxonomy
fn check_status(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }

    let err = match status.as_u16() {
        401 => ApiError::Unauthorized,
        403 => ApiError::RateLimitExceeded {
            reset_at: headers
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok())
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
        },
        404 => ApiError::NotFound,
        code @ 500..=599 => ApiError::ServerError { status: code },
        code => ApiError::Http {
            status: code,
            message: serde_json::from_slice::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message),
        },
    };

    debug!(status = status.as_u16(), error = %err, "GitHub request failed");
    Err(err)
}

/// Decode a success body. An empty body decodes as JSON `null`, which
/// succeeds for "no content" types such as [`EmptyResponse`].
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null").map_err(|_| ApiError::NoData);
    }
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let value = serde_path_to_error::deserialize(&mut deserializer)?;
    deserializer
        .end()
        .map_err(|e| ApiError::DecodingFailed(e.to_string()))?;
    Ok(value)
}
