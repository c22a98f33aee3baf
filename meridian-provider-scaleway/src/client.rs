//! JSON API client
//!
//! Issues authenticated JSON requests through the [`RetryTransport`], decodes
//! error envelopes into [`ApiError`] and walks paginated list endpoints.

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, RetrySettings};
use crate::errors::{ApiError, ScalewayError, ScalewayResult};
use crate::transport::{HttpRequest, HttpResponse, RetryTransport};

const AUTH_HEADER: &str = "x-auth-token";
const PAGE_SIZE: u32 = 100;

/// Client for the Scaleway JSON APIs
#[derive(Debug, Clone)]
pub struct ScalewayClient {
    transport: RetryTransport,
    api_url: String,
    secret_key: String,
}

impl ScalewayClient {
    pub fn new(api_url: impl Into<String>, secret_key: impl Into<String>, settings: RetrySettings) -> Self {
        Self {
            transport: RetryTransport::new(reqwest::Client::new(), settings),
            api_url: api_url.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.api_url.clone(), config.secret_key.clone(), config.retry)
    }

    /// Abort retry backoffs when `stop` is cancelled
    pub fn with_cancellation(mut self, stop: CancellationToken) -> Self {
        self.transport = self.transport.with_cancellation(stop);
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ScalewayResult<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ScalewayResult<T> {
        let response = self.execute(Method::GET, path, query, None).await?;
        decode(&response)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ScalewayResult<T> {
        let response = self.execute(Method::POST, path, &[], Some(encode(body)?)).await?;
        decode(&response)
    }

    /// POST whose response body is ignored
    pub async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> ScalewayResult<()> {
        self.execute(Method::POST, path, &[], Some(encode(body)?)).await?;
        Ok(())
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ScalewayResult<T> {
        let response = self.execute(Method::PATCH, path, &[], Some(encode(body)?)).await?;
        decode(&response)
    }

    pub async fn delete(&self, path: &str) -> ScalewayResult<()> {
        self.delete_with_query(path, &[]).await
    }

    pub async fn delete_with_query(&self, path: &str, query: &[(&str, String)]) -> ScalewayResult<()> {
        self.execute(Method::DELETE, path, query, None).await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint.
    ///
    /// `collection` is the key holding the items (e.g. `"ips"`); iteration
    /// stops once `total_count` items were read or a page comes back empty.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        collection: &str,
        filters: &[(&str, String)],
    ) -> ScalewayResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query: Vec<(&str, String)> = filters.to_vec();
            query.push(("page", page.to_string()));
            query.push(("per_page", PAGE_SIZE.to_string()));

            let mut body: serde_json::Value = self.get_with_query(path, &query).await?;
            let total = body.get("total_count").and_then(serde_json::Value::as_u64);
            let page_items = match body.get_mut(collection).map(serde_json::Value::take) {
                Some(serde_json::Value::Array(values)) => values,
                Some(serde_json::Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(ScalewayError::Decode(format!(
                        "expected an array at {}, got {}",
                        collection, other
                    )));
                }
            };

            let fetched = page_items.len();
            for item in page_items {
                items.push(serde_json::from_value(item)?);
            }

            let done = match total {
                Some(total) => items.len() as u64 >= total,
                None => fetched < PAGE_SIZE as usize,
            };
            if done || fetched == 0 {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> ScalewayResult<HttpResponse> {
        let base = format!("{}{}", self.api_url.trim_end_matches('/'), path);
        let url = if query.is_empty() {
            reqwest::Url::parse(&base)
        } else {
            reqwest::Url::parse_with_params(&base, query.iter().map(|(k, v)| (*k, v.as_str())))
        }
        .map_err(|e| ScalewayError::InvalidInput(format!("invalid url {}: {}", base, e)))?;

        let token = HeaderValue::from_str(&self.secret_key)
            .map_err(|_| ScalewayError::config("secret_key contains invalid characters"))?;

        let mut request = HttpRequest::new(method, url)
            .header(HeaderName::from_static(AUTH_HEADER), token)
            .header(USER_AGENT, HeaderValue::from_static(concat!("meridian-provider-scaleway/", env!("CARGO_PKG_VERSION"))));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        log::debug!("{} {}", request.method, request.url);
        let response = self.transport.send(&request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ScalewayError::Api(api_error(&response)))
        }
    }
}

fn encode<B: Serialize>(body: &B) -> ScalewayResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| ScalewayError::InvalidInput(format!("cannot encode request: {}", e)))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> ScalewayResult<T> {
    let body: &[u8] = if response.body.is_empty() { b"null" } else { &response.body };
    Ok(serde_json::from_slice(body)?)
}

/// Decode the error envelope; a body that is not one becomes the message
fn api_error(response: &HttpResponse) -> ApiError {
    let mut error = serde_json::from_slice::<ApiError>(&response.body).unwrap_or_else(|_| {
        ApiError::new(
            response.status,
            String::from_utf8_lossy(&response.body).trim().to_string(),
        )
    });
    error.status = response.status;
    error
}
