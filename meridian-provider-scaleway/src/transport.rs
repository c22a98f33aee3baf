//! Retrying HTTP transport
//!
//! Sits below the API client. Requests carry a fully buffered body so that
//! every attempt replays the same bytes. Connection failures, 5xx and 429
//! responses are retried with jittered exponential backoff; any other
//! response is handed back untouched for the client to classify.

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use tokio_util::sync::CancellationToken;

use crate::config::RetrySettings;
use crate::errors::{ScalewayError, ScalewayResult};

/// A request whose body is already in memory
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: reqwest::Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: reqwest::Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response whose body has been read completely
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport retrying connection errors, 5xx and 429
#[derive(Debug, Clone)]
pub struct RetryTransport {
    client: reqwest::Client,
    settings: RetrySettings,
    stop: CancellationToken,
}

impl RetryTransport {
    pub fn new(client: reqwest::Client, settings: RetrySettings) -> Self {
        Self {
            client,
            settings,
            stop: CancellationToken::new(),
        }
    }

    /// Abort pending backoffs when `stop` is cancelled
    pub fn with_cancellation(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Send the request, retrying as long as attempts and wait budget remain.
    /// The last response (or error) is returned verbatim.
    pub async fn send(&self, request: &HttpRequest) -> ScalewayResult<HttpResponse> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut waited = Duration::ZERO;
        let mut attempt = 1;

        loop {
            let outcome = self.attempt(request).await;

            let retry_after = match &outcome {
                Ok(response) if is_retryable_status(response.status) => {
                    parse_retry_after(&response.headers)
                }
                Ok(_) => return outcome,
                Err(ScalewayError::Transport(_)) => None,
                Err(_) => return outcome,
            };

            if attempt >= max_attempts {
                return outcome;
            }

            let wait = retry_after.unwrap_or_else(|| self.backoff(attempt));
            if waited + wait > self.settings.max_total_wait {
                log::debug!(
                    "{} {}: retry budget of {:?} exhausted",
                    request.method,
                    request.url,
                    self.settings.max_total_wait
                );
                return outcome;
            }

            match &outcome {
                Ok(response) => log::debug!(
                    "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                    request.method,
                    request.url,
                    response.status,
                    wait,
                    attempt,
                    max_attempts
                ),
                Err(e) => log::debug!(
                    "{} {} failed: {}, retrying in {:?} (attempt {}/{})",
                    request.method,
                    request.url,
                    e,
                    wait,
                    attempt,
                    max_attempts
                ),
            }

            if !wait.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.stop.cancelled() => {
                        return Err(ScalewayError::Cancelled(format!("{} {}", request.method, request.url)));
                    }
                }
            }

            waited += wait;
            attempt += 1;
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> ScalewayResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(ScalewayError::transport)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ScalewayError::transport)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Jittered exponential backoff for the given attempt (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .settings
            .min_wait
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let ceiling = self.settings.max_wait.max(self.settings.min_wait);
        let capped = exp.min(ceiling);

        let millis = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Duration::ZERO;
        }
        // Jitter upward so the first wait is never shorter than min_wait
        let jittered = rand::thread_rng().gen_range(millis..=millis.saturating_add(millis / 2));
        Duration::from_millis(jittered).min(ceiling)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Seconds form of `Retry-After`
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
