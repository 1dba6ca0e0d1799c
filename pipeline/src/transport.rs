use crate::config::{EndpointConfig, TransportConfig};
use crate::endpoint::Endpoint;
use crate::errors::{ConfigError, DeliveryError};
use crate::event::LogEvent;
use crate::metrics_defs::{REQUEST_RETRIES, REQUESTS_REJECTED};
use async_trait::async_trait;
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use shared::counter;
use sigv4::{AMZ_DATE_HEADER, Credentials, SignableRequest};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Action line preceding every document of a bulk request.
pub const BULK_ACTION_LINE: &str = r#"{"index":{}}"#;

const CONTENT_TYPE_JSON: &str = "application/json";

// Response bodies are kept in errors for diagnostics only.
const MAX_RESPONSE_EXCERPT: usize = 512;

const SINGLE_ACCEPTED: &[StatusCode] = &[StatusCode::CREATED];
const BULK_ACCEPTED: &[StatusCode] = &[StatusCode::CREATED, StatusCode::OK];

/// Delivers documents to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Indexes one document.
    async fn post(&self, endpoint: &Endpoint, event: &LogEvent) -> Result<(), DeliveryError>;

    /// Indexes `events` in a single bulk request, in order.
    async fn post_bulk(
        &self,
        endpoint: &Endpoint,
        events: &[LogEvent],
    ) -> Result<(), DeliveryError>;
}

/// NDJSON body of a bulk request: an action line and a document line per
/// event, every line newline terminated.
pub fn bulk_body(events: &[LogEvent]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for event in events {
        body.push_str(BULK_ACTION_LINE);
        body.push('\n');
        body.push_str(&event.to_document()?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `retries` (0 based).
    pub fn delay(&self, retries: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(retries))
    }
}

/// `Transport` over HTTP. Requests are signed with SigV4 when AWS
/// credentials are configured, otherwise they carry basic auth if the
/// endpoint has user info.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        endpoint_config: &EndpointConfig,
        config: &TransportConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(HttpTransport {
            client,
            credentials: endpoint_config.aws_credentials()?,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay(),
            },
        })
    }

    pub fn is_signing(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Vec<u8>,
        accepted: &[StatusCode],
    ) -> Result<(), DeliveryError> {
        let mut retries = 0;

        loop {
            match self.send_once(endpoint, &body, accepted).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && retries < self.retry.max_retries => {
                    let delay = self.retry.delay(retries);
                    warn!(
                        "Attempt {} to {endpoint} failed, retrying in {delay:?}: {err}",
                        retries + 1
                    );
                    counter!(REQUEST_RETRIES).increment(1);
                    sleep(delay).await;
                    retries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    // Headers are rebuilt on every attempt so a retry carries a fresh
    // signature and date.
    fn headers(&self, endpoint: &Endpoint, body: &[u8]) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));

        if let Some(credentials) = &self.credentials {
            let now = Utc::now();
            headers.insert(
                AMZ_DATE_HEADER,
                HeaderValue::from_str(&sigv4::amz_date(now))?,
            );

            let url = endpoint.request_url();
            let authority = endpoint.authority();
            let request = SignableRequest {
                method: "POST",
                authority: &authority,
                path: url.path(),
                query: url.query(),
                headers: &headers,
                body,
            };
            let signature = sigv4::sign(&request, credentials, now);

            let mut authorization = HeaderValue::from_str(&signature.authorization)?;
            authorization.set_sensitive(true);
            headers.insert(AUTHORIZATION, authorization);
        } else if let Some(basic_auth) = endpoint.basic_auth() {
            headers.insert(AUTHORIZATION, basic_auth.header_value()?);
        }

        Ok(headers)
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        body: &[u8],
        accepted: &[StatusCode],
    ) -> Result<(), DeliveryError> {
        let headers = self.headers(endpoint, body)?;

        let response = self
            .client
            .post(endpoint.request_url())
            .headers(headers)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                endpoint: endpoint.to_string(),
                body_size: body.len(),
                source,
            })?;

        let status = response.status();
        if accepted.contains(&status) {
            debug!("{endpoint} accepted {} bytes with {status}", body.len());
            return Ok(());
        }

        counter!(REQUESTS_REJECTED, "status" => status.as_u16().to_string()).increment(1);
        let mut excerpt = response.text().await.unwrap_or_default();
        if excerpt.len() > MAX_RESPONSE_EXCERPT {
            let mut cut = MAX_RESPONSE_EXCERPT;
            while !excerpt.is_char_boundary(cut) {
                cut -= 1;
            }
            excerpt.truncate(cut);
        }

        Err(DeliveryError::Rejected {
            endpoint: endpoint.to_string(),
            status,
            body_size: body.len(),
            response: excerpt,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &Endpoint, event: &LogEvent) -> Result<(), DeliveryError> {
        let body = event.to_document()?.into_bytes();
        self.send(endpoint, body, SINGLE_ACCEPTED).await
    }

    async fn post_bulk(
        &self,
        endpoint: &Endpoint,
        events: &[LogEvent],
    ) -> Result<(), DeliveryError> {
        if events.is_empty() {
            return Ok(());
        }
        let body = bulk_body(events)?.into_bytes();
        self.send(endpoint, body, BULK_ACCEPTED).await
    }
}
