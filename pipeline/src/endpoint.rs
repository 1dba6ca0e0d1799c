use crate::config::EndpointConfig;
use crate::errors::ConfigError;
use crate::event::DOCUMENT_TYPE;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use http::HeaderValue;
use std::fmt;
use url::Url;

const BULK_SEGMENT: &str = "_bulk";

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl BasicAuth {
    /// `Basic base64(user:password)`
    pub fn header_value(&self) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {token}"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A resolved target for one flush.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    basic_auth: Option<BasicAuth>,
    bulk: bool,
}

impl Endpoint {
    /// Full URL, including user info when basic auth is configured.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL the request is sent to. Credentials travel in the
    /// `Authorization` header instead.
    pub fn request_url(&self) -> Url {
        let mut url = self.url.clone();
        // Both only fail for URLs without a host, which resolve rejects.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    pub fn is_bulk(&self) -> bool {
        self.bulk
    }

    /// `host[:port]` as sent in the `Host` header. Default ports are omitted.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Effective index name, including the rolling date suffix.
    pub fn index(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .unwrap_or_default()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.url.password().is_none() {
            return write!(f, "{}", self.url);
        }
        let mut redacted = self.url.clone();
        let _ = redacted.set_password(Some("***"));
        write!(f, "{redacted}")
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({self})")
    }
}

/// Index name for `now`. Rolling indices get a `-yyyy.MM.dd` suffix in UTC.
pub fn effective_index(config: &EndpointConfig, now: DateTime<Utc>) -> String {
    if config.rolling {
        format!("{}-{}", config.index, now.format("%Y.%m.%d"))
    } else {
        config.index.clone()
    }
}

/// Builds `scheme://[user:pass@]host[:port]/index[-yyyy.MM.dd]/uwLogEvent[/_bulk]`.
///
/// Called for every flush so rolling indices follow the clock.
pub fn resolve(config: &EndpointConfig, now: DateTime<Utc>) -> Result<Endpoint, ConfigError> {
    let authority = match config.port {
        Some(port) => format!("{}:{port}", config.server.trim()),
        None => config.server.trim().to_string(),
    };
    let index = effective_index(config, now);
    let bulk = config.buffer_size > 1;
    let suffix = if bulk {
        format!("/{BULK_SEGMENT}")
    } else {
        String::new()
    };

    let raw = format!(
        "{}://{authority}/{index}/{DOCUMENT_TYPE}{suffix}",
        config.scheme
    );
    let mut url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(raw.clone(), e))?;

    let basic_auth = match config.basic_auth() {
        Some((user, password)) => {
            url.set_username(user)
                .and_then(|()| url.set_password(Some(password)))
                .map_err(|()| ConfigError::InvalidCredentials(raw.clone()))?;
            Some(BasicAuth {
                user: user.to_string(),
                password: password.to_string(),
            })
        }
        None => None,
    };

    Ok(Endpoint {
        url,
        basic_auth,
        bulk,
    })
}
