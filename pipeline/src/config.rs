use crate::endpoint::resolve;
use crate::errors::ConfigError;
use chrono::Utc;
use serde::Deserialize;
use sigv4::Credentials;
use std::time::Duration;

fn default_scheme() -> String {
    "http".to_string()
}

fn default_buffer_size() -> usize {
    1
}

fn default_aws_service() -> String {
    "es".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

/// Where and how log events are indexed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EndpointConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub index: String,
    /// Append the current UTC date to the index name.
    #[serde(default)]
    pub rolling: bool,
    /// Number of events per flush. Values above 1 switch to the bulk API.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub aws_access_key: Option<String>,
    #[serde(default)]
    pub aws_secret_key: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default = "default_aws_service")]
    pub aws_service: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl EndpointConfig {
    pub fn new(server: impl Into<String>, index: impl Into<String>) -> Self {
        EndpointConfig {
            scheme: default_scheme(),
            server: server.into(),
            port: None,
            index: index.into(),
            rolling: false,
            buffer_size: default_buffer_size(),
            user: None,
            password: None,
            aws_access_key: None,
            aws_secret_key: None,
            aws_region: None,
            aws_service: default_aws_service(),
        }
    }

    /// User and password, when both are set.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        Some((present(&self.user)?, present(&self.password)?))
    }

    /// Signing credentials, when all three AWS settings are set. Setting
    /// only some of them is an error rather than silently sending unsigned
    /// requests.
    pub fn aws_credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        let access_key = present(&self.aws_access_key);
        let secret_key = present(&self.aws_secret_key);
        let region = present(&self.aws_region);

        match (access_key, secret_key, region) {
            (Some(access_key), Some(secret_key), Some(region)) => Ok(Some(Credentials::new(
                access_key,
                secret_key,
                region,
                self.aws_service.as_str(),
            ))),
            (None, None, None) => Ok(None),
            _ => {
                let missing = [
                    ("aws_access_key", access_key),
                    ("aws_secret_key", secret_key),
                    ("aws_region", region),
                ]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();
                Err(ConfigError::PartialAwsCredentials { missing })
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::MissingServer);
        }
        if self.index.trim().is_empty() {
            return Err(ConfigError::MissingIndex);
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(self.scheme.clone()));
        }
        if self.port == Some(0) {
            return Err(ConfigError::InvalidPort);
        }
        if present(&self.user).is_some() != present(&self.password).is_some() {
            return Err(ConfigError::PartialBasicAuth);
        }
        if self.aws_credentials()?.is_some() && self.basic_auth().is_some() {
            return Err(ConfigError::ConflictingAuth);
        }
        // The URL only changes with the rolling date, so a server or index
        // that resolves now resolves on every flush.
        resolve(self, Utc::now())?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Deadline of a single HTTP attempt.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra attempts after a retryable failure. 0 sends each request once.
    #[serde(default)]
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each following one.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_defaults() {
        let yaml = r#"
server: search.example.com
index: applog
"#;
        let config: EndpointConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config, EndpointConfig::new("search.example.com", "applog"));
        assert_eq!(config.scheme, "http");
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.aws_service, "es");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_endpoint() {
        let yaml = r#"
scheme: https
server: search.example.com
port: 443
index: applog
rolling: true
buffer_size: 100
aws_access_key: AKIDEXAMPLE
aws_secret_key: secret
aws_region: eu-west-1
"#;
        let config: EndpointConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        let credentials = config.aws_credentials().unwrap().unwrap();
        assert_eq!(credentials.access_key, "AKIDEXAMPLE");
        assert_eq!(credentials.region, "eu-west-1");
        assert_eq!(credentials.service, "es");
        assert!(config.basic_auth().is_none());
    }

    #[test]
    fn test_validate_required_fields() {
        let config = EndpointConfig::new("", "applog");
        assert!(matches!(config.validate(), Err(ConfigError::MissingServer)));

        let config = EndpointConfig::new("localhost", "  ");
        assert!(matches!(config.validate(), Err(ConfigError::MissingIndex)));

        let mut config = EndpointConfig::new("localhost", "applog");
        config.port = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort)));

        let mut config = EndpointConfig::new("localhost", "applog");
        config.scheme = "ftp".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn test_validate_unusable_server() {
        let config = EndpointConfig::new("bad host name", "applog");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(..))));

        let config = EndpointConfig::new("search.example.com:notaport", "applog");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(..))));
    }

    #[test]
    fn test_validate_partial_aws_credentials() {
        let mut config = EndpointConfig::new("localhost", "applog");
        config.aws_access_key = Some("AKID".into());
        config.aws_region = Some("   ".into());

        match config.validate() {
            Err(ConfigError::PartialAwsCredentials { missing }) => {
                assert_eq!(missing, vec!["aws_secret_key", "aws_region"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_auth_modes() {
        let mut config = EndpointConfig::new("localhost", "applog");
        config.user = Some("elastic".into());
        assert!(matches!(config.validate(), Err(ConfigError::PartialBasicAuth)));

        config.password = Some("changeme".into());
        assert!(config.validate().is_ok());
        assert_eq!(config.basic_auth(), Some(("elastic", "changeme")));

        config.aws_access_key = Some("AKID".into());
        config.aws_secret_key = Some("secret".into());
        config.aws_region = Some("us-east-1".into());
        assert!(matches!(config.validate(), Err(ConfigError::ConflictingAuth)));
    }

    #[test]
    fn test_transport_config() {
        let config: TransportConfig = serde_yaml::from_str("max_retries: 3").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());

        let config = TransportConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }
}
