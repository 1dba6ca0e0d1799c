use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Document type of every indexed log event. Also the last path segment
/// of the endpoint URL.
pub const DOCUMENT_TYPE: &str = "uwLogEvent";

/// Keys of contextual fields that producers commonly attach.
pub mod fields {
    pub const EXECUTING_ASSEMBLY: &str = "executingAssembly";
    pub const VERSION: &str = "version";
    pub const ENVIRONMENT: &str = "environment";
    pub const ORIGINAL_CALLER_ID: &str = "originalCallerId";
    pub const USER_AGENT: &str = "userAgent";
    pub const PAGE: &str = "page";
    pub const REMOTE_IP: &str = "remoteIP";
    pub const THREAD_ID: &str = "threadId";
    pub const DIRECT_CALLER_ID: &str = "directCallerId";
    pub const HTTP_METHOD: &str = "httpMethod";
    pub const RESOURCE_NAME: &str = "resourceName";
    pub const REQUEST_FORMAT: &str = "requestFormat";
    pub const WEB_SERVICE_VERSION: &str = "webServiceVersion";
    pub const LOG_SOURCE_NAME: &str = "logSourceName";
    pub const LOG_MODEL_KEY: &str = "logModelKey";
    pub const TASK_FRIENDLY_ID: &str = "taskFriendlyID";
    pub const HOST_PROCESS_GUID: &str = "hostProcessGuid";
    pub const RESPONSE_TIME: &str = "responseTime";
    pub const RESPONSE_STATUS_CODE: &str = "responseStatusCode";
}

// Serialized names of the fixed fields. Properties cannot shadow them.
const RESERVED_FIELDS: &[&str] = &[
    "logDate",
    "thread",
    "logLevel",
    "logger",
    "message",
    "exception",
    "host",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a contextual field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// A single log record, serialized as one `uwLogEvent` document.
///
/// Events are built once with the `with_*` methods and never mutated after
/// they are handed to the repository.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(
        rename = "logDate",
        serialize_with = "serialize_log_date",
        default = "Utc::now"
    )]
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread: Option<String>,
    #[serde(rename = "logLevel", default)]
    level: Level,
    #[serde(default)]
    logger: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(flatten)]
    properties: BTreeMap<String, FieldValue>,
}

fn serialize_log_date<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl LogEvent {
    /// Creates an event stamped with the current time and the name of the
    /// calling thread.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            thread: std::thread::current().name().map(str::to_owned),
            level,
            logger: logger.into(),
            message: message.into(),
            exception: None,
            host: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Adds a contextual field. Keys that collide with a fixed field are
    /// dropped.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            debug!("Ignoring property {key}, it shadows a fixed field");
            return self;
        }
        self.properties.insert(key, value.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&FieldValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, FieldValue> {
        &self.properties
    }

    /// The JSON document indexed for this event.
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn sample() -> LogEvent {
        LogEvent::new(Level::Warn, "api.orders", "slow response")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 59).unwrap())
            .with_thread("worker-3")
            .with_host("web01")
            .with_property(fields::HTTP_METHOD, "GET")
            .with_property(fields::RESPONSE_STATUS_CODE, 200u16)
            .with_property(fields::RESPONSE_TIME, 1.5)
    }

    #[test]
    fn test_document_shape() {
        let document: Value = serde_json::from_str(&sample().to_document().unwrap()).unwrap();

        assert_eq!(
            document,
            json!({
                "logDate": "2024-01-05T23:59:59.000Z",
                "thread": "worker-3",
                "logLevel": "WARN",
                "logger": "api.orders",
                "message": "slow response",
                "host": "web01",
                "httpMethod": "GET",
                "responseStatusCode": 200,
                "responseTime": 1.5
            })
        );
    }

    #[test]
    fn test_absent_fields_omitted() {
        let event = LogEvent::new(Level::Info, "app", "hello");
        let document = event.to_document().unwrap();

        assert!(!document.contains("exception"));
        assert!(!document.contains("\"host\""));
    }

    #[test]
    fn test_reserved_property_ignored() {
        let event = LogEvent::new(Level::Info, "app", "original").with_property("message", "other");

        assert_eq!(event.message(), "original");
        assert!(event.property("message").is_none());
        let document: Value = serde_json::from_str(&event.to_document().unwrap()).unwrap();
        assert_eq!(document["message"], "original");
    }

    #[test]
    fn test_deserialize_document() {
        let event = sample();
        let parsed: LogEvent = serde_json::from_str(&event.to_document().unwrap()).unwrap();

        assert_eq!(parsed, event);
        assert_eq!(
            parsed.property(fields::RESPONSE_STATUS_CODE),
            Some(&FieldValue::Integer(200))
        );
    }

    #[test]
    fn test_deserialize_minimal() {
        let event: LogEvent =
            serde_json::from_str(r#"{"message": "disk full", "logLevel": "ERROR", "page": "/"}"#)
                .unwrap();

        assert_eq!(event.message(), "disk full");
        assert_eq!(event.level(), Level::Error);
        assert_eq!(event.logger(), "");
        assert_eq!(event.property(fields::PAGE), Some(&FieldValue::Text("/".into())));
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Fatal.to_string(), "FATAL");
        assert_eq!(Level::default(), Level::Info);
    }
}
