//! Buffering and delivery of structured log events to an
//! Elasticsearch-compatible backend.

pub mod config;
pub mod endpoint;
pub mod errors;
pub mod event;
pub mod metrics_defs;
pub mod repository;
pub mod transport;

#[cfg(test)]
mod testutils;

pub use config::{EndpointConfig, TransportConfig};
pub use endpoint::{Endpoint, resolve};
pub use errors::{ConfigError, DeliveryError, RepositoryError};
pub use event::{DOCUMENT_TYPE, FieldValue, Level, LogEvent, fields};
pub use repository::Repository;
pub use transport::{HttpTransport, Transport};
