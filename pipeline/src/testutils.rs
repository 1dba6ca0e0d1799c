use crate::endpoint::Endpoint;
use crate::errors::DeliveryError;
use crate::event::{Level, LogEvent};
use crate::transport::Transport;
use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;

/// One call observed by `RecordingTransport`.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub url: String,
    pub bulk: bool,
    pub events: Vec<LogEvent>,
}

/// Records every delivery instead of sending it. `fail_with` makes
/// subsequent calls fail with the given status.
#[derive(Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<Delivery>>,
    fail_with: Mutex<Option<StatusCode>>,
    // Fail single posts once this many have succeeded.
    fail_after: Mutex<Option<usize>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, status: StatusCode) {
        *self.fail_with.lock() = Some(status);
    }

    pub fn fail_after(&self, successful_posts: usize) {
        *self.fail_after.lock() = Some(successful_posts);
    }

    pub fn recover(&self) {
        *self.fail_with.lock() = None;
        *self.fail_after.lock() = None;
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn delivered_events(&self) -> Vec<LogEvent> {
        self.deliveries
            .lock()
            .iter()
            .flat_map(|delivery| delivery.events.clone())
            .collect()
    }

    fn check(&self, endpoint: &Endpoint) -> Result<(), DeliveryError> {
        let status = *self.fail_with.lock();
        let status = status.or_else(|| {
            let limit = (*self.fail_after.lock())?;
            (self.deliveries.lock().len() >= limit).then_some(StatusCode::BAD_GATEWAY)
        });

        match status {
            Some(status) => Err(DeliveryError::Rejected {
                endpoint: endpoint.to_string(),
                status,
                body_size: 0,
                response: String::new(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, endpoint: &Endpoint, event: &LogEvent) -> Result<(), DeliveryError> {
        self.check(endpoint)?;
        self.deliveries.lock().push(Delivery {
            url: endpoint.url().to_string(),
            bulk: false,
            events: vec![event.clone()],
        });
        Ok(())
    }

    async fn post_bulk(
        &self,
        endpoint: &Endpoint,
        events: &[LogEvent],
    ) -> Result<(), DeliveryError> {
        self.check(endpoint)?;
        self.deliveries.lock().push(Delivery {
            url: endpoint.url().to_string(),
            bulk: true,
            events: events.to_vec(),
        });
        Ok(())
    }
}

pub fn numbered_events(prefix: &str, count: usize) -> Vec<LogEvent> {
    (0..count)
        .map(|i| LogEvent::new(Level::Info, "test", format!("{prefix}-{i}")))
        .collect()
}

pub fn messages(events: &[LogEvent]) -> Vec<String> {
    events.iter().map(|e| e.message().to_string()).collect()
}
