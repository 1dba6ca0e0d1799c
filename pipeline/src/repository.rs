use crate::config::EndpointConfig;
use crate::endpoint::{Endpoint, resolve};
use crate::errors::{ConfigError, DeliveryError, RepositoryError};
use crate::event::LogEvent;
use crate::metrics_defs::{
    BATCHES_FLUSHED, EVENTS_ADDED, EVENTS_DELIVERED, EVENTS_PENDING, EVENTS_UNDELIVERED,
    FLUSH_DURATION,
};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::{counter, gauge, histogram};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Buffers log events from any number of producers and flushes them in
/// batches once a threshold is reached.
///
/// Appending and cutting batches happen under one lock acquisition, so
/// every event lands in exactly one batch. The HTTP exchange happens after
/// the lock is released, in the task whose `add` crossed the threshold.
pub struct Repository {
    config: EndpointConfig,
    transport: Arc<dyn Transport>,
    pending: Mutex<VecDeque<LogEvent>>,
    injected_failure: Mutex<Option<String>>,
    clock: fn() -> DateTime<Utc>,
}

impl Repository {
    pub fn new(config: EndpointConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Shipping log events to index {} on {} (buffer size {})",
            config.index, config.server, config.buffer_size
        );

        Ok(Repository {
            config,
            transport,
            pending: Mutex::new(VecDeque::new()),
            injected_failure: Mutex::new(None),
            clock: Utc::now,
        })
    }

    /// Replaces the clock used to resolve rolling indices.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Number of events waiting for the threshold.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Makes every following `add` fail with `message` until cleared.
    pub fn inject_failure(&self, message: impl Into<String>) {
        *self.injected_failure.lock() = Some(message.into());
    }

    pub fn clear_injected_failure(&self) {
        *self.injected_failure.lock() = None;
    }

    /// Buffers `events` and flushes every full batch of `buffer_threshold`
    /// events, oldest first. A threshold of 0 behaves like 1.
    ///
    /// On a failed flush the error carries the failed batch and every batch
    /// cut in this call that was not sent yet. Events below the threshold
    /// stay buffered.
    pub async fn add(
        &self,
        events: Vec<LogEvent>,
        buffer_threshold: usize,
    ) -> Result<(), RepositoryError> {
        let injected = self.injected_failure.lock().clone();
        if let Some(message) = injected {
            return Err(RepositoryError::Injected(message));
        }

        let threshold = buffer_threshold.max(1);
        counter!(EVENTS_ADDED).increment(events.len() as u64);

        let batches = {
            let mut pending = self.pending.lock();
            pending.extend(events);

            let mut batches = Vec::new();
            while pending.len() >= threshold {
                batches.push(pending.drain(..threshold).collect::<Vec<_>>());
            }
            gauge!(EVENTS_PENDING).set(pending.len() as f64);
            batches
        };

        self.flush_batches(batches).await
    }

    /// Flushes everything pending, including a final partial batch. Used on
    /// shutdown.
    pub async fn drain(&self) -> Result<(), RepositoryError> {
        let batch_size = self.config.buffer_size.max(1);
        let batches = {
            let mut pending = self.pending.lock();
            let events: Vec<LogEvent> = pending.drain(..).collect();
            gauge!(EVENTS_PENDING).set(0.0);
            events
                .chunks(batch_size)
                .map(<[LogEvent]>::to_vec)
                .collect::<Vec<_>>()
        };

        if !batches.is_empty() {
            debug!("Draining {} batches", batches.len());
        }
        self.flush_batches(batches).await
    }

    async fn flush_batches(&self, batches: Vec<Vec<LogEvent>>) -> Result<(), RepositoryError> {
        if batches.is_empty() {
            return Ok(());
        }

        let endpoint = match resolve(&self.config, (self.clock)()) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                self.requeue(batches);
                return Err(err.into());
            }
        };

        let mut batches = batches.into_iter();
        while let Some(batch) = batches.next() {
            let size = batch.len();
            let start = Instant::now();
            let result = self.flush(&endpoint, batch).await;
            histogram!(FLUSH_DURATION).record(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    counter!(BATCHES_FLUSHED, "outcome" => "delivered").increment(1);
                    counter!(EVENTS_DELIVERED).increment(size as u64);
                    debug!("Flushed {size} log events to {endpoint}");
                }
                Err((source, mut undelivered)) => {
                    undelivered.extend(batches.flatten());
                    counter!(BATCHES_FLUSHED, "outcome" => "failed").increment(1);
                    counter!(EVENTS_UNDELIVERED).increment(undelivered.len() as u64);
                    error!(
                        "Failed to deliver {} log events to {endpoint}: {source}",
                        undelivered.len()
                    );
                    return Err(RepositoryError::Delivery {
                        undelivered,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    // Returns the events not accepted by the backend alongside the error.
    async fn flush(
        &self,
        endpoint: &Endpoint,
        mut batch: Vec<LogEvent>,
    ) -> Result<(), (DeliveryError, Vec<LogEvent>)> {
        if endpoint.is_bulk() {
            return match self.transport.post_bulk(endpoint, &batch).await {
                Ok(()) => Ok(()),
                Err(err) => Err((err, batch)),
            };
        }

        for i in 0..batch.len() {
            if let Err(err) = self.transport.post(endpoint, &batch[i]).await {
                return Err((err, batch.split_off(i)));
            }
        }
        Ok(())
    }

    // Puts batches that were never attempted back at the front, in order.
    fn requeue(&self, batches: Vec<Vec<LogEvent>>) {
        let mut pending = self.pending.lock();
        for event in batches.into_iter().flatten().rev() {
            pending.push_front(event);
        }
        gauge!(EVENTS_PENDING).set(pending.len() as f64);
    }
}
