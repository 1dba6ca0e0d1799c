use shared::metrics_defs::{MetricDef, MetricType};

pub const EVENTS_ADDED: MetricDef = MetricDef {
    name: "pipeline.events.added",
    metric_type: MetricType::Counter,
    description: "Log events handed to the repository.",
};

pub const EVENTS_PENDING: MetricDef = MetricDef {
    name: "pipeline.events.pending",
    metric_type: MetricType::Gauge,
    description: "Log events buffered below the flush threshold.",
};

pub const EVENTS_DELIVERED: MetricDef = MetricDef {
    name: "pipeline.events.delivered",
    metric_type: MetricType::Counter,
    description: "Log events accepted by the backend.",
};

pub const EVENTS_UNDELIVERED: MetricDef = MetricDef {
    name: "pipeline.events.undelivered",
    metric_type: MetricType::Counter,
    description: "Log events handed back to the caller after a failed flush.",
};

pub const BATCHES_FLUSHED: MetricDef = MetricDef {
    name: "pipeline.batches.flushed",
    metric_type: MetricType::Counter,
    description: "Batches sent to the backend, tagged by outcome.",
};

pub const FLUSH_DURATION: MetricDef = MetricDef {
    name: "pipeline.flush.duration",
    metric_type: MetricType::Histogram,
    description: "Seconds spent delivering one batch, retries included.",
};

pub const REQUEST_RETRIES: MetricDef = MetricDef {
    name: "pipeline.transport.retries",
    metric_type: MetricType::Counter,
    description: "HTTP attempts repeated after a retryable failure.",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "pipeline.transport.rejected",
    metric_type: MetricType::Counter,
    description: "HTTP responses with an unexpected status, tagged by status code.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    EVENTS_ADDED,
    EVENTS_PENDING,
    EVENTS_DELIVERED,
    EVENTS_UNDELIVERED,
    BATCHES_FLUSHED,
    FLUSH_DURATION,
    REQUEST_RETRIES,
    REQUESTS_REJECTED,
];
