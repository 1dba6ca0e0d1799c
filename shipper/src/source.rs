use pipeline::{Level, LogEvent, Repository, RepositoryError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShipStats {
    pub read: usize,
    pub undelivered: usize,
}

/// Turns input lines into log events stamped with this process' logger
/// name and host.
#[derive(Debug, Clone)]
pub struct EventSource {
    logger: String,
    host: Option<String>,
}

impl EventSource {
    pub fn new(logger: impl Into<String>, host: Option<String>) -> Self {
        EventSource {
            logger: logger.into(),
            host,
        }
    }

    /// Uses the machine's host name, when it can be read.
    pub fn for_this_host(logger: impl Into<String>) -> Self {
        let host = match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("Could not read host name, events are shipped without one: {e}");
                None
            }
        };
        Self::new(logger, host)
    }

    /// A JSON object line is read as a serialized event. Anything else
    /// becomes an `INFO` event with the line as its message. Blank lines
    /// are skipped. Events without a host get this source's host.
    pub fn parse_line(&self, line: &str) -> Option<LogEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut event = None;
        if line.starts_with('{') {
            match serde_json::from_str::<LogEvent>(line) {
                Ok(parsed) => event = Some(parsed),
                Err(e) => warn!("Shipping line as plain text, not a log event: {e}"),
            }
        }
        let event = event.unwrap_or_else(|| LogEvent::new(Level::Info, &self.logger, line));

        match &self.host {
            Some(host) if event.host().is_none() => Some(event.with_host(host)),
            _ => Some(event),
        }
    }
}

/// Feeds every line of `input` through `repository` and drains it at EOF.
///
/// Failed flushes are logged and counted; the remaining input is still
/// shipped. Events still buffered after the final drain are counted as
/// undelivered, since they are lost when the process exits.
pub async fn ship<R>(
    repository: &Repository,
    input: R,
    source: &EventSource,
) -> Result<ShipStats, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let threshold = repository.config().buffer_size;
    let mut stats = ShipStats::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(event) = source.parse_line(&line) else {
            continue;
        };
        stats.read += 1;
        if let Err(err) = repository.add(vec![event], threshold).await {
            stats.undelivered += undelivered(&err);
        }
    }

    if let Err(err) = repository.drain().await {
        stats.undelivered += undelivered(&err);
    }
    let stranded = repository.pending();
    if stranded > 0 {
        error!("{stranded} log events are still buffered after the final flush");
        stats.undelivered += stranded;
    }
    Ok(stats)
}

fn undelivered(err: &RepositoryError) -> usize {
    match err {
        RepositoryError::Delivery { undelivered, .. } => undelivered.len(),
        RepositoryError::Injected(_) => {
            error!("Dropped log event: {err}");
            1
        }
        // resolve failures put the events back in the buffer; whatever is
        // left there at the end is counted by `ship`
        RepositoryError::Config(_) => {
            error!("Could not flush log events: {err}");
            0
        }
    }
}
