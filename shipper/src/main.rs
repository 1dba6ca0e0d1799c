use chrono::Utc;
use clap::{Args, Parser};
use pipeline::{HttpTransport, Repository};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod source;
mod telemetry;

use config::Config;

#[derive(Args)]
struct ConfigArgs {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(Parser)]
#[command(version, about = "Ships newline-delimited log events to Elasticsearch")]
enum CliCommand {
    /// Read events from stdin and ship them until EOF
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Logger name for plain text lines
        #[arg(long, default_value = "shipper")]
        logger: String,
    },
    /// Print the endpoint the next flush would target
    Resolve {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let config_path = match &cli {
        CliCommand::Run { config, .. } | CliCommand::Resolve { config } => &config.config,
    };
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry = telemetry::init_logging(&config.logging);
    if let Some(metrics) = &config.metrics {
        if let Err(e) = telemetry::init_metrics(metrics) {
            warn!("Metrics disabled: {e}");
        }
    }

    match cli {
        CliCommand::Resolve { .. } => match pipeline::resolve(&config.endpoint, Utc::now()) {
            Ok(endpoint) => {
                println!("{endpoint}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Could not resolve endpoint: {e}");
                ExitCode::FAILURE
            }
        },
        CliCommand::Run { logger, .. } => {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Could not start runtime: {e}");
                    return ExitCode::FAILURE;
                }
            };
            rt.block_on(run(config, &logger))
        }
    }
}

async fn run(config: Config, logger: &str) -> ExitCode {
    let transport = match HttpTransport::new(&config.endpoint, &config.transport) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Could not create transport: {e}");
            return ExitCode::FAILURE;
        }
    };
    if transport.is_signing() {
        info!("Signing requests with AWS SigV4");
    }
    let repository = match Repository::new(config.endpoint, Arc::new(transport)) {
        Ok(repository) => repository,
        Err(e) => {
            error!("Could not create repository: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let event_source = source::EventSource::for_this_host(logger);
    match source::ship(&repository, stdin, &event_source).await {
        Ok(stats) if stats.undelivered == 0 => {
            info!("Shipped {} log events", stats.read);
            ExitCode::SUCCESS
        }
        Ok(stats) => {
            error!(
                "{} of {} log events were not delivered",
                stats.undelivered, stats.read
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Could not read stdin: {e}");
            ExitCode::FAILURE
        }
    }
}
