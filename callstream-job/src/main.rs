use std::process::ExitCode;
use std::time::Duration;

use callstream::errorhandling::{BrokerError, ConfigError, JobError};
use callstream::job::{Shutdown, StreamingJob};
use callstream::join::{enrich, format_enriched, RadioCodes};
use callstream::record::CALL_EVENT_FIELDS;
use callstream::sinks::StdOutSink;
use callstream::snapshot::IntervalTrigger;
use callstream_kafka::{KafkaConsumerError, KafkaProducerError, KafkaSink, KafkaSource};
use clap::Parser;
use envconfig::Envconfig;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod replay;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = cli::Callstream::parse();
    debug!("Got the following args: {args:?}");

    let result = match args.command {
        cli::Command::Run(run) => run_job(run).await,
        cli::Command::Replay(replay) => replay_calls(replay).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            error!("{:?}", eyre::Report::new(e));
            ExitCode::from(code)
        }
    }
}

async fn run_job(args: cli::RunArgs) -> Result<(), Error> {
    let config = config::JobConfig::init_from_env()?.validate()?;
    info!(?config, "Loaded job configuration");

    if args.print_schema {
        println!("root");
        for field in CALL_EVENT_FIELDS {
            println!(" |-- {field}: string (nullable = true)");
        }
    }

    // no partial operation without the lookup table
    let radio_codes = RadioCodes::load(&args.radio_codes)?;

    let source = KafkaSource::builder()
        .broker(args.broker.bootstrap_servers())
        .topic(args.broker.topic)
        .group_id(args.group_id)
        .starting_offsets(args.starting_offsets.into())
        .limits(config.limits())
        .metadata_fetch_timeout(config.broker.startup_timeout())
        .build();

    let shutdown = Shutdown::new();
    let job = StreamingJob::builder()
        .source(tokio::task::block_in_place(|| source.connect())?)
        .sink(StdOutSink::new())
        .trigger(IntervalTrigger::new(config.trigger_interval()))
        .config(config.engine())
        .retry(config.broker.retry())
        .shutdown(shutdown.clone())
        .build();

    let mut handle = tokio::task::spawn_blocking(move || job.run());
    let outcome = tokio::select! {
        joined = &mut handle => joined?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal, finishing in-flight batch");
            shutdown.trigger();
            handle.await?
        }
    }?;

    info!(
        batches = outcome.batches,
        snapshots = outcome.emitted,
        "Streaming stopped, joining radio codes"
    );
    let enriched = enrich(&outcome.final_snapshot, &radio_codes);
    print!("{}", format_enriched(&enriched));
    Ok(())
}

async fn replay_calls(args: cli::ReplayArgs) -> Result<(), Error> {
    let sink = KafkaSink::builder()
        .broker(args.broker.bootstrap_servers())
        .client_id("callstream-replay")
        .build()?;
    let delay = Duration::from_millis(args.delay_ms);
    let (input, topic) = (args.input, args.broker.topic);
    let sent = tokio::task::spawn_blocking(move || replay::replay(sink, &input, &topic, delay)).await??;
    info!(sent, "Replay finished");
    Ok(())
}

#[derive(Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid environment configuration")]
    Env(#[from] envconfig::Error),
    #[error("Invalid environment configuration")]
    InvalidConfig(#[from] config::InvalidConfig),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Producer(#[from] KafkaProducerError),
    #[error(transparent)]
    Consumer(#[from] KafkaConsumerError),
    #[error("Invalid JSON input")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON array of call records")]
    NotAnArray,
    #[error("Job task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Process exit code for this error
    fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Broker(_) | Error::Job(JobError::Broker(_)) | Error::Consumer(_) => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let config = Error::Config(RadioCodes::load("/no/such/radio_code.json").unwrap_err());
        assert_eq!(config.exit_code(), 2);
        let broker = Error::Broker(BrokerError::ConnectTimeout(Duration::from_secs(10), "down".into()));
        assert_eq!(broker.exit_code(), 3);
        let job = Error::Job(JobError::Broker(BrokerError::ConnectionLost("down".into())));
        assert_eq!(job.exit_code(), 3);
        assert_eq!(Error::NotAnArray.exit_code(), 1);
    }
}
