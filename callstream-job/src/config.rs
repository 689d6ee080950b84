use std::time::Duration;

use callstream::context::EngineConfig;
use callstream::job::RetryPolicy;
use callstream::sources::BatchLimits;
use envconfig::Envconfig;
use thiserror::Error;

/// Engine tuning, read from the environment.
#[derive(Envconfig, Debug)]
pub(crate) struct JobConfig {
    /// Interval between two snapshots in seconds
    #[envconfig(from = "CALLSTREAM_TRIGGER_INTERVAL_SEC", default = "10")]
    pub trigger_interval_sec: u64,

    /// Events further behind the newest event time than this are late
    #[envconfig(from = "CALLSTREAM_LATENESS_MIN", default = "60")]
    pub lateness_min: u64,

    /// Max records per micro-batch
    #[envconfig(from = "CALLSTREAM_MAX_OFFSETS_PER_TRIGGER", default = "100")]
    pub max_offsets_per_trigger: usize,

    /// Max records a single partition contributes to a micro-batch
    #[envconfig(from = "CALLSTREAM_MAX_RATE_PER_PARTITION", default = "2")]
    pub max_rate_per_partition: usize,

    /// Bound on live aggregation keys, unbounded if unset
    #[envconfig(from = "CALLSTREAM_MAX_KEYS")]
    pub max_keys: Option<usize>,

    #[envconfig(nested)]
    pub broker: BrokerConfig,
}

#[derive(Envconfig, Debug)]
pub(crate) struct BrokerConfig {
    /// Timeout for reaching the broker at startup in seconds
    #[envconfig(from = "CALLSTREAM_BROKER_STARTUP_TIMEOUT_SEC", default = "10")]
    pub startup_timeout_sec: u64,
    /// Retries of a failed poll before the job fails
    #[envconfig(from = "CALLSTREAM_BROKER_RETRIES", default = "5")]
    pub retries: usize,
    /// First delay between retries in milliseconds, doubling on every retry
    #[envconfig(from = "CALLSTREAM_BROKER_RETRY_MIN_DELAY_MS", default = "500")]
    pub retry_min_delay_ms: u64,
}

/// A setting parsed fine but can not be used
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum InvalidConfig {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl JobConfig {
    /// Reject settings under which the job could never read a record
    pub(crate) fn validate(self) -> Result<Self, InvalidConfig> {
        if self.max_offsets_per_trigger == 0 {
            return Err(InvalidConfig::Zero("CALLSTREAM_MAX_OFFSETS_PER_TRIGGER"));
        }
        if self.max_rate_per_partition == 0 {
            return Err(InvalidConfig::Zero("CALLSTREAM_MAX_RATE_PER_PARTITION"));
        }
        if self.max_keys == Some(0) {
            return Err(InvalidConfig::Zero("CALLSTREAM_MAX_KEYS"));
        }
        Ok(self)
    }

    pub(crate) fn trigger_interval(&self) -> Duration {
        Duration::from_secs(self.trigger_interval_sec)
    }

    pub(crate) fn engine(&self) -> EngineConfig {
        EngineConfig::builder()
            .lateness(Duration::from_secs(self.lateness_min * 60))
            .maybe_max_keys(self.max_keys)
            .build()
    }

    pub(crate) fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_records: self.max_offsets_per_trigger,
            max_per_partition: self.max_rate_per_partition,
        }
    }
}

impl BrokerConfig {
    #[inline]
    pub(crate) fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_sec)
    }

    pub(crate) fn retry(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retries)
            .min_delay(Duration::from_millis(self.retry_min_delay_ms))
            .build()
    }
}
