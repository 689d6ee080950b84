use std::path::PathBuf;

use callstream_kafka::StartingOffsets;

/// Where consumption of the topic starts
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offsets {
    /// Earliest offset still on the broker
    Earliest,
    /// Only records produced after startup
    Latest,
}

impl From<Offsets> for StartingOffsets {
    fn from(value: Offsets) -> Self {
        match value {
            Offsets::Earliest => StartingOffsets::Earliest,
            Offsets::Latest => StartingOffsets::Latest,
        }
    }
}

/// Ranked, enriched counts of police service calls streamed from Kafka.
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Callstream {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Aggregate the call topic and print ranked snapshots until interrupted
    Run(RunArgs),
    /// Produce call records from a JSON file into the topic
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
pub struct BrokerArgs {
    /// Kafka bootstrap server, may be given multiple times
    #[arg(short, long = "broker", default_value = "localhost:9092")]
    pub brokers: Vec<String>,

    /// Topic carrying the call records
    #[arg(short, long, default_value = "department.call.service.log")]
    pub topic: String,
}

impl BrokerArgs {
    /// All brokers as a `bootstrap.servers` list
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    /// Consumer group id
    #[arg(short, long, default_value = "callstream")]
    pub group_id: String,

    /// Radio code reference file used to enrich the final counts
    #[arg(short, long, default_value = "radio_code.json")]
    pub radio_codes: PathBuf,

    /// Where to start reading the topic
    #[arg(long, value_enum, default_value_t = Offsets::Earliest)]
    pub starting_offsets: Offsets,

    /// Print the call record schema before starting
    #[arg(long)]
    pub print_schema: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    /// JSON file holding an array of call records
    #[arg(short, long)]
    pub input: PathBuf,

    /// Pause between two records in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn run_defaults() {
        let args = Callstream::parse_from(["callstream", "run"]);
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.broker.brokers, vec!["localhost:9092"]);
        assert_eq!(run.broker.topic, "department.call.service.log");
        assert_eq!(run.radio_codes, PathBuf::from("radio_code.json"));
        assert_eq!(run.starting_offsets, Offsets::Earliest);
        assert!(!run.print_schema);
    }

    #[test]
    fn multiple_brokers() {
        let args = Callstream::parse_from(["callstream", "run", "-b", "a:9092", "-b", "b:9092", "--print-schema"]);
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.broker.brokers, vec!["a:9092", "b:9092"]);
        assert_eq!(run.broker.bootstrap_servers(), "a:9092,b:9092");
        assert!(run.print_schema);
    }

    #[test]
    fn replay_requires_input() {
        assert!(Callstream::try_parse_from(["callstream", "replay"]).is_err());
        let args = Callstream::parse_from(["callstream", "replay", "-i", "calls.json", "--delay-ms", "5"]);
        let Command::Replay(replay) = args.command else {
            panic!("expected replay");
        };
        assert_eq!(replay.delay_ms, 5);
    }

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Callstream::command().debug_assert();
    }
}
