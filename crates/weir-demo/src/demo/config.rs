use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;

/// Which scenario the demo runs.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    All,
    Pool,
    Pipeline,
    FanIn,
    Merge,
    Failures,
    Cancel,
    Timeout,
}

impl Scenario {
    /// Scenarios run by [`Scenario::All`], in order.
    pub const EACH: [Self; 7] = [
        Self::Pool,
        Self::Pipeline,
        Self::FanIn,
        Self::Merge,
        Self::Failures,
        Self::Cancel,
        Self::Timeout,
    ];
}

/// Runtime configuration for the `weir-demo` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults small enough that every
/// scenario finishes in about a second.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "weir-demo",
    version,
    about = "Walkthrough of bounded worker pools, pipelines and fan-in"
)]
pub struct CliArgs {
    /// Scenario to run.
    ///
    /// Environment variable: `WEIR_SCENARIO`
    #[arg(long, env = "WEIR_SCENARIO", value_enum, default_value = "all")]
    pub scenario: Scenario,

    /// Number of workers in the pool scenarios.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 3)]
    pub num_workers: usize,

    /// Number of work items the producer sends.
    ///
    /// Environment variable: `NUM_ITEMS`
    #[arg(long, env = "NUM_ITEMS", default_value_t = 5)]
    pub num_items: u64,

    /// Capacity of the task queue between producer and workers.
    ///
    /// A full queue makes the producer wait.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 10)]
    pub queue_capacity: usize,

    /// Capacity of the result sink between workers and the consumer.
    ///
    /// A full sink makes the workers wait.
    ///
    /// Environment variable: `SINK_CAPACITY`
    #[arg(long, env = "SINK_CAPACITY", default_value_t = 10)]
    pub sink_capacity: usize,

    /// Simulated work per item, in milliseconds.
    ///
    /// Environment variable: `WORK_DELAY_MS`
    #[arg(long, env = "WORK_DELAY_MS", default_value_t = 50)]
    pub work_delay_ms: u64,

    /// Seconds the running scenario gets to stop after Ctrl+C or SIGTERM.
    /// Also the per-worker grace period of the `cancel` scenario.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub scenario: Scenario,
    pub num_workers: usize,
    pub num_items: u64,
    pub queue_capacity: usize,
    pub sink_capacity: usize,
    pub work_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl DemoConfig {
    pub fn scenarios(&self) -> &'static [Scenario] {
        match self.scenario {
            Scenario::All => &Scenario::EACH,
            Scenario::Pool => &[Scenario::Pool],
            Scenario::Pipeline => &[Scenario::Pipeline],
            Scenario::FanIn => &[Scenario::FanIn],
            Scenario::Merge => &[Scenario::Merge],
            Scenario::Failures => &[Scenario::Failures],
            Scenario::Cancel => &[Scenario::Cancel],
            Scenario::Timeout => &[Scenario::Timeout],
        }
    }
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.shutdown_timeout == 0 {
            bail!("SHUTDOWN_TIMEOUT must be at least 1 second");
        }

        Ok(Self {
            scenario: args.scenario,
            num_workers: args.num_workers,
            num_items: args.num_items,
            queue_capacity: args.queue_capacity,
            sink_capacity: args.sink_capacity,
            work_delay: Duration::from_millis(args.work_delay_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<DemoConfig> {
        let argv = core::iter::once("weir-demo").chain(args.iter().copied());
        let args = CliArgs::try_parse_from(argv)?;
        DemoConfig::try_from(args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.scenario, Scenario::All);
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.num_items, 5);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.sink_capacity, 10);
        assert_eq!(config.work_delay, Duration::from_millis(50));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.scenarios(), Scenario::EACH);
    }

    #[test]
    fn single_scenario() {
        let config = parse(&["--scenario", "fan-in", "--num-workers", "8"]).unwrap();
        assert_eq!(config.scenarios(), [Scenario::FanIn]);
        assert_eq!(config.num_workers, 8);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = parse(&["--num-workers", "0"]).unwrap_err();
        assert!(err.to_string().contains("NUM_WORKERS"));
    }

    #[test]
    fn accepts_unbuffered_capacities() {
        let config = parse(&["--queue-capacity", "0", "--sink-capacity", "0"]).unwrap();
        assert_eq!(config.queue_capacity, 0);
        assert_eq!(config.sink_capacity, 0);
    }

    #[test]
    fn rejects_zero_shutdown_timeout() {
        assert!(parse(&["--shutdown-timeout", "0"]).is_err());
    }

    #[test]
    fn rejects_unknown_scenario() {
        assert!(parse(&["--scenario", "fan-out-fan-in"]).is_err());
    }
}
