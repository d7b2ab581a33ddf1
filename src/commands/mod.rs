use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gridstock::{OperationMode, SimConfig, StrategyKind, load_config};

mod floor;
mod simulate;

use floor::{run_config, run_layout, run_show};
use simulate::{RunOptions, run_simulation};

#[derive(Parser)]
#[command(
    name = "gridstock",
    version,
    about = "Grid warehouse simulator (robots, racks, loading bays)",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the simulation clock
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Number of ticks to run (omit for continuous)
        #[arg(short = 't', long)]
        ticks: Option<u64>,
        /// Write a snapshot to .gridstock/ every N ticks (0 disables)
        #[arg(long, default_value_t = 0)]
        snapshot_every: u64,
        /// Print a status line every N ticks (0 disables)
        #[arg(long, default_value_t = 20)]
        report_every: u64,
    },
    /// Print the initial floor plan without running
    Layout {
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the snapshot JSON instead of the map
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Render the last snapshot written by `run --snapshot-every`
    Show {
        /// Print the snapshot JSON instead of the map
        #[arg(long)]
        json: bool,
    },
}

/// Config file plus per-field overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON config file; missing fields take their defaults
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// RNG seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub width: Option<i32>,
    #[arg(long)]
    pub height: Option<i32>,
    /// Number of robots
    #[arg(short = 'r', long)]
    pub robots: Option<usize>,
    /// Operating mode: both, pick or store
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<OperationMode>,
    /// Movement strategy: astar or random
    #[arg(short = 's', long, value_enum)]
    pub strategy: Option<StrategyKind>,
    /// Tick period in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<SimConfig, String> {
        let mut config = match &self.config {
            Some(path) => load_config(path).map_err(|e| e.to_string())?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(robots) = self.robots {
            config.robots = robots;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Run {
            config,
            ticks,
            snapshot_every,
            report_every,
        } => run_simulation(
            config.resolve()?,
            RunOptions {
                ticks,
                snapshot_every,
                report_every,
            },
        ),
        Command::Layout { config, json } => run_layout(config.resolve()?, json),
        Command::Config { config } => run_config(config.resolve()?),
        Command::Show { json } => run_show(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_defaults() {
        let cli = Cli::try_parse_from([
            "gridstock", "run", "--robots", "3", "--mode", "store", "--seed", "9", "--ticks", "40",
        ])
        .unwrap();
        let Command::Run { config, ticks, .. } = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(ticks, Some(40));
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.robots, 3);
        assert_eq!(resolved.mode, OperationMode::Store);
        assert_eq!(resolved.seed, Some(9));
        assert_eq!(resolved.width, SimConfig::default().width);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let args = ConfigArgs {
            width: Some(1),
            ..ConfigArgs::default()
        };
        assert!(args.resolve().unwrap_err().contains("at least 3x3"));
    }
}
