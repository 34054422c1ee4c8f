//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::{DeviceConfig, FailurePolicy};
use crate::error::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// kernel-roulette: a Russian-roulette pseudo-device.
///
/// Every open draws a random value. Below the chance it is fatal; otherwise
/// the device reads back a short status line.
#[derive(Parser, Debug)]
#[command(name = "kernel-roulette")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a JSON device configuration file.
    #[arg(short, long, env = "ROULETTE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device name to register.
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Chance (0-100) an open must meet or exceed to survive.
    #[arg(long, env = "ROULETTE_CHANCE", global = true)]
    pub chance: Option<u8>,

    /// RNG seed for reproducible runs.
    #[arg(long, env = "ROULETTE_SEED", global = true)]
    pub seed: Option<u64>,

    /// Abort the process on fatal failures instead of reporting them.
    #[arg(long, global = true)]
    pub abort_on_fatal: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the device once and read its status line.
    Spin {
        /// Bytes requested per read.
        #[arg(short, long, default_value = "256")]
        read_size: usize,
    },

    /// Show device registration and usage.
    Status,

    /// Show or set the chance.
    Chance {
        /// New chance (0-100); omit to show the current value.
        value: Option<u8>,
    },

    /// Open the device many times concurrently and tally the outcomes.
    Simulate {
        /// Number of opens.
        #[arg(short, long, default_value = "100")]
        opens: usize,

        /// Bytes requested per read.
        #[arg(short, long, default_value = "16")]
        read_size: usize,
    },
}

impl Cli {
    /// Builds the device configuration from the config file and flags.
    ///
    /// Flags override values from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the merged
    /// configuration is invalid.
    pub fn device_config(&self) -> Result<DeviceConfig> {
        let mut config = match &self.config {
            Some(path) => DeviceConfig::load(path)?,
            None => DeviceConfig::default(),
        };

        if let Some(name) = &self.name {
            config.name.clone_from(name);
        }
        if self.chance.is_some() {
            config.chance = self.chance;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.abort_on_fatal {
            config.failure_policy = FailurePolicy::Abort;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(command: Commands) -> Cli {
        Cli {
            config: None,
            name: None,
            chance: None,
            seed: None,
            abort_on_fatal: false,
            verbose: 0,
            format: "text".to_string(),
            command,
        }
    }

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_spin_args() {
        let cli = Cli::try_parse_from([
            "kernel-roulette",
            "--chance",
            "10",
            "-vv",
            "spin",
            "--read-size",
            "8",
        ])
        .unwrap();
        assert_eq!(cli.chance, Some(10));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Spin { read_size: 8 }));
    }

    #[test]
    fn test_default_config() {
        let config = cli(Commands::Status).device_config().unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "from-file", "chance": 5, "seed": 1}}"#).unwrap();

        let mut cli = cli(Commands::Status);
        cli.config = Some(file.path().to_path_buf());
        cli.chance = Some(20);
        cli.abort_on_fatal = true;

        let config = cli.device_config().unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.chance, Some(20));
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_invalid_chance_flag() {
        let mut cli = cli(Commands::Status);
        cli.chance = Some(150);
        assert!(cli.device_config().is_err());
    }
}
