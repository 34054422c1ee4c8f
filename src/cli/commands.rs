//! CLI command implementations.
//!
//! Each command loads a fresh module into its own registry, runs, and
//! unloads it again.

use crate::cli::output::{
    OutputFormat, SimulationReport, SpinReport, StatusReport, format_chance, format_simulation,
    format_spin, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::{DeviceConfig, FailurePolicy};
use crate::error::{CommandError, Error, Result, SamplerError};
use crate::module::RouletteModule;
use crate::registry::{DeviceNode, DeviceRegistry};
use crate::sampler::MAX_RAND;
use rayon::prelude::*;
use std::sync::Arc;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the command fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = cli.device_config()?;

    match &cli.command {
        Commands::Spin { read_size } => cmd_spin(&config, *read_size, format),
        Commands::Status => cmd_status(&config, format),
        Commands::Chance { value } => cmd_chance(&config, *value, format),
        Commands::Simulate { opens, read_size } => {
            cmd_simulate(&config, *opens, *read_size, format)
        }
    }
}

fn load_module(config: &DeviceConfig) -> Result<RouletteModule> {
    RouletteModule::init(config, Arc::new(DeviceRegistry::new()))
}

fn check_read_size(read_size: usize) -> Result<()> {
    if read_size == 0 {
        return Err(CommandError::InvalidArgument("read size must be at least 1".to_string()).into());
    }
    Ok(())
}

/// Reads handle `fh` to end-of-stream, returning the bytes and the number of
/// non-empty reads.
fn read_to_end(node: &DeviceNode, fh: u64, read_size: usize) -> Result<(Vec<u8>, usize)> {
    let mut bytes = Vec::new();
    let mut reads = 0;
    while node.read(fh, &mut bytes, read_size)? > 0 {
        reads += 1;
    }
    Ok((bytes, reads))
}

/// Opens, drains and releases one session. A boom is reported, not returned
/// as an error.
fn spin_once(node: &DeviceNode, read_size: usize) -> Result<SpinReport> {
    let fh = match node.open() {
        Ok(fh) => fh,
        Err(Error::Sampler(SamplerError::Boom { sampled, chance })) => {
            return Ok(SpinReport {
                device: node.device().name().to_string(),
                survived: false,
                sampled,
                chance,
                message: String::new(),
                reads: 0,
            });
        }
        Err(e) => return Err(e),
    };

    let sampled = node.inspect(fh, |file| {
        (file.session().sampled(), file.session().chance())
    });
    let drained = read_to_end(node, fh, read_size);
    node.release(fh)?;

    let (sampled, chance) = sampled?;
    let (bytes, reads) = drained?;
    Ok(SpinReport {
        device: node.device().name().to_string(),
        survived: true,
        sampled,
        chance,
        message: String::from_utf8_lossy(&bytes).into_owned(),
        reads,
    })
}

// ==================== Command Implementations ====================

fn cmd_spin(config: &DeviceConfig, read_size: usize, format: OutputFormat) -> Result<String> {
    check_read_size(read_size)?;
    let module = load_module(config)?;
    let node = module.node()?;

    let report = spin_once(&node, read_size)?;

    module.exit()?;
    format_spin(&report, format)
}

fn cmd_status(config: &DeviceConfig, format: OutputFormat) -> Result<String> {
    let module = load_module(config)?;
    let node = module.node()?;

    let report = StatusReport {
        device: module.name().to_string(),
        major: module.major(),
        chance: node.device().chance(),
        max_chance: MAX_RAND,
        users: node.device().users(),
    };

    module.exit()?;
    format_status(&report, format)
}

fn cmd_chance(config: &DeviceConfig, value: Option<u8>, format: OutputFormat) -> Result<String> {
    let module = load_module(config)?;
    let node = module.node()?;
    let device = node.device();

    let updated = match value {
        Some(chance) => {
            if !device.set_chance(chance) {
                return Err(CommandError::InvalidArgument(format!(
                    "chance {chance} exceeds maximum {MAX_RAND}"
                ))
                .into());
            }
            true
        }
        None => false,
    };

    let output = format_chance(device.chance(), updated, format)?;
    module.exit()?;
    Ok(output)
}

fn cmd_simulate(
    config: &DeviceConfig,
    opens: usize,
    read_size: usize,
    format: OutputFormat,
) -> Result<String> {
    check_read_size(read_size)?;

    // Booms are outcomes to count here, never a reason to abort.
    let config = DeviceConfig {
        failure_policy: FailurePolicy::Propagate,
        ..config.clone()
    };
    let module = load_module(&config)?;
    let node = module.node()?;
    let chance = node.device().chance();

    let outcomes = (0..opens)
        .into_par_iter()
        .map(|_| spin_once(&node, read_size))
        .collect::<Result<Vec<_>>>()?;

    let mut report = SimulationReport {
        device: module.name().to_string(),
        chance,
        opens,
        survived: 0,
        booms: 0,
        bytes_read: 0,
        users_after: node.device().users(),
    };
    for outcome in outcomes {
        if outcome.survived {
            report.survived += 1;
            report.bytes_read += outcome.message.len();
        } else {
            report.booms += 1;
        }
    }

    if report.users_after != 0 {
        return Err(CommandError::ExecutionFailed(format!(
            "{} sessions still open after simulation",
            report.users_after
        ))
        .into());
    }

    module.exit()?;
    format_simulation(&report, format)
}
