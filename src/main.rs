//! `kernel-roulette` binary.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use kernel_roulette::cli::output::{OutputFormat, format_error};
use kernel_roulette::cli::{Cli, execute};
use kernel_roulette::logging::init_logging;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(output) => emit(&output),
        Err(err) => {
            let format = OutputFormat::parse(&cli.format);
            let rendered = format_error(&err, format);
            if format == OutputFormat::Json {
                println!("{rendered}");
            } else {
                eprintln!("Error: {rendered}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Writes command output, treating a closed reader as success.
fn emit(output: &str) -> ExitCode {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(output.as_bytes()).and_then(|()| stdout.flush()) {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
            eprintln!("Error writing output: {err}");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}
