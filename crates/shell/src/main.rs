//! The `neodbg` binary: an interactive debugger prompt over an in-memory
//! Neo chain.

use anyhow::Context;
use clap::Parser;
use neodbg_config::{AppConfig, NetworkType, ProtocolSettings};
use neodbg_shell::{DebugSession, Shell};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the debugger shell.
#[derive(Parser, Debug)]
#[command(
    name = "neodbg",
    version = env!("CARGO_PKG_VERSION"),
    about = "Interactive Neo N3 VM debugger",
    long_about = "neodbg loads Neo N3 scripts (raw bytes, NEF files, deployed contracts or \
                  transactions), executes them against an in-memory chain state, and supports \
                  breakpoint-driven stepping and state inspection."
)]
struct Args {
    /// Network preset for protocol settings
    #[arg(long = "network", value_name = "NETWORK", default_value = "private")]
    network: String,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    match &args.config {
        Some(path) => {
            AppConfig::load(path).with_context(|| format!("can't load config {}", path.display()))
        }
        None => {
            let network: NetworkType = args
                .network
                .parse()
                .with_context(|| format!("bad network {}", args.network))?;
            Ok(AppConfig {
                protocol: ProtocolSettings::for_network(network),
                ..AppConfig::default()
            })
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error: {error:#}");
            return ExitCode::from(1);
        }
    };

    if io::stdin().is_terminal() {
        println!("NEO-GO-VM: type 'help' for available commands, 'exit' to quit");
    }

    let session = DebugSession::new(config);
    let stdin = io::stdin().lock();
    let stdout = io::stdout();
    let mut shell = Shell::new(session, stdin, stdout);
    match shell.run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::from(2)
        }
    }
}
