// Host tooling crate: unwrap/expect/panic acceptable outside firmware.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod cargo;
mod check;
mod flash;
mod test;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Cross-compilation target of the firmware and the no_std library check.
pub const TARGET: &str = "thumbv7em-none-eabihf";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "crashdump development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the library (host + thumbv7em, every feature set) and the firmware
    Check,
    /// Run host tests (unit, integration, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Build the demo firmware and run it on STM32H7 hardware via probe-rs
    Flash {
        /// Build and flash release version (faults reset instead of halting)
        #[arg(short, long)]
        release: bool,
        /// Fault deliberately 5 s after boot
        #[arg(long)]
        fault_demo: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::Flash { release, fault_demo } => flash::run(release, fault_demo),
    }
}
