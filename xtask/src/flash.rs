use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;

use crate::cargo::step;
use crate::TARGET;

/// Probe-rs chip name of the demo board.
const CHIP: &str = "STM32H743ZITx";

pub fn run(release: bool, fault_demo: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };
    let features = if fault_demo { "fault-demo" } else { "hardware" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode, --features {features})...")
            .cyan()
            .bold()
    );
    println!();

    let mut args = vec!["build", "-p", "firmware", "--target", TARGET, "--features", features];
    if release {
        args.push("--release");
    }
    step("Build", &args)?;
    println!();

    if fault_demo {
        let after_fault = if release {
            "reset and report the fault on the next boot"
        } else {
            "halt on a breakpoint with the record written (debug build)"
        };
        println!(
            "   {}",
            format!("The firmware will fault after 5 s and {after_fault}.").dimmed()
        );
    }

    // probe-rs streams the defmt log until interrupted, so it inherits stdio.
    println!("{}", "📡 Flashing to STM32H7...".cyan().bold());
    let binary = format!("target/{TARGET}/{mode}/firmware");
    let status = Command::new("probe-rs")
        .args(["run", &binary, "--chip", CHIP, "--probe-index", "0"])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        eprintln!("{}", "✗ probe-rs exited with an error".red().bold());
        anyhow::bail!("Flash failed - check that the probe is connected and the device is powered");
    }

    Ok(())
}
