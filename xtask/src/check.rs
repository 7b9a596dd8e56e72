use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::step;
use crate::TARGET;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking crashdump builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    // Library on the host: the storage/capture/retrieve logic that tests run.
    step("Checking crashdump (host)", &["check", "-p", "crashdump", "--all-targets"])?;

    // Library on the MCU target, one feature set at a time so a missing
    // cfg gate shows up.
    for features in ["", "defmt", "hardware", "trap", "trap,defmt"] {
        let label = if features.is_empty() {
            "Checking crashdump (no_std, no features)".to_string()
        } else {
            format!("Checking crashdump (no_std, {features})")
        };
        let mut args = vec!["check", "-p", "crashdump", "--target", TARGET];
        if !features.is_empty() {
            args.extend(["--features", features]);
        }
        step(&label, &args)?;
    }

    // Demo firmware, with and without the deliberate fault.
    step(
        "Checking firmware (STM32H7)",
        &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
    )?;
    step(
        "Checking firmware (fault-demo)",
        &["check", "-p", "firmware", "--target", TARGET, "--features", "fault-demo"],
    )?;
    println!();

    // Clippy lints (warnings are reported but don't fail the check)
    if step("Running clippy", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]).is_err() {
        eprintln!("{}", "  ⚠ Clippy warnings found".yellow().bold());
    }

    if step("Checking code formatting", &["fmt", "--all", "--check"]).is_err() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
