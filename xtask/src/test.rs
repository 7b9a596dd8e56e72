use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{step, test_summary};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    // Determine which tests to run
    let run_unit = !integration_only;
    let run_integration = !unit_only;

    if run_unit {
        let output = step("Unit tests", &["test", "--lib", "--workspace"])?;
        println!("    {}", test_summary(&output).dimmed());
    }

    // Capture/retrieve lifecycle and record-layout properties.
    if run_integration {
        let output = step("Integration tests", &["test", "-p", "crashdump", "--tests"])?;
        println!("    {}", test_summary(&output).dimmed());
    }

    // Doc tests (failures are reported but don't fail the run)
    match step("Doc tests", &["test", "--doc", "-p", "crashdump"]) {
        Ok(output) => println!("    {}", test_summary(&output).dimmed()),
        Err(_) => eprintln!("{}", "  ⚠ Doc tests failed".yellow().bold()),
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
