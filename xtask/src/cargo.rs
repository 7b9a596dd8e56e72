use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// Run `cargo <args>` and report the outcome under `label`.
///
/// On failure the captured stderr is printed and an error is returned.
pub fn step(label: &str, args: &[&str]) -> Result<Output> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{label} failed");
    }

    println!(
        "{}",
        format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    Ok(output)
}

/// Pass/fail totals over every "test result:" line of a `cargo test` run.
pub fn test_summary(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut passed = 0u32;
    let mut failed = 0u32;
    for line in stdout.lines() {
        let Some(summary) = line.split("test result:").nth(1) else {
            continue;
        };
        passed = passed.saturating_add(count(summary, "passed"));
        failed = failed.saturating_add(count(summary, "failed"));
    }
    format!("({passed} passed; {failed} failed)")
}

fn count(summary: &str, what: &str) -> u32 {
    summary
        .split(';')
        .find_map(|part| {
            let mut words = part.split_whitespace().rev();
            if words.next()? != what {
                return None;
            }
            words.next()?.parse().ok()
        })
        .unwrap_or(0)
}
