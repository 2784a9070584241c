#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use tempo_harness::{run_tests, timer_tests, ConfigError, HarnessConfig};
use tempo_time::TimerDevice;

fn main() -> Result<()> {
    let config = match HarnessConfig::load() {
        Ok(config) => config,
        // Lets clap print help/version and usage errors itself.
        Err(ConfigError::Args(err)) => err.exit(),
        Err(err) => return Err(err.into()),
    };

    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter {:?}", config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.list {
        for case in timer_tests::<Box<dyn TimerDevice + Send>>() {
            println!("{}  {}", case.name, case.description);
        }
        return Ok(());
    }

    tracing::info!(
        device = ?config.device,
        clock = ?config.clock,
        freq_hz = config.timer.freq_hz,
        "running timer tests"
    );
    let summary = run_tests(|| config.make_env(), config.filter.as_deref());

    println!("{} passed, {} failed", summary.passed(), summary.failed());
    if !summary.all_passed() {
        for case in summary.cases.iter().filter(|c| !c.passed()) {
            println!("  {}: {}", case.name, case.failure.as_deref().unwrap_or(""));
        }
        bail!("{} timer test case(s) failed", summary.failed());
    }
    Ok(())
}
