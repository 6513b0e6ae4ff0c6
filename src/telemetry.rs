// ABOUTME: Tracing subscriber setup for hosts embedding the orchestrator.
// ABOUTME: Honors RUST_LOG with a warn-level default, or debug when verbose.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Host engines that already install their own subscriber should skip this;
/// calling it twice is harmless because the second install fails quietly.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
