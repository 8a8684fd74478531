use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber used by the binary.
///
/// `RUST_LOG` wins over `verbose` when set. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tms_timesheet_bot={level},tms_bot={level},warn"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log a banner-style section header.
pub fn section(title: &str) {
    let rule = "=".repeat(60);
    info!("{}", rule);
    info!("{}", title);
    info!("{}", rule);
}
