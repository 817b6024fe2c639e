//! Logger bootstrap for processes embedding the gateway.
//!
//! Library crates only emit through the `log` facade; the embedding process
//! calls [`init_logging`] once with the `[logging]` section.

use crate::config::LoggingSettings;

/// Build the filter directive string: base level first, then per-target
/// overrides sorted by target for a stable result.
pub fn build_filter(settings: &LoggingSettings) -> String {
    let mut directives = vec![settings.level.clone()];

    let mut targets: Vec<_> = settings.targets.iter().collect();
    targets.sort();
    for (target, level) in targets {
        directives.push(format!("{}={}", target, level));
    }

    directives.join(",")
}

/// Install `env_logger` configured from `settings`.
///
/// `RUST_LOG`, when set, is appended after the configured directives so it
/// can override them. Installing twice is an error.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let mut filter = build_filter(settings);
    if let Ok(extra) = std::env::var("RUST_LOG") {
        if !extra.trim().is_empty() {
            filter.push(',');
            filter.push_str(&extra);
        }
    }

    env_logger::Builder::new()
        .parse_filters(&filter)
        .format_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    log::debug!("Logging initialized with filter '{}'", filter);
    Ok(())
}
