//! Logging setup shared by the binaries.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Directive for this crate at the given `-v` count.
pub fn crate_directive(verbosity: u8) -> Directive {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("telegram_tools={}", level)
        .parse()
        .unwrap_or_else(|_| Directive::from(tracing::Level::INFO))
}

/// Install the fmt subscriber. `RUST_LOG` still applies to other targets.
/// Calling it twice is harmless.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::from_default_env().add_directive(crate_directive(verbosity));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
