//! Diagnostic logging setup.
//!
//! User-facing output goes through [`crate::console::Console`]; this only
//! wires `tracing` to stderr.

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "MANGACLIP_LOG_FORMAT";

pub fn logs_are_json() -> bool {
    matches!(std::env::var(LOG_FORMAT_ENV).as_deref(), Ok("json"))
}

/// Filter used when `RUST_LOG` is unset.
fn default_directive(debug: bool) -> &'static str {
    if debug { "mangaclip=debug,warn" } else { "warn" }
}

/// Initialize tracing according to `RUST_LOG` and `MANGACLIP_LOG_FORMAT`.
/// - Defaults to `warn`, or debug output for this crate when `debug` is set
/// - `MANGACLIP_LOG_FORMAT=json` switches to JSON lines
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
    } else {
        let _ = builder.with(fmt_layer.compact()).try_init();
    }
}
