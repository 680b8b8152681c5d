//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,elementkit_cache=debug,elementkit_http=debug,elementkit_images=debug,elementkit_cli=debug"
    } else {
        "warn"
    }
}

/// Initialize logging based on CLI flags.
///
/// `RUST_LOG` takes precedence over `--verbose`. Logs go to stderr so that
/// stdout carries only command output.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
