use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "parish=warn,parish_core=warn";
const VERBOSE_FILTER: &str = "parish=debug,parish_core=debug";

/// Send logs to stderr so they never mix with command output.
///
/// `RUST_LOG` wins over the default filter; `--verbose` wins over both.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
