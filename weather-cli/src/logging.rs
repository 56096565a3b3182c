use tracing_subscriber::EnvFilter;

/// Log to stderr so rendered output on stdout stays clean.
/// `RUST_LOG` wins over the `verbose` default.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "error" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
