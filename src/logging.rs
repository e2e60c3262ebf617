//! Tracing subscriber setup for the binary

/// Install a global fmt subscriber writing to stderr
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks the level for this
/// crate (0: warn, 1: info, 2: debug, 3+: trace).
pub fn init(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("xdgpak={level}")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
