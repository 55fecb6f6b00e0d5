//! Process setup for the binaries.

use std::path::PathBuf;

use tracing::{debug, warn};
use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Loads a local `.env` file, then installs a stderr subscriber filtered by
/// `RUST_LOG`.
///
/// The `.env` file is read first so that it can set `RUST_LOG` itself. Its
/// outcome is only logged once the subscriber exists. Records emitted
/// through the `log` facade by the codec library are captured as well.
pub fn init() {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    report_dotenv(dotenv);
}

fn report_dotenv(res: dotenvy::Result<PathBuf>) {
    match res {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        // A missing or unreadable file just means there is nothing to load.
        Err(dotenvy::Error::Io(_)) => (),
        Err(e) => warn!("Found a local `.env` file but could not parse it: {}", e),
    }
}
