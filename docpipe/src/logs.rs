use std::env;

use log::Level;
use slog::Drain;

/// Initialises the logging mechanisms.
///
/// Verbatim in shape to `crates/alexandrie/src/logs.rs`: a terminal-backed
/// `slog` drain set as the process-global logger, bridged to the `log`
/// facade so every `docpipe` module can just use `info!`/`warn!`/`error!`.
/// `RUST_LOG` controls the level; unset defaults to `Info`.
pub fn init() -> impl Drop {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(
        drain,
        slog::o!(
            "version" => env!("CARGO_PKG_VERSION"),
        ),
    );

    let guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(
        env::var("RUST_LOG")
            .map(|level| level.parse().expect("invalid log level in `${RUST_LOG}`"))
            .unwrap_or(Level::Info),
    )
    .expect("logging was already initialised");

    guard
}
