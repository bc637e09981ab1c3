use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Map the number of `-v` flags to a level. Warnings are always shown.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install a compact stderr logger, leaving stdout for rendered output.
pub fn init(verbosity: u8, no_color: bool) {
    let filter = LevelFilter::from_level(level_for(verbosity));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact()
        .with_filter(filter);

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = Registry::default().with(layer).try_init();
}
