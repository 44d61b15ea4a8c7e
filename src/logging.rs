use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging with the configured level, falling back to INFO if invalid.
pub fn init_logging(log_level: &str) {
    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(parse_level(log_level))
        .init();
}

fn parse_level(log_level: &str) -> Level {
    log_level.parse::<Level>().unwrap_or(Level::INFO)
}
