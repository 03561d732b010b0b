pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Logger};

use sloggers::{Config, LoggerConfig};

/// Builds the process-wide terminal logger. Components receive child loggers
/// from this root; anything constructed without one falls back to `discard`.
pub fn init() -> Logger {
    let config: LoggerConfig = serdeconv::from_toml_str(
        r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
    )
    .expect("Error parsing logging configuration");

    config.build_logger().expect("Error building logger")
}

/// Logger that drops every record.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}
