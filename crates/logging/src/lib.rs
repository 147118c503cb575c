use time::macros::format_description;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber. Log records go to stderr so stdout
/// carries only the operator progress lines.
///
/// `RUST_LOG` overrides `default_level` when set.
pub fn init_logger(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:2]");

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::LocalTime::new(time_format))
                .with_target(false)
                .with_level(true)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .with_span_events(fmt::format::FmtSpan::NONE)
                .compact(),
        )
        .with(filter)
        .try_init();
    // a second call, e.g. from tests, keeps the first subscriber
    if installed.is_err() {
        tracing::debug!("logger already initialised");
    }
}

/// Level for `-v` repeated `count` times.
pub fn level_for_verbosity(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(level_for_verbosity(0), LevelFilter::INFO);
        assert_eq!(level_for_verbosity(1), LevelFilter::DEBUG);
        assert_eq!(level_for_verbosity(4), LevelFilter::TRACE);
    }

    #[test]
    fn initialising_twice_is_harmless() {
        init_logger(LevelFilter::WARN);
        init_logger(LevelFilter::DEBUG);
    }
}
