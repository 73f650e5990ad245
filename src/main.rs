use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use tmreport::cli::{execute, output, Cli};
use tmreport::util::NOISY_TARGETS;

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    if let Err(e) = execute(cli) {
        output::error(&e);
        std::process::exit(e.exit_code());
    }
}

/// `-d` count to level: WARN, INFO, DEBUG, TRACE.
fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn setup_logging(verbosity: u8) {
    if verbosity > 3 {
        eprintln!("Don't be crazy, max is -d -d -d");
    }
    let level = level_for(verbosity);

    let module_filter = filter_fn(|metadata| {
        !NOISY_TARGETS
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // stdout carries the command output, logs go to stderr
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(level)
        .with_filter(module_filter);

    tracing_subscriber::registry().with(layer).init();
    tracing::debug!("log level: {}", level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_debug_count_when_mapping_then_capped_at_trace() {
        assert_eq!(level_for(0), LevelFilter::WARN);
        assert_eq!(level_for(2), LevelFilter::DEBUG);
        assert_eq!(level_for(7), LevelFilter::TRACE);
    }
}
