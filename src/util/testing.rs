use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::util::NOISY_TARGETS;

/// Default directives when `RUST_LOG` is unset.
const TEST_FILTER: &str = "tmreport=trace,warn";

static TEST_SETUP: Once = Once::new();

/// Installs the test subscriber once per test binary.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let module_filter = filter_fn(|metadata| {
        !NOISY_TARGETS
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_FILTER));

    // test writer: output is captured per test unless --nocapture
    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else if let Err(e) = subscriber.try_init() {
        eprintln!("Error: Failed to set up logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_repeated_calls_when_initializing_then_no_panic() {
        init_test_setup();
        init_test_setup();
        assert!(tracing::dispatcher::has_been_set());
    }
}
