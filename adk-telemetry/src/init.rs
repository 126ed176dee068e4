//! Telemetry initialization and configuration

use std::sync::Once;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize console logging. `RUST_LOG` overrides the default `info` filter.
///
/// Only the first call installs a subscriber; later calls are no-ops, so tests
/// and embedding applications can call it freely.
///
/// # Example
/// ```
/// use adk_telemetry::init_telemetry;
/// init_telemetry("my-a2a-service").expect("Failed to initialize telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    INIT.call_once(|| {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init();

        if installed.is_ok() {
            tracing::info!(service.name = service_name, "Telemetry initialized");
        }
    });

    Ok(())
}

fn json_subscriber<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(env_filter()).with(
        tracing_subscriber::fmt::layer().json().with_current_span(true).with_writer(writer),
    )
}

/// Initialize newline-delimited JSON logging on stdout, for log shippers.
///
/// Shares the once-only guard with [`init_telemetry`]: whichever runs first
/// decides the format.
pub fn init_json_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    INIT.call_once(|| {
        let installed = json_subscriber(std::io::stdout).try_init();

        if installed.is_ok() {
            tracing::info!(service.name = service_name, "Telemetry initialized (json)");
        }
    });

    Ok(())
}
