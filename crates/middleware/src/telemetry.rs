//! Process-wide wiring for applications.
//!
//! The middleware never reaches for global state on its own unless built with
//! [`TraceLayer::global`]. This module is the one place that installs it, and
//! is meant to be called once from `main`.

use {
    opentelemetry::global,
    opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider},
    routespan_config::TracingConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{Error, Result, TraceLayer};

/// Handle to the installed tracer provider.
#[derive(Debug, Clone)]
pub struct Telemetry {
    provider: SdkTracerProvider,
}

/// Register `provider` and the W3C trace-context propagator globally.
///
/// Spans started through [`TraceLayer::global`] go to `provider` afterwards,
/// including layers built before this call.
pub fn install_global(provider: SdkTracerProvider) -> Telemetry {
    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());
    info!("global tracer provider and trace-context propagator installed");
    Telemetry { provider }
}

impl Telemetry {
    #[must_use]
    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    /// A layer bound to this provider with an explicit W3C propagator.
    #[must_use]
    pub fn layer(&self, config: TracingConfig) -> TraceLayer<SdkTracerProvider> {
        TraceLayer::new(self.provider.clone())
            .with_propagator(TraceContextPropagator::new())
            .with_config(config)
    }

    /// Flush pending spans and shut the provider down.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider was already shut down or an exporter
    /// failed to flush.
    pub fn shutdown(&self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|e| Error::external("failed to shut down tracer provider", e))?;
        info!("tracer provider shut down");
        Ok(())
    }
}

/// Install a `tracing` subscriber for the application's own logs.
///
/// `RUST_LOG` wins over `config.log_filter` when set.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_logging(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
