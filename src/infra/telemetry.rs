//! Global tracing subscriber for the server process.

use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(logging, rust_log.as_deref())?;

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(format_layer(logging.format))
        .try_init()?;
    Ok(())
}

/// A non-empty `RUST_LOG` replaces the configured level and directives.
fn env_filter(logging: &LoggingSettings, rust_log: Option<&str>) -> Result<EnvFilter, InfraError> {
    if let Some(spec) = rust_log.filter(|spec| !spec.trim().is_empty()) {
        return EnvFilter::try_new(spec).map_err(|source| InfraError::LogFilter {
            spec: spec.to_string(),
            source,
        });
    }

    let mut filter = EnvFilter::default().add_directive(logging.level.into());
    for spec in &logging.directives {
        let directive = spec.parse().map_err(|source| InfraError::LogFilter {
            spec: spec.clone(),
            source,
        })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn format_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}
