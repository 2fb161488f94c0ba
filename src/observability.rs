//! Observability module for logging, tracing spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Span helpers for extractions and individual fields
//! - Metric recording through the `metrics` facade
//!
//! No metrics exporter is installed here; an embedding application installs
//! its own recorder and the counters below flow into it.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

static METRICS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    METRICS_ENABLED.store(config.enable_metrics, Ordering::Relaxed);

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("inbody_extract={}", config.log_level).parse()?);

    if config.use_pretty_format() {
        // Pretty formatting for development
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        // JSON formatting for production
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Initialize logging from environment variables
pub fn init_tracing() -> Result<()> {
    init_tracing_with_config(&ObservabilityConfig::from_env())
}

/// Create a span covering one extraction call
pub fn extraction_span(source: &str, target_height: u32) -> tracing::Span {
    tracing::info_span!(
        "extraction",
        source = source,
        target_height = target_height,
        component = "matcher"
    )
}

/// Create a span for matching a single field
pub fn field_span(field: &str) -> tracing::Span {
    tracing::debug_span!("field_match", field = field, component = "field_matcher")
}

fn metrics_enabled() -> bool {
    METRICS_ENABLED.load(Ordering::Relaxed)
}

/// Record the outcome and duration of one extraction
pub fn record_extraction_metrics(success: bool, duration: std::time::Duration) {
    if !metrics_enabled() {
        return;
    }
    metrics::counter!("inbody_extractions_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("inbody_extraction_duration_seconds").record(duration.as_secs_f64());
}

/// Record per-field outcomes and the detection rate of one report
pub fn record_field_metrics(detected: usize, not_detected: usize, skipped: usize, detection_rate: f64) {
    if !metrics_enabled() {
        return;
    }
    metrics::counter!("inbody_fields_total", "outcome" => "detected").increment(detected as u64);
    metrics::counter!("inbody_fields_total", "outcome" => "not_detected").increment(not_detected as u64);
    metrics::counter!("inbody_fields_total", "outcome" => "skipped").increment(skipped as u64);
    metrics::histogram!("inbody_detection_rate").record(detection_rate);
}

/// Record which geometric correction the preprocessor applied
pub fn record_preprocess_correction(kind: &'static str, degraded: bool) {
    if !metrics_enabled() {
        return;
    }
    let kind = if degraded { "degraded" } else { kind };
    metrics::counter!("inbody_preprocess_corrections_total", "kind" => kind).increment(1);
}
