use anyhow::{Context, Result};
use clap::Parser;
use inbody_extract::config::ExtractionConfig;
use inbody_extract::fields::FieldCatalog;
use inbody_extract::matcher::InBodyMatcher;
use inbody_extract::{batch, observability};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Extract body-composition fields from photographed InBody reports
#[derive(Parser, Debug)]
#[command(name = "inbody-extract", version, long_about = None)]
struct Cli {
    /// Report photos to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Working height in pixels the page is resized to
    #[arg(long)]
    target_height: Option<u32>,

    /// Disable skew detection and perspective correction
    #[arg(long)]
    no_perspective: bool,

    /// Skew in degrees above which the page is corrected
    #[arg(long)]
    skew_threshold: Option<f32>,

    /// JSON file with a custom field catalog
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Per-image timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Number of images processed at the same time
    #[arg(long, default_value = "2")]
    jobs: usize,
}

impl Cli {
    fn apply(&self, config: &mut ExtractionConfig) {
        if let Some(height) = self.target_height {
            config.target_height = height;
        }
        if self.no_perspective {
            config.auto_perspective = false;
        }
        if let Some(threshold) = self.skew_threshold {
            config.skew_threshold = threshold;
        }
        if let Some(timeout) = self.timeout_secs {
            config.operation_timeout_secs = timeout;
        }
    }
}

#[cfg(feature = "tesseract")]
fn build_matcher(config: ExtractionConfig, catalog: FieldCatalog) -> Result<InBodyMatcher> {
    let recognizer = inbody_extract::ocr::TesseractRecognizer::new(config.ocr.clone())?;
    recognizer
        .probe()
        .context("Tesseract is not usable with the configured languages")?;
    Ok(InBodyMatcher::new(config, catalog, Arc::new(recognizer))?)
}

#[cfg(not(feature = "tesseract"))]
fn build_matcher(_config: ExtractionConfig, _catalog: FieldCatalog) -> Result<InBodyMatcher> {
    Err(anyhow::anyhow!(
        "no OCR backend compiled in; rebuild with the `tesseract` feature"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize observability stack (tracing)
    observability::init_tracing()?;

    let cli = Cli::parse();

    let mut config = ExtractionConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;
    info!("{}", config.summary());

    let catalog = match &cli.fields {
        Some(path) => FieldCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load field catalog {}", path.display()))?,
        None => FieldCatalog::inbody_default(),
    };

    let timeout = Duration::from_secs(config.operation_timeout_secs);
    let matcher = Arc::new(build_matcher(config, catalog)?);

    let items = batch::extract_many(matcher, cli.images.clone(), timeout, cli.jobs).await;

    let mut failures = 0;
    for item in items {
        let line = match &item.outcome {
            Ok(result) => serde_json::json!({
                "path": item.path.display().to_string(),
                "fields": result,
                "detection_rate": result.detection_rate(),
            }),
            Err(e) => {
                failures += 1;
                serde_json::json!({
                    "path": item.path.display().to_string(),
                    "error": format!("{:#}", e),
                })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{} image(s) failed", failures));
    }
    Ok(())
}
