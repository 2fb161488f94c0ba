//! # Batch Extraction
//!
//! Runs several extractions concurrently on Tokio's blocking pool. The
//! engine itself is synchronous and cannot be cancelled, so the timeout is
//! applied on the caller side: a timed-out image is reported as failed while
//! its worker finishes in the background.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::matcher::{ExtractionResult, InBodyMatcher};

/// Outcome for one input of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub outcome: Result<ExtractionResult>,
    pub duration: Duration,
}

/// Extracts every image in `paths`, at most `max_concurrency` at a time.
///
/// Results come back in input order, one per input. A failed or timed-out
/// image never affects the others. A timed-out worker keeps its slot until it
/// actually finishes.
pub async fn extract_many(
    matcher: Arc<InBodyMatcher>,
    paths: Vec<PathBuf>,
    timeout: Duration,
    max_concurrency: usize,
) -> Vec<BatchItem> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let batch_start = Instant::now();

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let matcher = Arc::clone(&matcher);
            let semaphore = Arc::clone(&semaphore);
            let task_path = path.clone();
            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => extract_one(matcher, task_path.clone(), timeout, permit).await,
                    Err(e) => Err(anyhow!("batch semaphore closed: {}", e)),
                };
                BatchItem {
                    path: task_path,
                    outcome,
                    duration: start.elapsed(),
                }
            });
            (path, handle)
        })
        .collect();

    let items = collect_items(handles, batch_start).await;

    let failed = items.iter().filter(|item| item.outcome.is_err()).count();
    info!(
        images = items.len(),
        failed,
        duration_ms = batch_start.elapsed().as_millis() as u64,
        "Batch extraction finished"
    );
    items
}

/// Awaits every task in order; a task that died becomes a failed item.
async fn collect_items(
    handles: Vec<(PathBuf, JoinHandle<BatchItem>)>,
    batch_start: Instant,
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        match handle.await {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(image = %path.display(), error = %e, "Batch task panicked");
                items.push(BatchItem {
                    path,
                    outcome: Err(anyhow!("batch task failed: {}", e)),
                    duration: batch_start.elapsed(),
                });
            }
        }
    }
    items
}

async fn extract_one(
    matcher: Arc<InBodyMatcher>,
    path: PathBuf,
    timeout: Duration,
    permit: OwnedSemaphorePermit,
) -> Result<ExtractionResult> {
    let source = path.display().to_string();
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        matcher.extract_and_match(&path)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            let result = joined.context("extraction worker panicked")?;
            result.with_context(|| format!("extraction failed for {}", source))
        }
        Err(_) => {
            warn!(
                image = %source,
                timeout_ms = timeout.as_millis() as u64,
                "Extraction timed out"
            );
            Err(anyhow!(
                "extraction of {} timed out after {:?}",
                source,
                timeout
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::errors::InBodyResult;
    use crate::fields::FieldCatalog;
    use crate::ocr::{Recognizer, TextNode};
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Sleeps on every call and records the peak number of concurrent calls.
    struct CountingRecognizer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl Recognizer for CountingRecognizer {
        fn name(&self) -> &str {
            "counting"
        }

        fn recognize(&self, _image: &DynamicImage) -> InBodyResult<Vec<TextNode>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_workers_keep_their_slot() {
        let recognizer = Arc::new(CountingRecognizer {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::from_millis(150),
        });
        let config = ExtractionConfig {
            target_height: 200,
            auto_perspective: false,
            ..Default::default()
        };
        let matcher = InBodyMatcher::new(
            config,
            FieldCatalog::inbody_default(),
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.png");
        DynamicImage::new_luma8(60, 100).save(&path).unwrap();

        let items = extract_many(
            Arc::new(matcher),
            vec![path.clone(), path.clone(), path],
            Duration::from_millis(20),
            1,
        )
        .await;

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.outcome.is_err()));

        // Let the last detached worker finish before reading the peak
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(recognizer.peak.load(Ordering::SeqCst), 1);
    }

    async fn crashing_task() -> BatchItem {
        panic!("worker crashed")
    }

    #[tokio::test]
    async fn test_dead_task_still_yields_an_item() {
        let ok_path = PathBuf::from("first.png");
        let dead_path = PathBuf::from("second.png");
        let ok_item_path = ok_path.clone();

        let handles = vec![
            (
                ok_path,
                tokio::spawn(async move {
                    BatchItem {
                        path: ok_item_path,
                        outcome: Err(anyhow!("unreadable")),
                        duration: Duration::ZERO,
                    }
                }),
            ),
            (dead_path.clone(), tokio::spawn(crashing_task())),
        ];

        let items = collect_items(handles, Instant::now()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, PathBuf::from("first.png"));
        assert_eq!(items[1].path, dead_path);
        let err = items[1].outcome.as_ref().unwrap_err();
        assert!(err.to_string().contains("batch task failed"));
    }
}
