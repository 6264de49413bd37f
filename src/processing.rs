use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::RunOptions;
use crate::discovery;
use crate::error::{MkabookError, Result};
use crate::output::DisplayOptions;
use crate::pipeline::{ItemPipeline, PipelineOutcome};

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    /// Directory name, used as the display prefix
    pub name: String,
    pub path: PathBuf,
    pub outcome: PipelineOutcome,
}

/// Overall batch results, in enumeration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub items: Vec<ItemReport>,
    pub total_time: Duration,
}

impl BatchSummary {
    pub fn get(&self, name: &str) -> Option<&PipelineOutcome> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.outcome)
    }

    pub fn successful(&self) -> usize {
        self.items.len() - self.failed()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome.is_failure())
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Human-readable report printed at the end of a batch run
    pub fn render(&self) -> String {
        let mut report = String::from("Conversion Summary\n");

        for item in &self.items {
            let marker = match item.outcome {
                PipelineOutcome::Failed { .. } => "[✗]",
                PipelineOutcome::Skipped => "[=]",
                PipelineOutcome::Converted { .. } | PipelineOutcome::Updated { .. } => "[✓]",
            };
            let _ = writeln!(report, "{} {}: {}", marker, item.name, item.outcome);
        }

        let failed = self.failed();
        if failed > 0 {
            let _ = write!(report, "\nEncountered {} errors while processing", failed);
        } else {
            report.push_str("\nBatch Completed Successfully");
        }
        report
    }
}

/// Runs every sub-directory of a root through an [`ItemPipeline`]
pub struct BatchProcessor {
    pipeline: Arc<ItemPipeline>,
    jobs: usize,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<ItemPipeline>, jobs: usize) -> Self {
        let jobs = jobs.max(1);
        info!("🔧 Initializing BatchProcessor with {} jobs", jobs);
        Self { pipeline, jobs }
    }

    /// Process all items directly below `root`
    pub async fn process_directory(&self, root: &Path, options: &RunOptions) -> Result<BatchSummary> {
        info!("📁 Batch root: {}", root.display());
        let items = discovery::discover_items(root)?;

        if items.is_empty() {
            info!("No items found in {}", root.display());
            return Ok(BatchSummary::default());
        }

        info!("📚 Found {} items to process", items.len());
        Ok(self.process_items(items, options).await)
    }

    /// Process `items` with at most `jobs` running at once.
    ///
    /// Every item ends up with exactly one report; a failing or crashing item
    /// never stops the others.
    pub async fn process_items(&self, items: Vec<PathBuf>, options: &RunOptions) -> BatchSummary {
        let start_time = Instant::now();
        let total = items.len();
        let items = Arc::new(items);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<(usize, ItemReport)>(total.max(1));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.jobs.min(total) {
            let items = Arc::clone(&items);
            let cursor = Arc::clone(&cursor);
            let pipeline = Arc::clone(&self.pipeline);
            let options = options.clone();
            let tx = tx.clone();

            workers.spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(path) = items.get(index) else {
                        break;
                    };

                    debug!("👷 Worker {} picked item {}/{}", worker_id, index + 1, items.len());
                    let report = run_item(Arc::clone(&pipeline), path.clone(), options.clone()).await;

                    if let Err(e) = tx.send((index, report)).await {
                        error!("Failed to send result: {}", e);
                        break;
                    }
                }
            });
        }

        // Drop the original sender to close the channel when all workers finish
        drop(tx);

        let mut slots: Vec<Option<ItemReport>> = vec![None; total];
        while let Some((index, report)) = rx.recv().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(report);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Batch worker stopped unexpectedly: {}", e);
            }
        }

        let reports = slots
            .into_iter()
            .zip(items.iter())
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| ItemReport {
                    name: item_name(path),
                    path: path.clone(),
                    outcome: PipelineOutcome::Failed {
                        cause: "Item was never processed".to_string(),
                    },
                })
            })
            .collect();

        let summary = BatchSummary {
            items: reports,
            total_time: start_time.elapsed(),
        };
        info!(
            "🎉 Batch finished in {:.2}s: {} succeeded, {} failed",
            summary.total_time.as_secs_f64(),
            summary.successful(),
            summary.failed()
        );
        summary
    }
}

/// Run one item in its own task so a panic becomes a failed outcome
async fn run_item(pipeline: Arc<ItemPipeline>, path: PathBuf, options: RunOptions) -> ItemReport {
    let name = item_name(&path);
    let display = DisplayOptions::for_item(name.clone());
    let task_path = path.clone();

    let joined = tokio::spawn(async move { pipeline.run(&task_path, &options, &display).await }).await;

    let outcome = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => PipelineOutcome::failed(&e),
        Err(e) => PipelineOutcome::failed(&MkabookError::TaskPanicked {
            reason: e.to_string(),
        }),
    };

    if let PipelineOutcome::Failed { ref cause } = outcome {
        error!("[✗] {}: {}", name, cause.lines().next().unwrap_or_default());
    }

    ItemReport {
        name,
        path,
        outcome,
    }
}

pub fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
