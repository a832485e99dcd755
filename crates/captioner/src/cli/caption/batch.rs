//! Batch execution: progress, Ctrl-C cancellation, sidecar writes and the summary.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use captioner_core::{CaptionResult, CaptionStore, Captioner, GenerationManager};
use indicatif::{ProgressBar, ProgressStyle};

use super::types::CaptionRecord;
use super::CaptionPlan;

/// Counters for one batch run.
#[derive(Debug, Default)]
pub(crate) struct BatchStats {
    pub succeeded: u64,
    /// Every image that did not end with a saved caption, cancelled ones included
    pub failed: u64,
    pub cancelled: u64,
    pub elapsed: Duration,
}

impl BatchStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Saved => self.succeeded += 1,
            Outcome::Cancelled => {
                self.failed += 1;
                self.cancelled += 1;
            }
            Outcome::Failed => self.failed += 1,
        }
    }

    fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.succeeded + self.failed) as f64 / secs
        } else {
            0.0
        }
    }

    /// Print a formatted summary table after the batch.
    pub(crate) fn print_summary(&self, skipped: usize) {
        let total = self.succeeded + self.failed + skipped as u64;

        eprintln!();
        eprintln!("  ====================================");
        eprintln!("               Summary");
        eprintln!("  ====================================");
        eprintln!("    Captioned:    {:>8}", self.succeeded);
        if self.failed > 0 {
            eprintln!("    Failed:       {:>8}", self.failed);
        }
        if self.cancelled > 0 {
            eprintln!("      cancelled:  {:>8}", self.cancelled);
        }
        if skipped > 0 {
            eprintln!("    Skipped:      {:>8}", skipped);
        }
        eprintln!("  ------------------------------------");
        eprintln!("    Total:        {:>8}", total);
        eprintln!("    Duration:     {:>7.1}s", self.elapsed.as_secs_f64());
        eprintln!("    Rate:         {:>7.1} img/sec", self.rate());
        eprintln!("  ====================================");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Saved,
    Cancelled,
    Failed,
}

/// Caption `images` as one batch, saving each caption as it arrives.
pub(crate) async fn run_batch(
    captioner: &Captioner,
    store: &dyn CaptionStore,
    plan: &CaptionPlan,
    images: Vec<PathBuf>,
    json: bool,
) -> anyhow::Result<BatchStats> {
    let manager = captioner.manager();
    let progress = create_progress_bar(images.len() as u64);
    let mut batch =
        manager.generate_batch_with(&plan.backend, images, &plan.prompt, plan.parallel)?;
    let interrupt = spawn_interrupt_handler(manager.clone(), progress.clone());

    let start = Instant::now();
    let mut stats = BatchStats::default();

    while let Some(result) = batch.recv().await {
        let save_error = save(store, &result);
        stats.record(classify(&result, save_error.as_deref()));

        if json {
            let line = serde_json::to_string(&CaptionRecord::new(&result, save_error))?;
            progress.suspend(|| println!("{line}"));
        }

        progress.inc(1);
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let processed = stats.succeeded + stats.failed;
            progress.set_message(format!("{:.1} img/sec", processed as f64 / elapsed));
        }
    }

    interrupt.abort();
    progress.finish_and_clear();
    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Persist a successful caption. Returns the error text if writing failed.
fn save(store: &dyn CaptionStore, result: &CaptionResult) -> Option<String> {
    if !result.is_success() {
        return None;
    }
    match store.save_caption(result.image_path(), result.caption()) {
        Ok(()) => None,
        Err(e) => Some(format!("Failed to save caption: {e}")),
    }
}

fn classify(result: &CaptionResult, save_error: Option<&str>) -> Outcome {
    if let Some(e) = save_error {
        tracing::error!("Failed: {:?} - {e}", result.image_path());
        return Outcome::Failed;
    }
    match result.error() {
        None => Outcome::Saved,
        Some(_) if result.is_cancelled() => {
            tracing::debug!("Cancelled: {:?}", result.image_path());
            Outcome::Cancelled
        }
        Some(e) => {
            tracing::error!("Failed: {:?} - {e}", result.image_path());
            Outcome::Failed
        }
    }
}

/// Cancel every outstanding request on the first Ctrl-C.
///
/// Cancelled items still report back, so the batch drains normally and the
/// summary accounts for them.
fn spawn_interrupt_handler(
    manager: GenerationManager,
    progress: ProgressBar,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            progress.set_message("cancelling...");
            let count = manager.cancel_all();
            tracing::warn!("Interrupted, cancelled {count} outstanding requests");
        }
    })
}

/// Create a progress bar for batch captioning.
fn create_progress_bar(total: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}
