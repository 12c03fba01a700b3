use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::traversal::{check_input_root, TraversalPolicy};
use super::FileOutcome;
use crate::error::LabelError;
use crate::utils::ProcessingStats;

/// Batch processing statistics and progress tracking
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let elapsed = self.start_time.elapsed();
        let remaining = self.total_files.saturating_sub(processed);

        if remaining == 0 {
            return Some(Duration::new(0, 0));
        }

        let time_per_item = elapsed / processed as u32;
        Some(time_per_item * remaining as u32)
    }

    /// Get processing speed (items per second)
    pub fn items_per_second(&self) -> f64 {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }

        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        processed as f64 / elapsed_secs
    }
}

/// Progress snapshot handed to the callback after every item
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
    pub eta: Option<Duration>,
    pub items_per_second: f64,
}

/// Process items in parallel until done or cancelled
///
/// `cancel` is checked before each item starts; items that never started are
/// passed to `on_cancel` instead of `process_fn`. Results keep input order.
pub fn process_items_parallel<I, T, F, C, P>(
    items: &[I],
    cancel: &AtomicBool,
    process_fn: F,
    on_cancel: C,
    progress_callback: P,
) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Send + Sync,
    C: Fn(&I) -> T + Send + Sync,
    P: Fn(&T, BatchProgress) + Send + Sync,
{
    let processor = BatchProcessor::new(items.len());

    items
        .par_iter()
        .map(|item| {
            let result = if cancel.load(Ordering::SeqCst) {
                on_cancel(item)
            } else {
                process_fn(item)
            };

            let completed = processor.increment();
            progress_callback(
                &result,
                BatchProgress {
                    completed,
                    total: processor.total_files,
                    fraction: processor.progress(),
                    eta: processor.eta(),
                    items_per_second: processor.items_per_second(),
                },
            );

            result
        })
        .collect()
}

/// Summarize outcomes of a finished batch
pub fn calculate_final_stats(outcomes: &[FileOutcome], processing_time: Duration) -> ProcessingStats {
    let mut stats = ProcessingStats::new(outcomes.len());
    for outcome in outcomes {
        match outcome {
            FileOutcome::Processed(_) => stats.successful += 1,
            FileOutcome::Failed { .. } => stats.failed += 1,
            FileOutcome::Cancelled(_) => stats.cancelled += 1,
        }
    }
    stats.total_duration = processing_time;
    stats
}

/// Validate batch processing inputs before anything is written
pub fn validate_batch_inputs(
    input_root: &Path,
    output_root: &Path,
    extensions: &[String],
    policy: &TraversalPolicy,
) -> Result<(), LabelError> {
    check_input_root(input_root)?;
    policy.validate()?;

    if extensions.is_empty() {
        return Err(LabelError::NoExtensions);
    }

    // Writing into the scanned tree would replace the source labels or get
    // picked up again by the next run
    if let (Ok(input), Some(output)) = (input_root.canonicalize(), resolve_path(output_root)) {
        if input == output {
            return Err(LabelError::OutputIsInput(output));
        }
        if let Ok(relative) = output.strip_prefix(&input) {
            if policy.covers(relative) {
                return Err(LabelError::OutputInsideInput(output));
            }
        }
    }

    Ok(())
}

/// Canonicalize the longest existing prefix of `path` and append the rest
fn resolve_path(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        let existing = if current.as_os_str().is_empty() {
            Path::new(".")
        } else {
            current
        };
        if let Ok(canonical) = existing.canonicalize() {
            return Some(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        missing.push(current.file_name()?);
        current = current.parent()?;
    }
}
