//! JSON output for tool integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Batch started after discovery
    Started {
        command: String,
        total_files: usize,
        dry_run: bool,
    },
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// File processing completed
    FileCompleted {
        input_path: String,
        output_path: String,
        written: bool,
        classes: Vec<u8>,
        processing_time_ms: u128,
    },
    /// File processing failed
    FileFailed { input_path: String, error: String },
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        failed: usize,
        cancelled: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn started(command: &str, total_files: usize, dry_run: bool) {
        Self::Started {
            command: command.to_string(),
            total_files,
            dry_run,
        }
        .emit();
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final progress (current == total) is always emitted.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        if should_emit_progress(&LAST_PROGRESS_MS, now_ms, current, total) {
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    /// Create and emit file completed message
    pub fn file_completed(
        input_path: &Path,
        output_path: &Path,
        written: bool,
        classes: Vec<u8>,
        processing_time: Duration,
    ) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            written,
            classes,
            processing_time_ms: processing_time.as_millis(),
        }
        .emit();
    }

    /// Create and emit file failed message
    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }

    /// Create and emit summary message
    pub fn summary(
        total_files: usize,
        processed: usize,
        failed: usize,
        cancelled: usize,
        duration_secs: f64,
    ) {
        Self::Summary {
            total_files,
            processed,
            failed,
            cancelled,
            duration_secs,
        }
        .emit();
    }
}

/// Emit if the interval has passed since the last emission or this is the final update
fn should_emit_progress(last: &AtomicU64, now_ms: u64, current: usize, total: usize) -> bool {
    let last_ms = last.load(Ordering::Relaxed);
    if now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total {
        last.store(now_ms, Ordering::Relaxed);
        true
    } else {
        false
    }
}
