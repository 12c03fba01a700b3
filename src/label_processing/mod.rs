pub mod batch;
pub mod class_mapping;
pub mod colormap;
pub mod remap;
pub mod report;
pub mod traversal;
pub mod writer;

use anyhow::{Context, Result};
use image::ImageReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::LabelError;
use crate::utils::verbose_println;
use batch::BatchProgress;
use remap::{class_histogram, LabelTable};
use traversal::{DirectoryEntry, TraversalPolicy};

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub traversal: TraversalPolicy,
    pub extensions: Vec<String>,
    pub verbose: bool,
    pub parallel_jobs: usize,
    pub dry_run: bool,
    pub collect_class_counts: bool,
}

/// Runs one label table over a tree of label images
///
/// The table is loaded once and shared read-only by every worker of the
/// engine's thread pool. Each file is decoded, transformed and written on its
/// own; a failure only affects that file.
pub struct ProcessingEngine {
    config: ProcessingConfig,
    table: Arc<LabelTable>,
    pool: rayon::ThreadPool,
    cancel: Arc<AtomicBool>,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig, table: LabelTable) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs)
            .build()
            .context("Failed to initialize thread pool")?;

        Ok(Self {
            config,
            table: Arc::new(table),
            pool,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }

    /// Flag that stops the batch before the next file when set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Discover all label images under the input root
    pub fn discover_images(&self, input_root: &Path) -> Result<Vec<DirectoryEntry>, LabelError> {
        verbose_println(
            self.config.verbose,
            &format!("Scanning directory: {}", input_root.display()),
        );

        let entries = traversal::discover(input_root, &self.config.traversal, &self.config.extensions)?;
        if entries.is_empty() {
            return Err(LabelError::NoInputFiles {
                root: input_root.to_path_buf(),
                extensions: self.config.extensions.clone(),
            });
        }

        verbose_println(
            self.config.verbose,
            &format!("Found {} label images", entries.len()),
        );
        Ok(entries)
    }

    /// Process a batch of images with a progress callback
    ///
    /// Outcomes are returned in the order of `entries`.
    pub fn process_batch<F>(
        &self,
        entries: &[DirectoryEntry],
        output_root: &Path,
        progress_callback: F,
    ) -> Vec<FileOutcome>
    where
        F: Fn(&FileOutcome, BatchProgress) + Send + Sync,
    {
        self.pool.install(|| {
            batch::process_items_parallel(
                entries,
                &self.cancel,
                |entry| match self.process_single_image(entry, output_root) {
                    Ok(result) => FileOutcome::Processed(result),
                    Err(error) => FileOutcome::Failed {
                        entry: entry.clone(),
                        error,
                    },
                },
                |entry| FileOutcome::Cancelled(entry.clone()),
                progress_callback,
            )
        })
    }

    /// Decode, transform and write one label image
    pub fn process_single_image(
        &self,
        entry: &DirectoryEntry,
        output_root: &Path,
    ) -> Result<ProcessingResult, LabelError> {
        let start = Instant::now();
        let output_path = entry.output_path(output_root);

        verbose_println(
            self.config.verbose,
            &format!("Processing: {}", entry.path.display()),
        );

        let img = ImageReader::open(&entry.path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| LabelError::ImageRead {
                path: entry.path.clone(),
                source,
            })?
            .decode()
            .map_err(|source| LabelError::ImageDecode {
                path: entry.path.clone(),
                source,
            })?;

        let labels = self.table.apply(&img)?;

        let class_pixels = if self.config.collect_class_counts {
            class_histogram(&labels)
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(class_id, count)| (class_id as u8, *count))
                .collect()
        } else {
            Vec::new()
        };

        if self.config.dry_run {
            verbose_println(
                self.config.verbose,
                &format!("Dry run: would write {}", output_path.display()),
            );
        } else {
            writer::write_label_image(&output_path, &labels)?;
        }

        Ok(ProcessingResult {
            input_path: entry.path.clone(),
            relative_path: entry.relative_path.clone(),
            output_path,
            dimensions: labels.dimensions(),
            class_pixels,
            written: !self.config.dry_run,
            processing_time: start.elapsed(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub relative_path: PathBuf,
    pub output_path: PathBuf,
    pub dimensions: (u32, u32),
    /// Non-zero `(class_id, pixel_count)` pairs of the output image
    pub class_pixels: Vec<(u8, u64)>,
    pub written: bool,
    pub processing_time: Duration,
}

/// What happened to one discovered file
#[derive(Debug)]
pub enum FileOutcome {
    Processed(ProcessingResult),
    Failed {
        entry: DirectoryEntry,
        error: LabelError,
    },
    /// Never started because the batch was interrupted
    Cancelled(DirectoryEntry),
}

impl FileOutcome {
    /// Input path of the file regardless of outcome
    pub fn input_path(&self) -> &Path {
        match self {
            FileOutcome::Processed(result) => &result.input_path,
            FileOutcome::Failed { entry, .. } | FileOutcome::Cancelled(entry) => &entry.path,
        }
    }

    pub fn relative_path(&self) -> &Path {
        match self {
            FileOutcome::Processed(result) => &result.relative_path,
            FileOutcome::Failed { entry, .. } | FileOutcome::Cancelled(entry) => {
                &entry.relative_path
            }
        }
    }
}
