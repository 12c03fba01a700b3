use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::Ordering;
use std::time::Instant;

use seglabel_processor::cli::{Args, Command};
use seglabel_processor::json_output::JsonMessage;
use seglabel_processor::label_processing::batch::{calculate_final_stats, validate_batch_inputs};
use seglabel_processor::label_processing::class_mapping::ClassMapping;
use seglabel_processor::label_processing::colormap::Colormap;
use seglabel_processor::label_processing::remap::LabelTable;
use seglabel_processor::label_processing::report::ConversionReport;
use seglabel_processor::label_processing::{FileOutcome, ProcessingConfig, ProcessingEngine};
use seglabel_processor::utils::{
    create_progress_bar, error_println, format_duration, validate_inputs, warn_println,
};

/// Load the colormap or class mapping named on the command line
fn load_label_table(args: &Args) -> Result<LabelTable> {
    let table = match &args.command {
        Command::Remap(remap) => LabelTable::ClassMapping(
            ClassMapping::from_yaml_file(&remap.mapping_file, remap.on_duplicate.into())
                .context("Failed to load class mapping")?,
        ),
        Command::Colormap(colormap) => {
            let loaded = Colormap::from_file(&colormap.colormap_file)
                .context("Failed to load colormap")?;
            if loaded.overwritten_entries() > 0 && !args.json_progress {
                warn_println(&format!(
                    "{} colormap lines repeat an earlier color; the last one wins",
                    loaded.overwritten_entries()
                ));
            }
            LabelTable::Colormap(loaded)
        }
    };
    Ok(table)
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;

    let json_mode = args.json_progress;

    if !json_mode {
        println!(
            "{}",
            style("Segmentation Label Processor").bold().blue()
        );
        println!("{}", style("Label image conversion for training pipelines").dim());
        println!();
    }

    validate_inputs(&args)?;

    // Table errors are fatal and happen before anything is written
    let table = load_label_table(&args)?;

    let config = ProcessingConfig {
        traversal: args.traversal_policy(),
        extensions: args.extensions(),
        verbose: args.verbose && !json_mode,
        parallel_jobs: args.parallel_jobs(),
        dry_run: args.dry_run,
        collect_class_counts: args.report,
    };

    validate_batch_inputs(
        args.input_dir(),
        args.output_dir(),
        &config.extensions,
        &config.traversal,
    )?;

    if config.verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Mode: {}", args.command.name());
        println!("  Table: {}", table.describe());
        println!("  Input: {}", args.input_dir().display());
        println!("  Output: {}", args.output_dir().display());
        println!("  Traversal: {:?}", config.traversal);
        println!("  Extensions: {:?}", config.extensions);
        println!("  Parallel jobs: {}", config.parallel_jobs);
        if config.dry_run {
            println!("  Dry run mode: enabled (no files will be written)");
        }
        println!();
    }

    let dry_run_mode = config.dry_run;
    let engine = ProcessingEngine::new(config, table)?;

    let cancel = engine.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    // Initialize multi-progress system
    let multi_progress = MultiProgress::new();
    if json_mode {
        multi_progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let discovery_pb = multi_progress.add(ProgressBar::new_spinner());
    discovery_pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    discovery_pb.set_message("Scanning directories...");

    let entries = engine.discover_images(args.input_dir())?;
    discovery_pb.finish_with_message(format!("✓ Found {} label images", entries.len()));

    if json_mode {
        JsonMessage::started(args.command.name(), entries.len(), dry_run_mode);
    }

    let main_progress = multi_progress.add(create_progress_bar(entries.len() as u64));
    main_progress.set_message("Converting labels");

    let outcomes = engine.process_batch(&entries, args.output_dir(), |outcome, progress| {
        if json_mode {
            match outcome {
                FileOutcome::Processed(result) => JsonMessage::file_completed(
                    &result.input_path,
                    &result.output_path,
                    result.written,
                    result.class_pixels.iter().map(|(id, _)| *id).collect(),
                    result.processing_time,
                ),
                FileOutcome::Failed { error, .. } => {
                    JsonMessage::file_failed(outcome.input_path(), error.to_string())
                }
                FileOutcome::Cancelled(_) => {}
            }
            JsonMessage::progress(
                progress.completed,
                progress.total,
                outcome.relative_path().display().to_string(),
            );
        } else {
            if let FileOutcome::Failed { error, .. } = outcome {
                main_progress.println(format!("{} {}", style("✗").red(), error));
            }
            main_progress.set_position(progress.completed as u64);
            main_progress.set_message(format!(
                "{} ({:.1} files/s)",
                outcome.relative_path().display(),
                progress.items_per_second
            ));
        }
    });

    let stats = calculate_final_stats(&outcomes, start_time.elapsed());

    if json_mode {
        JsonMessage::summary(
            stats.total_files,
            stats.successful,
            stats.failed,
            stats.cancelled,
            stats.total_duration.as_secs_f64(),
        );
    } else {
        if stats.cancelled > 0 {
            main_progress.abandon_with_message("Interrupted");
        } else {
            main_progress.finish_with_message("✓ Conversion complete!");
        }
        println!();

        let header = if dry_run_mode {
            style("Dry Run Results Summary:").bold().cyan()
        } else {
            style("Results Summary:").bold().green()
        };
        println!("{}", header);

        let processed_label = if dry_run_mode {
            "Would be written"
        } else {
            "Successfully processed"
        };
        println!(
            "  {}: {}",
            processed_label,
            style(stats.successful).bold().green()
        );
        if stats.failed > 0 {
            println!("  Failed: {}", style(stats.failed).bold().red());
        }
        if stats.cancelled > 0 {
            println!(
                "  Cancelled (not started): {}",
                style(stats.cancelled).bold().yellow()
            );
        }
        println!(
            "  Success rate: {:.1}%",
            stats.success_rate()
        );
        println!(
            "  Total time: {} (avg {} per file)",
            style(format_duration(stats.total_duration)).bold(),
            format_duration(stats.average_duration())
        );

        if stats.failed > 0 {
            println!();
            println!("{}", style("Failed files:").bold().red());
            for outcome in &outcomes {
                if let FileOutcome::Failed { entry, error } = outcome {
                    println!("  {} {}", style(entry.relative_path.display()).yellow(), error);
                }
            }
        }

        if args.report {
            let mut report = ConversionReport::new();
            for outcome in &outcomes {
                if let FileOutcome::Processed(result) = outcome {
                    report.add(result);
                }
            }
            report.print(engine.table());
        }
    }

    if stats.successful == 0 {
        if !json_mode {
            error_println("No label images were converted");
        }
        std::process::exit(1);
    }

    Ok(())
}
