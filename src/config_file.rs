use crate::cli::{
    Args, Command, Layout, OnDuplicate, DEFAULT_EXTENSIONS, DEFAULT_LABEL_SUBDIR,
    DEFAULT_UNIT_SUBDIR,
};
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;

/// Processing options that can be stored in a JSON file
///
/// Every field is optional; a field only applies when the matching
/// command-line option was not given.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub layout: Option<String>,
    pub subdirs: Option<Vec<String>>,
    pub unit_subdir: Option<String>,
    pub on_duplicate: Option<String>,
    pub extensions: Option<String>,
    pub jobs: Option<usize>,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
    pub report: Option<bool>,
    pub json_progress: Option<bool>,
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            let args_from_cli = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config, &args_from_cli)
                .with_context(|| format!("Invalid value in config file: {:?}", config_path))?;

            if self.verbose && !self.json_progress {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    /// Apply config values for every option the command line left alone
    pub fn merge_from_config(&mut self, config: ConfigFile, args_from_cli: &[String]) -> Result<()> {
        let given = |names: &[&str]| {
            args_from_cli.iter().any(|arg| {
                names
                    .iter()
                    .any(|name| arg == name || arg.starts_with(&format!("{}=", name)))
            })
        };

        if self.traversal_args().layout.is_none() {
            if let Some(layout) = config.layout {
                let layout = Layout::from_str(&layout, true)
                    .map_err(|_| anyhow!("Unknown layout '{}'", layout))?;
                self.traversal_args_mut().layout = Some(layout);
            }
        }

        if !given(&["--subdirs"]) && self.traversal_args().subdirs == [DEFAULT_LABEL_SUBDIR] {
            if let Some(subdirs) = config.subdirs.filter(|s| !s.is_empty()) {
                self.traversal_args_mut().subdirs = subdirs;
            }
        }

        if !given(&["--unit-subdir"]) && self.traversal_args().unit_subdir == DEFAULT_UNIT_SUBDIR {
            if let Some(unit_subdir) = config.unit_subdir {
                self.traversal_args_mut().unit_subdir = unit_subdir;
            }
        }

        if let Some(on_duplicate) = config.on_duplicate {
            let policy = OnDuplicate::from_str(&on_duplicate, true)
                .map_err(|_| anyhow!("Unknown duplicate policy '{}'", on_duplicate))?;
            if let Command::Remap(remap) = &mut self.command {
                if !given(&["--on-duplicate"]) && remap.on_duplicate == OnDuplicate::default() {
                    remap.on_duplicate = policy;
                }
            }
        }

        if !given(&["-e", "--extensions"]) && self.extensions_str == DEFAULT_EXTENSIONS {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        if self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        if !self.report {
            self.report = config.report.unwrap_or(false);
        }

        if !self.json_progress {
            self.json_progress = config.json_progress.unwrap_or(false);
        }

        Ok(())
    }
}
