use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::label_processing::class_mapping::DuplicatePolicy;
use crate::label_processing::traversal::TraversalPolicy;

pub const DEFAULT_EXTENSIONS: &str = "png";
pub const DEFAULT_LABEL_SUBDIR: &str = "Rellis_3D_pylon_camera_node_label_id";
pub const DEFAULT_UNIT_SUBDIR: &str = "pylon_camera_node_label_id";

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Layout {
    /// Every matching file below the input directory
    #[value(name = "recursive")]
    Recursive,
    /// Only the directories named by --subdirs, searched recursively
    #[value(name = "subdirs")]
    Subdirs,
    /// Files directly inside <unit>/<unit-subdir> for every unit directory
    #[value(name = "per-unit")]
    PerUnit,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OnDuplicate {
    /// Fail when an original ID is listed under two classes
    #[default]
    #[value(name = "reject")]
    Reject,
    /// The class listed last keeps the original ID
    #[value(name = "last-wins")]
    LastWins,
}

impl From<OnDuplicate> for DuplicatePolicy {
    fn from(value: OnDuplicate) -> Self {
        match value {
            OnDuplicate::Reject => DuplicatePolicy::Reject,
            OnDuplicate::LastWins => DuplicatePolicy::LastWins,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "seglabel-processor",
    version,
    about = "Convert semantic segmentation label images into training class IDs",
    long_about = "
Segmentation Label Processor

Rewrites trees of segmentation label images into single-channel images of
consecutive training class IDs. Two conversions are supported:

• remap:    consolidate original grayscale IDs into classes listed in a YAML file
• colormap: turn color-coded RGB labels into class IDs using a colormap file

Pixels not covered by the table become class 0 (background). The output tree
mirrors the relative paths of the input tree.

Example Usage:
  # Consolidate RELLIS-3D IDs (default label subdirectory)
  seglabel-processor remap ~/rellis ~/rellis_remapped classes.yaml

  # Per-sequence layout with a custom label subdirectory
  seglabel-processor remap ~/rellis ~/out classes.yaml --layout per-unit \\
    --unit-subdir pylon_camera_node_label_id

  # Color-coded labels anywhere below the input directory
  seglabel-processor colormap ~/dataset colormap.txt ~/dataset_ids --report

  # Dry run: show what would be written without touching the output tree
  seglabel-processor --dry-run --verbose colormap ~/dataset colormap.txt ~/out"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Comma-separated list of label image extensions to process
    #[arg(
        short = 'e',
        long = "extensions",
        default_value = DEFAULT_EXTENSIONS,
        global = true
    )]
    pub extensions_str: String,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(
        short = 'j',
        long = "jobs",
        default_value = "0",
        value_name = "N",
        global = true
    )]
    pub jobs: usize,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Decode and convert every file but do not write anything
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Generate conversion report table at the end
    #[arg(
        long = "report",
        global = true,
        help = "Display formatted table with per-file classes and per-class pixel totals"
    )]
    pub report: bool,

    /// Emit JSON lines on stdout instead of progress bars
    #[arg(long = "json-progress", global = true)]
    pub json_progress: bool,

    /// JSON configuration file (command-line values take precedence)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Consolidate grayscale label IDs using an ordered YAML class mapping
    Remap(RemapArgs),
    /// Convert color-coded RGB labels to class IDs using a colormap file
    Colormap(ColormapArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RemapArgs {
    /// Root of the label tree
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Root of the output tree
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// YAML mapping of class names to lists of original IDs
    #[arg(value_name = "MAPPING_FILE")]
    pub mapping_file: PathBuf,

    #[command(flatten)]
    pub traversal: TraversalArgs,

    /// What to do when an original ID is listed under more than one class
    #[arg(long = "on-duplicate", default_value = "reject")]
    pub on_duplicate: OnDuplicate,
}

#[derive(ClapArgs, Debug)]
pub struct ColormapArgs {
    /// Root of the label tree
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Colormap file with `<id> <name> <r> <g> <b>` lines
    #[arg(value_name = "COLORMAP_FILE")]
    pub colormap_file: PathBuf,

    /// Root of the output tree
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub traversal: TraversalArgs,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct TraversalArgs {
    /// Which part of the input tree holds label images
    /// [default: subdirs for remap, recursive for colormap]
    #[arg(long = "layout")]
    pub layout: Option<Layout>,

    /// Directories under INPUT_DIR searched with --layout subdirs
    #[arg(
        long = "subdirs",
        value_name = "NAME",
        num_args = 1..,
        default_value = DEFAULT_LABEL_SUBDIR
    )]
    pub subdirs: Vec<String>,

    /// Label directory inside every unit with --layout per-unit
    #[arg(
        long = "unit-subdir",
        value_name = "NAME",
        default_value = DEFAULT_UNIT_SUBDIR
    )]
    pub unit_subdir: String,
}

impl Default for TraversalArgs {
    fn default() -> Self {
        Self {
            layout: None,
            subdirs: vec![DEFAULT_LABEL_SUBDIR.to_string()],
            unit_subdir: DEFAULT_UNIT_SUBDIR.to_string(),
        }
    }
}

impl Command {
    /// Layout used when neither the command line nor the config file names one
    pub fn default_layout(&self) -> Layout {
        match self {
            Command::Remap(_) => Layout::Subdirs,
            Command::Colormap(_) => Layout::Recursive,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Remap(_) => "remap",
            Command::Colormap(_) => "colormap",
        }
    }
}

impl Args {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn extensions(&self) -> Vec<String> {
        self.parse_extensions()
    }

    pub fn input_dir(&self) -> &Path {
        match &self.command {
            Command::Remap(args) => &args.input_dir,
            Command::Colormap(args) => &args.input_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        match &self.command {
            Command::Remap(args) => &args.output_dir,
            Command::Colormap(args) => &args.output_dir,
        }
    }

    /// Mapping file for remap, colormap file for colormap
    pub fn table_file(&self) -> &Path {
        match &self.command {
            Command::Remap(args) => &args.mapping_file,
            Command::Colormap(args) => &args.colormap_file,
        }
    }

    pub fn traversal_args(&self) -> &TraversalArgs {
        match &self.command {
            Command::Remap(args) => &args.traversal,
            Command::Colormap(args) => &args.traversal,
        }
    }

    pub fn traversal_args_mut(&mut self) -> &mut TraversalArgs {
        match &mut self.command {
            Command::Remap(args) => &mut args.traversal,
            Command::Colormap(args) => &mut args.traversal,
        }
    }

    pub fn layout(&self) -> Layout {
        self.traversal_args()
            .layout
            .unwrap_or_else(|| self.command.default_layout())
    }

    /// Resolve the layout options into a traversal policy
    pub fn traversal_policy(&self) -> TraversalPolicy {
        let traversal = self.traversal_args();
        match self.layout() {
            Layout::Recursive => TraversalPolicy::RecursiveFiltered,
            Layout::Subdirs => TraversalPolicy::NamedSubdirectories(traversal.subdirs.clone()),
            Layout::PerUnit => TraversalPolicy::FixedLayoutPerUnit {
                subdir: traversal.unit_subdir.clone(),
            },
        }
    }

    /// Number of worker threads, 0 meaning one per CPU core
    pub fn parallel_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            command: Command::Colormap(ColormapArgs {
                input_dir: PathBuf::new(),
                colormap_file: PathBuf::new(),
                output_dir: PathBuf::new(),
                traversal: TraversalArgs::default(),
            }),
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            jobs: 0,
            verbose: false,
            dry_run: false,
            report: false,
            json_progress: false,
            config_file: None,
        }
    }
}
