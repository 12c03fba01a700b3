// Library exports for reuse by the command-line tool and other applications
pub mod cli;
pub mod config_file;
pub mod error;
pub mod json_output;
pub mod label_processing;
pub mod utils;

// Re-export commonly used types
pub use cli::{Layout, OnDuplicate};
pub use error::LabelError;
pub use json_output::JsonMessage;
pub use label_processing::class_mapping::{ClassMapping, DuplicatePolicy};
pub use label_processing::colormap::Colormap;
pub use label_processing::remap::LabelTable;
pub use label_processing::traversal::{DirectoryEntry, TraversalPolicy};
pub use label_processing::{
    FileOutcome, ProcessingConfig, ProcessingEngine, ProcessingResult,
};
