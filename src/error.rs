//! Error types for label loading and per-file conversion.
//!
//! Variants fall into three groups: configuration problems (colormap or
//! mapping files), per-file I/O problems and batch validation problems.
//! Only per-file errors are recoverable; the batch keeps going and counts
//! them as failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid colormap entry on line {line}: {reason}")]
    ColormapLine { line: usize, reason: String },

    #[error("colormap contains no valid '<id> <name> <R> <G> <B>' entries")]
    EmptyColormap,

    #[error("failed to parse class mapping {}: {source}", .path.display())]
    MappingParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("class mapping is empty, nothing to map")]
    EmptyMapping,

    #[error("class mapping declares {count} classes, at most 256 fit in an 8-bit label image")]
    TooManyClasses { count: usize },

    #[error("class id {id} listed under '{class}' is outside 0..=255")]
    ClassIdOutOfRange { class: String, id: i64 },

    #[error("class id {old_id} is listed under both '{first}' and '{second}'")]
    DuplicateClassId {
        old_id: u8,
        first: String,
        second: String,
    },

    #[error("failed to read image {}: {source}", .path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}: {source}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported pixel layout {layout:?}, expected {expected}")]
    UnsupportedLayout {
        layout: image::ColorType,
        expected: &'static str,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan input directory: {0}")]
    Traversal(#[from] walkdir::Error),

    #[error("input directory does not exist: {}", .0.display())]
    InputRootMissing(PathBuf),

    #[error("input path is not a directory: {}", .0.display())]
    InputRootNotDirectory(PathBuf),

    #[error("output directory is the input directory: {}", .0.display())]
    OutputIsInput(PathBuf),

    #[error("output directory {} is inside the input tree and would be scanned again", .0.display())]
    OutputInsideInput(PathBuf),

    #[error("subdirectory name '{0}' must be a relative path inside the input directory")]
    InvalidSubdirectory(String),

    #[error("discovered file is outside the input directory: {}", .0.display())]
    OutsideInputRoot(PathBuf),

    #[error("no file extensions specified")]
    NoExtensions,

    #[error("no input files with extensions {extensions:?} found under {}", .root.display())]
    NoInputFiles {
        root: PathBuf,
        extensions: Vec<String>,
    },
}

impl LabelError {
    /// Whether the error must abort the run instead of skipping one file.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LabelError::ImageRead { .. }
                | LabelError::ImageDecode { .. }
                | LabelError::UnsupportedLayout { .. }
                | LabelError::ImageEncode { .. }
                | LabelError::Write { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_file_errors_are_not_fatal() {
        let err = LabelError::ImageRead {
            path: PathBuf::from("a.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!err.is_fatal());

        let err = LabelError::UnsupportedLayout {
            layout: image::ColorType::Rgb8,
            expected: "an 8-bit single-channel image",
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_and_validation_errors_are_fatal() {
        assert!(LabelError::EmptyMapping.is_fatal());
        assert!(LabelError::EmptyColormap.is_fatal());
        assert!(LabelError::InputRootMissing(PathBuf::from("in")).is_fatal());
        assert!(LabelError::NoInputFiles {
            root: PathBuf::from("in"),
            extensions: vec!["png".to_string()],
        }
        .is_fatal());
    }

    #[test]
    fn test_duplicate_message_names_both_classes() {
        let err = LabelError::DuplicateClassId {
            old_id: 31,
            first: "water".to_string(),
            second: "obstacle".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("31"));
        assert!(msg.contains("water"));
        assert!(msg.contains("obstacle"));
    }
}
