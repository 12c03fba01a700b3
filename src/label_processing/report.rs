//! Conversion report for the `--report` flag
//!
//! Lists every converted file with its size, the classes present in the
//! output and the time spent, followed by the pixel totals per class over the
//! whole run.
use prettytable::{format, Cell, Row, Table};
use std::path::Path;
use std::time::Duration;

use super::remap::LabelTable;
use super::ProcessingResult;
use crate::utils::format_duration;

/// Single converted file
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub relative_path: String,
    pub width: u32,
    pub height: u32,
    pub classes: Vec<u8>,
    pub processing_time: Duration,
}

#[derive(Debug)]
pub struct ConversionReport {
    pub entries: Vec<ReportEntry>,
    pub class_totals: [u64; 256],
}

impl Default for ConversionReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionReport {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            class_totals: [0; 256],
        }
    }

    /// Add a processed file
    pub fn add(&mut self, result: &ProcessingResult) {
        for &(class_id, count) in &result.class_pixels {
            self.class_totals[class_id as usize] += count;
        }

        self.entries.push(ReportEntry {
            relative_path: path_string(&result.relative_path),
            width: result.dimensions.0,
            height: result.dimensions.1,
            classes: result.class_pixels.iter().map(|(id, _)| *id).collect(),
            processing_time: result.processing_time,
        });
    }

    /// Total pixels counted over all files
    pub fn total_pixels(&self) -> u64 {
        self.class_totals.iter().sum()
    }

    /// Print the report as formatted tables
    pub fn print(&self, table: &LabelTable) {
        println!();
        println!("CONVERSION REPORT ({} files)", self.entries.len());
        println!();

        let mut files = Table::new();
        files.set_format(*format::consts::FORMAT_BOX_CHARS);
        files.add_row(Row::new(vec![
            Cell::new("File"),
            Cell::new("Size"),
            Cell::new("Classes"),
            Cell::new("Time"),
        ]));
        for entry in &self.entries {
            files.add_row(Row::new(vec![
                Cell::new(&truncate(&entry.relative_path, 48)),
                Cell::new(&format!("{}x{}", entry.width, entry.height)),
                Cell::new(&format_classes(&entry.classes)),
                Cell::new(&format_duration(entry.processing_time)),
            ]));
        }
        files.printstd();
        println!();

        let total = self.total_pixels();
        if total == 0 {
            return;
        }

        let mut classes = Table::new();
        classes.set_format(*format::consts::FORMAT_BOX_CHARS);
        classes.add_row(Row::new(vec![
            Cell::new("Class"),
            Cell::new("Name"),
            Cell::new("Pixels"),
            Cell::new("Share"),
        ]));
        for (class_id, count) in self.class_totals.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let name = table.class_name(class_id as u8).unwrap_or("-");
            classes.add_row(Row::new(vec![
                Cell::new(&class_id.to_string()),
                Cell::new(name),
                Cell::new(&count.to_string()),
                Cell::new(&format!("{:.2}%", *count as f64 / total as f64 * 100.0)),
            ]));
        }
        classes.printstd();
        println!();
    }
}

/// Compact class list, e.g. `0,1,4`
fn format_classes(classes: &[u8]) -> String {
    if classes.is_empty() {
        return "-".to_string();
    }
    classes
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Truncate string to fit in column, keeping the end of the path
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max_len - 1)).collect();
        format!("…{}", tail)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(relative: &str, class_pixels: Vec<(u8, u64)>) -> ProcessingResult {
        ProcessingResult {
            input_path: PathBuf::from("in").join(relative),
            relative_path: PathBuf::from(relative),
            output_path: PathBuf::from("out").join(relative),
            dimensions: (4, 2),
            class_pixels,
            written: true,
            processing_time: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_report_accumulates_class_totals() {
        let mut report = ConversionReport::new();
        report.add(&result("a.png", vec![(0, 6), (1, 2)]));
        report.add(&result("b.png", vec![(1, 8)]));

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.class_totals[0], 6);
        assert_eq!(report.class_totals[1], 10);
        assert_eq!(report.total_pixels(), 16);
        assert_eq!(report.entries[0].classes, vec![0, 1]);
    }

    #[test]
    fn test_format_classes() {
        assert_eq!(format_classes(&[]), "-");
        assert_eq!(format_classes(&[0, 3, 12]), "0,3,12");
    }

    #[test]
    fn test_truncate_keeps_path_tail() {
        assert_eq!(truncate("short.png", 20), "short.png");
        let truncated = truncate("very/long/directory/name/frame000123.png", 16);
        assert_eq!(truncated.chars().count(), 16);
        assert!(truncated.ends_with("frame000123.png"));
    }
}
