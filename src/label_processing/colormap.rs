use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::LabelError;

/// RGB color key as stored in annotation images
pub type RgbKey = [u8; 3];

/// Lookup table from an annotation color to a class ID
///
/// Loaded from a text file with one `<class_id> <class_name> <R> <G> <B>` entry
/// per line. Lines with any other token count are ignored, so headers and
/// blank lines need no special handling. When the same color appears twice
/// the later line wins. Several colors may share one class ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Colormap {
    entries: BTreeMap<RgbKey, u8>,
    names: BTreeMap<u8, String>,
    overwritten: usize,
}

impl Colormap {
    /// Load a colormap from disk
    pub fn from_file(path: &Path) -> Result<Self, LabelError> {
        let contents = fs::read_to_string(path).map_err(|source| LabelError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse colormap text
    pub fn parse(contents: &str) -> Result<Self, LabelError> {
        let mut colormap = Colormap::default();

        for (index, line) in contents.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 5 {
                continue;
            }

            let line_number = index + 1;
            let class_id = parse_component(tokens[0], "class id", line_number)?;
            let rgb = [
                parse_component(tokens[2], "red", line_number)?,
                parse_component(tokens[3], "green", line_number)?,
                parse_component(tokens[4], "blue", line_number)?,
            ];

            if colormap.entries.insert(rgb, class_id).is_some() {
                colormap.overwritten += 1;
            }
            colormap
                .names
                .entry(class_id)
                .or_insert_with(|| tokens[1].to_string());
        }

        if colormap.entries.is_empty() {
            return Err(LabelError::EmptyColormap);
        }

        Ok(colormap)
    }

    pub fn get(&self, rgb: RgbKey) -> Option<u8> {
        self.entries.get(&rgb).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by color
    pub fn iter(&self) -> impl Iterator<Item = (RgbKey, u8)> + '_ {
        self.entries.iter().map(|(rgb, id)| (*rgb, *id))
    }

    /// Distinct class IDs, ascending
    pub fn class_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.entries.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Name given to a class ID by its first colormap line
    pub fn class_name(&self, class_id: u8) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    /// Number of lines that replaced an earlier entry for the same color
    pub fn overwritten_entries(&self) -> usize {
        self.overwritten
    }
}

fn parse_component(token: &str, what: &str, line: usize) -> Result<u8, LabelError> {
    let value: i64 = token.parse().map_err(|_| LabelError::ColormapLine {
        line,
        reason: format!("{} '{}' is not an integer", what, token),
    })?;

    u8::try_from(value).map_err(|_| LabelError::ColormapLine {
        line,
        reason: format!("{} {} is outside 0..=255", what, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_colormap() {
        let colormap = Colormap::parse("0 background 0 0 0\n1 water 0 0 255\n").unwrap();

        assert_eq!(colormap.len(), 2);
        assert_eq!(colormap.get([0, 0, 0]), Some(0));
        assert_eq!(colormap.get([0, 0, 255]), Some(1));
        assert_eq!(colormap.get([10, 10, 10]), None);
        assert_eq!(colormap.class_name(1), Some("water"));
    }

    #[test]
    fn test_lines_with_wrong_token_count_are_ignored() {
        let text = "# id name r g b\n\n3 grass 0 102 0\n4 tree 0 255\n5 sky blue 0 0 255 extra\n";
        let colormap = Colormap::parse(text).unwrap();

        assert_eq!(colormap.len(), 1);
        assert_eq!(colormap.get([0, 102, 0]), Some(3));
    }

    #[test]
    fn test_duplicate_color_last_line_wins() {
        let colormap = Colormap::parse("1 water 0 0 255\n7 puddle 0 0 255\n").unwrap();

        assert_eq!(colormap.len(), 1);
        assert_eq!(colormap.get([0, 0, 255]), Some(7));
        assert_eq!(colormap.overwritten_entries(), 1);
    }

    #[test]
    fn test_multiple_colors_may_share_a_class() {
        let colormap = Colormap::parse("2 road 128 64 128\n2 road 140 140 140\n").unwrap();

        assert_eq!(colormap.len(), 2);
        assert_eq!(colormap.class_ids(), vec![2]);
    }

    #[test]
    fn test_non_numeric_token_is_rejected() {
        let err = Colormap::parse("0 background 0 0 0\n1 water 0 zero 255\n").unwrap_err();
        assert!(matches!(err, LabelError::ColormapLine { line: 2, .. }));
    }

    #[test]
    fn test_out_of_range_component_is_rejected() {
        let err = Colormap::parse("1 water 0 0 256\n").unwrap_err();
        assert!(matches!(err, LabelError::ColormapLine { line: 1, .. }));

        let err = Colormap::parse("300 water 0 0 255\n").unwrap_err();
        assert!(matches!(err, LabelError::ColormapLine { line: 1, .. }));
    }

    #[test]
    fn test_empty_colormap_is_rejected() {
        assert!(matches!(
            Colormap::parse("only header\n").unwrap_err(),
            LabelError::EmptyColormap
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = Colormap::from_file(&temp.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, LabelError::ConfigRead { .. }));
    }
}
