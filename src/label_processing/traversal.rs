use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::LabelError;
use crate::utils::has_valid_extension;

/// Which part of the input tree holds label images
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalPolicy {
    /// Every matching file anywhere below the input root
    RecursiveFiltered,
    /// Only the named directories directly under the input root, searched recursively
    NamedSubdirectories(Vec<String>),
    /// Every child of the input root is a unit (e.g. one recording session);
    /// only the files directly inside `<unit>/<subdir>` are used
    FixedLayoutPerUnit { subdir: String },
}

impl TraversalPolicy {
    /// Subdirectory names must stay inside the input root
    pub fn validate(&self) -> Result<(), LabelError> {
        match self {
            TraversalPolicy::RecursiveFiltered => Ok(()),
            TraversalPolicy::NamedSubdirectories(names) => {
                names.iter().try_for_each(|name| check_subdir_name(name))
            }
            TraversalPolicy::FixedLayoutPerUnit { subdir } => check_subdir_name(subdir),
        }
    }

    /// Whether files below `relative` (a directory under the input root)
    /// can be selected by this policy
    pub fn covers(&self, relative: &Path) -> bool {
        match self {
            TraversalPolicy::RecursiveFiltered => true,
            TraversalPolicy::NamedSubdirectories(names) => {
                names.iter().any(|name| relative.starts_with(name))
            }
            TraversalPolicy::FixedLayoutPerUnit { subdir } => {
                let mut components = relative.components();
                components.next().is_some() && components.as_path().starts_with(subdir)
            }
        }
    }
}

fn check_subdir_name(name: &str) -> Result<(), LabelError> {
    let path = Path::new(name);
    let relative = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if relative {
        Ok(())
    } else {
        Err(LabelError::InvalidSubdirectory(name.to_string()))
    }
}

/// A discovered input file and its location relative to the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    pub relative_path: PathBuf,
}

impl DirectoryEntry {
    fn new(input_root: &Path, path: PathBuf) -> Result<Self, LabelError> {
        let relative_path = match path.strip_prefix(input_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => return Err(LabelError::OutsideInputRoot(path)),
        };
        Ok(Self {
            path,
            relative_path,
        })
    }

    /// Destination of this file under `output_root`, same relative layout
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.relative_path)
    }
}

/// Collect the label images selected by `policy`, sorted by relative path
pub fn discover(
    input_root: &Path,
    policy: &TraversalPolicy,
    extensions: &[String],
) -> Result<Vec<DirectoryEntry>, LabelError> {
    check_input_root(input_root)?;
    policy.validate()?;

    let mut files = Vec::new();
    match policy {
        TraversalPolicy::RecursiveFiltered => {
            collect_files(input_root, None, extensions, &mut files)?;
        }
        TraversalPolicy::NamedSubdirectories(names) => {
            for name in names {
                let subdir = input_root.join(name);
                if subdir.is_dir() {
                    collect_files(&subdir, None, extensions, &mut files)?;
                }
            }
        }
        TraversalPolicy::FixedLayoutPerUnit { subdir } => {
            for unit in list_units(input_root)? {
                let label_dir = unit.join(subdir);
                if label_dir.is_dir() {
                    collect_files(&label_dir, Some(1), extensions, &mut files)?;
                }
            }
        }
    }

    let mut entries = files
        .into_iter()
        .map(|path| DirectoryEntry::new(input_root, path))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    entries.dedup_by(|a, b| a.relative_path == b.relative_path);

    Ok(entries)
}

pub fn check_input_root(input_root: &Path) -> Result<(), LabelError> {
    if !input_root.exists() {
        return Err(LabelError::InputRootMissing(input_root.to_path_buf()));
    }
    if !input_root.is_dir() {
        return Err(LabelError::InputRootNotDirectory(input_root.to_path_buf()));
    }
    Ok(())
}

fn collect_files(
    dir: &Path,
    max_depth: Option<usize>,
    extensions: &[String],
    files: &mut Vec<PathBuf>,
) -> Result<(), LabelError> {
    let mut walker = WalkDir::new(dir).follow_links(false).min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    for entry in walker {
        let entry = entry?;
        // path().is_file() follows symlinked files
        if entry.path().is_file() && has_valid_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

fn list_units(input_root: &Path) -> Result<Vec<PathBuf>, LabelError> {
    let mut units = Vec::new();
    for entry in WalkDir::new(input_root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.path().is_dir() {
            units.push(entry.into_path());
        }
    }
    units.sort();
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn relative_paths(entries: &[DirectoryEntry]) -> Vec<PathBuf> {
        entries.iter().map(|e| e.relative_path.clone()).collect()
    }

    fn png() -> Vec<String> {
        vec!["png".to_string()]
    }

    #[test]
    fn test_recursive_selects_by_extension() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "a/b/img.png");
        touch(temp.path(), "a/readme.txt");
        touch(temp.path(), "top.PNG");

        let entries = discover(temp.path(), &TraversalPolicy::RecursiveFiltered, &png()).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![PathBuf::from("a/b/img.png"), PathBuf::from("top.PNG")]
        );
        assert_eq!(
            entries[0].output_path(Path::new("/out")),
            PathBuf::from("/out/a/b/img.png")
        );
    }

    #[test]
    fn test_named_subdirectories_only() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "labels/seq0/0001.png");
        touch(temp.path(), "images/seq0/0001.png");
        touch(temp.path(), "root.png");

        let policy = TraversalPolicy::NamedSubdirectories(vec![
            "labels".to_string(),
            "missing".to_string(),
        ]);
        let entries = discover(temp.path(), &policy, &png()).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![PathBuf::from("labels/seq0/0001.png")]
        );
    }

    #[test]
    fn test_fixed_layout_per_unit() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "00000/pylon_camera_node_label_id/frame0.png");
        touch(temp.path(), "00000/pylon_camera_node_label_id/nested/deep.png");
        touch(temp.path(), "00000/pylon_camera_node/frame0.png");
        touch(temp.path(), "00001/other/frame0.png");
        touch(temp.path(), "loose.png");

        let policy = TraversalPolicy::FixedLayoutPerUnit {
            subdir: "pylon_camera_node_label_id".to_string(),
        };
        let entries = discover(temp.path(), &policy, &png()).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![PathBuf::from("00000/pylon_camera_node_label_id/frame0.png")]
        );
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = discover(
            &temp.path().join("nope"),
            &TraversalPolicy::RecursiveFiltered,
            &png(),
        )
        .unwrap_err();
        assert!(matches!(err, LabelError::InputRootMissing(_)));
    }

    #[test]
    fn test_file_as_root_is_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "file.png");
        let err = discover(
            &temp.path().join("file.png"),
            &TraversalPolicy::RecursiveFiltered,
            &png(),
        )
        .unwrap_err();
        assert!(matches!(err, LabelError::InputRootNotDirectory(_)));
    }

    #[test]
    fn test_empty_tree_yields_no_entries() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let entries = discover(temp.path(), &TraversalPolicy::RecursiveFiltered, &png()).unwrap();
        assert!(entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_discovered() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "store/real.png");
        touch(temp.path(), "in/plain.png");
        std::os::unix::fs::symlink(
            temp.path().join("store/real.png"),
            temp.path().join("in/linked.png"),
        )
        .unwrap();

        let root = temp.path().join("in");
        let entries = discover(&root, &TraversalPolicy::RecursiveFiltered, &png()).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![PathBuf::from("linked.png"), PathBuf::from("plain.png")]
        );
        assert_eq!(entries[0].path, root.join("linked.png"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_unit_directory_is_discovered() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "store/00003/labels/f.png");
        touch(temp.path(), "in/00001/labels/f.png");
        std::os::unix::fs::symlink(temp.path().join("store/00003"), temp.path().join("in/00003"))
            .unwrap();

        let policy = TraversalPolicy::FixedLayoutPerUnit {
            subdir: "labels".to_string(),
        };
        let entries = discover(&temp.path().join("in"), &policy, &png()).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec![
                PathBuf::from("00001/labels/f.png"),
                PathBuf::from("00003/labels/f.png")
            ]
        );
    }

    #[test]
    fn test_subdir_names_outside_root_are_rejected() {
        let temp = tempfile::tempdir().expect("create temp dir");
        touch(temp.path(), "in/a.png");
        touch(temp.path(), "other/b.png");
        let root = temp.path().join("in");

        let absolute = temp.path().join("other").to_string_lossy().into_owned();
        for name in [absolute.as_str(), "../other", ""] {
            let policy = TraversalPolicy::NamedSubdirectories(vec![name.to_string()]);
            let err = discover(&root, &policy, &png()).unwrap_err();
            assert!(matches!(err, LabelError::InvalidSubdirectory(_)), "{:?}", name);
        }

        let policy = TraversalPolicy::FixedLayoutPerUnit {
            subdir: "../labels".to_string(),
        };
        assert!(matches!(
            discover(&root, &policy, &png()).unwrap_err(),
            LabelError::InvalidSubdirectory(_)
        ));
    }

    #[test]
    fn test_policy_covers() {
        assert!(TraversalPolicy::RecursiveFiltered.covers(Path::new("out")));

        let named = TraversalPolicy::NamedSubdirectories(vec!["labels".to_string()]);
        assert!(named.covers(Path::new("labels/out")));
        assert!(!named.covers(Path::new("out")));
        assert!(!named.covers(Path::new("labels_out")));

        let per_unit = TraversalPolicy::FixedLayoutPerUnit {
            subdir: "labels".to_string(),
        };
        assert!(per_unit.covers(Path::new("00001/labels")));
        assert!(!per_unit.covers(Path::new("labels")));
        assert!(!per_unit.covers(Path::new("00001/images")));
    }
}

