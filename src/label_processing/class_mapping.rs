use indexmap::IndexMap;
use std::fs;
use std::path::Path;

use crate::error::LabelError;

/// How to treat an original class ID listed under more than one new class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Refuse the mapping with a configuration error
    #[default]
    Reject,
    /// The entry declared later takes the ID
    LastWins,
}

/// Consolidation table from original class IDs to new class IDs
///
/// Built from an ordered list of `(new_class, [old_ids])` entries. The new ID
/// of an entry is its zero-based position in that list, so declaration order
/// matters. Old IDs that are not listed have no entry and end up as
/// background (0) when the table is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    table: [Option<u8>; 256],
    names: Vec<String>,
}

impl ClassMapping {
    /// Load a YAML mapping file (`new_class: [old_ids]` per key)
    pub fn from_yaml_file(path: &Path, policy: DuplicatePolicy) -> Result<Self, LabelError> {
        let contents = fs::read_to_string(path).map_err(|source| LabelError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_yaml(&contents, path, policy)
    }

    /// Parse YAML mapping text
    pub fn from_yaml_str(contents: &str, policy: DuplicatePolicy) -> Result<Self, LabelError> {
        Self::parse_yaml(contents, Path::new("<inline>"), policy)
    }

    fn parse_yaml(contents: &str, origin: &Path, policy: DuplicatePolicy) -> Result<Self, LabelError> {
        if contents.trim().is_empty() {
            return Err(LabelError::EmptyMapping);
        }

        // IndexMap keeps the document's key order
        let entries: IndexMap<String, Vec<i64>> =
            serde_yaml::from_str(contents).map_err(|source| LabelError::MappingParse {
                path: origin.to_path_buf(),
                source,
            })?;

        Self::build(entries, policy)
    }

    /// Build the table from ordered entries
    pub fn build<I>(entries: I, policy: DuplicatePolicy) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (String, Vec<i64>)>,
    {
        let entries: Vec<(String, Vec<i64>)> = entries.into_iter().collect();
        if entries.len() > 256 {
            return Err(LabelError::TooManyClasses {
                count: entries.len(),
            });
        }

        let mut table: [Option<u8>; 256] = [None; 256];
        let mut names: Vec<String> = Vec::with_capacity(entries.len());

        for (new_id, (name, old_ids)) in entries.into_iter().enumerate() {
            let new_id = new_id as u8;

            for old_id in old_ids {
                let old = u8::try_from(old_id).map_err(|_| LabelError::ClassIdOutOfRange {
                    class: name.clone(),
                    id: old_id,
                })?;

                let slot = &mut table[old as usize];
                match (*slot, policy) {
                    (Some(previous), DuplicatePolicy::Reject) if previous != new_id => {
                        return Err(LabelError::DuplicateClassId {
                            old_id: old,
                            first: names[previous as usize].clone(),
                            second: name,
                        });
                    }
                    _ => *slot = Some(new_id),
                }
            }

            names.push(name);
        }

        if names.is_empty() {
            return Err(LabelError::EmptyMapping);
        }

        Ok(Self { table, names })
    }

    pub fn get(&self, old_id: u8) -> Option<u8> {
        self.table[old_id as usize]
    }

    /// Number of mapped original IDs
    pub fn len(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New class names, indexed by new class ID
    pub fn class_names(&self) -> &[String] {
        &self.names
    }

    /// `(old_id, new_id)` pairs ordered by old ID
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.table
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|new| (old as u8, new)))
    }

    /// Dense lookup table where unmapped IDs resolve to background
    pub fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (old, new) in self.iter() {
            lut[old as usize] = new;
        }
        lut
    }
}
