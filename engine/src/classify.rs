//! Path classification.
//!
//! Resolves a top-level source entry name to a target-relative location
//! using a case-insensitive mapping table, an ignore set, and a fallback
//! bucket for everything unmatched. Classification misses are not errors:
//! unexpected content stays visible under the fallback bucket instead of
//! being dropped.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One mapping rule: a case-insensitive source entry name and its
/// target-relative destination.
///
/// `legacy_targets` lists historical target locations that earlier
/// migrations merged content into; only the verifier consults them, in
/// declaration order, before declaring a file missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    pub key: String,
    pub target: PathBuf,
    #[serde(default)]
    pub legacy_targets: Vec<PathBuf>,
}

/// The outcome of classifying one top-level entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Matched a mapping rule; carries the rule's target-relative path
    Mapped(PathBuf),
    /// No rule matched; routed to `<fallback>/<original name>`
    Fallback(PathBuf),
    /// Member of the ignore set; no job is created
    Ignored,
}

/// On-disk shape of the mapping file (JSON).
#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default = "default_fallback")]
    fallback: PathBuf,
    #[serde(default)]
    ignore: Vec<String>,
    rules: Vec<MappingRule>,
}

fn default_fallback() -> PathBuf {
    PathBuf::from("_Unsorted")
}

/// Ordered mapping table with case-insensitive lookup.
///
/// Keys are normalized to lowercase once at load time; the original rule
/// order is preserved separately so fallback naming and verifier candidate
/// order stay deterministic.
#[derive(Debug, Clone)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
    index: HashMap<String, usize>,
    ignore: HashSet<String>,
    fallback: PathBuf,
}

impl MappingTable {
    /// Build a table from rules, an ignore set, and a fallback bucket prefix.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidMapping` on duplicate keys (after case
    /// normalization). An empty rule list is accepted here; rejecting it is
    /// the job of [`crate::config::MigrationConfig::validate`], so tests can
    /// build partial tables.
    pub fn new(
        rules: Vec<MappingRule>,
        ignore: Vec<String>,
        fallback: PathBuf,
    ) -> Result<Self, EngineError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            if rule.key.trim().is_empty() {
                return Err(EngineError::InvalidMapping {
                    reason: format!("rule {} has an empty key", i),
                });
            }
            if index.insert(rule.key.to_lowercase(), i).is_some() {
                return Err(EngineError::InvalidMapping {
                    reason: format!("duplicate key '{}' (case-insensitive)", rule.key),
                });
            }
        }
        let ignore = ignore.into_iter().map(|s| s.to_lowercase()).collect();
        Ok(MappingTable {
            rules,
            index,
            ignore,
            fallback,
        })
    }

    /// Load a mapping table from a JSON file.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidMapping` if the file cannot be read or
    /// parsed, or if it contains duplicate keys.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::InvalidMapping {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let file: MappingFile =
            serde_json::from_str(&text).map_err(|e| EngineError::InvalidMapping {
                reason: format!("cannot parse {}: {}", path.display(), e),
            })?;
        Self::new(file.rules, file.ignore, file.fallback)
    }

    /// Classify one top-level entry name.
    ///
    /// Ignore-set membership is checked first, then an exact case-insensitive
    /// rule match, then the fallback bucket preserving the entry's original
    /// casing.
    pub fn classify(&self, name: &str) -> Classification {
        let lowered = name.to_lowercase();
        if self.ignore.contains(&lowered) {
            return Classification::Ignored;
        }
        match self.index.get(&lowered) {
            Some(&i) => Classification::Mapped(self.rules[i].target.clone()),
            None => Classification::Fallback(self.fallback.join(name)),
        }
    }

    /// Target-relative candidate locations for a name, in priority order.
    ///
    /// For a mapped entry this is the rule's primary target followed by its
    /// legacy targets; for an unmatched entry it is the single fallback
    /// location; for an ignored entry it is empty.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let lowered = name.to_lowercase();
        if self.ignore.contains(&lowered) {
            return Vec::new();
        }
        match self.index.get(&lowered) {
            Some(&i) => {
                let rule = &self.rules[i];
                std::iter::once(rule.target.clone())
                    .chain(rule.legacy_targets.iter().cloned())
                    .collect()
            }
            None => vec![self.fallback.join(name)],
        }
    }

    /// Target-relative candidate paths for a top-level *file* entry.
    ///
    /// A mapped file lands inside the rule's target directory, so the entry
    /// name is appended to every mapped candidate; the fallback location
    /// already carries the name.
    pub fn file_candidates(&self, name: &str) -> Vec<PathBuf> {
        let lowered = name.to_lowercase();
        if self.ignore.contains(&lowered) {
            return Vec::new();
        }
        match self.index.get(&lowered) {
            Some(&i) => {
                let rule = &self.rules[i];
                std::iter::once(rule.target.join(name))
                    .chain(rule.legacy_targets.iter().map(|t| t.join(name)))
                    .collect()
            }
            None => vec![self.fallback.join(name)],
        }
    }

    /// Number of mapping rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the table holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The fallback bucket prefix.
    pub fn fallback_prefix(&self) -> &Path {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        MappingTable::new(
            vec![
                MappingRule {
                    key: "Photos".to_string(),
                    target: PathBuf::from("Media/Photos"),
                    legacy_targets: vec![PathBuf::from("Old/Pictures")],
                },
                MappingRule {
                    key: "Documents".to_string(),
                    target: PathBuf::from("Docs"),
                    legacy_targets: vec![],
                },
            ],
            vec!["$RECYCLE.BIN".to_string(), "System Volume Information".to_string()],
            PathBuf::from("_Unsorted"),
        )
        .expect("Failed to build mapping table")
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let t = table();
        assert_eq!(
            t.classify("photos"),
            Classification::Mapped(PathBuf::from("Media/Photos"))
        );
        assert_eq!(
            t.classify("PHOTOS"),
            Classification::Mapped(PathBuf::from("Media/Photos"))
        );
    }

    #[test]
    fn test_unmatched_routes_to_fallback_preserving_name() {
        let t = table();
        assert_eq!(
            t.classify("Foo"),
            Classification::Fallback(PathBuf::from("_Unsorted/Foo"))
        );
    }

    #[test]
    fn test_ignore_set_wins() {
        let t = table();
        assert_eq!(t.classify("$recycle.bin"), Classification::Ignored);
        assert_eq!(t.classify("System Volume Information"), Classification::Ignored);
    }

    #[test]
    fn test_candidates_priority_order() {
        let t = table();
        assert_eq!(
            t.candidates("Photos"),
            vec![PathBuf::from("Media/Photos"), PathBuf::from("Old/Pictures")]
        );
        assert_eq!(t.candidates("Foo"), vec![PathBuf::from("_Unsorted/Foo")]);
        assert!(t.candidates("$RECYCLE.BIN").is_empty());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = MappingTable::new(
            vec![
                MappingRule {
                    key: "Photos".to_string(),
                    target: PathBuf::from("a"),
                    legacy_targets: vec![],
                },
                MappingRule {
                    key: "photos".to_string(),
                    target: PathBuf::from("b"),
                    legacy_targets: vec![],
                },
            ],
            vec![],
            PathBuf::from("_Unsorted"),
        );
        assert!(matches!(result, Err(EngineError::InvalidMapping { .. })));
    }

    #[test]
    fn test_load_from_json() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("mapping.json");
        std::fs::write(
            &path,
            r#"{
                "fallback": "_Unsorted",
                "ignore": ["$RECYCLE.BIN"],
                "rules": [
                    {"key": "Music", "target": "Media/Music"},
                    {"key": "Books", "target": "Library", "legacy_targets": ["Old/Books"]}
                ]
            }"#,
        )
        .expect("Failed to write mapping file");

        let t = MappingTable::load(&path).expect("Failed to load mapping");
        assert_eq!(t.len(), 2);
        assert_eq!(
            t.classify("music"),
            Classification::Mapped(PathBuf::from("Media/Music"))
        );
        assert_eq!(
            t.candidates("Books"),
            vec![PathBuf::from("Library"), PathBuf::from("Old/Books")]
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("mapping.json");
        std::fs::write(&path, "not json").expect("Failed to write mapping file");

        assert!(matches!(
            MappingTable::load(&path),
            Err(EngineError::InvalidMapping { .. })
        ));
    }
}
