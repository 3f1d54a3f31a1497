//! Mapping tables from region ids to scene node targets
//!
//! A mapping table is authored alongside each organ model and ships as
//! JSON. Two shapes are accepted: a flat record per region, or a wrapper
//! object with a `segments` key mapping segment ids to plain target names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::region::RegionId;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Failed to parse mapping table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Mapping table has an unrecognized shape")]
    UnrecognizedShape,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Laterality qualifier for paired structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "l", alias = "L", alias = "Left")]
    Left,
    #[serde(alias = "r", alias = "R", alias = "Right")]
    Right,
}

impl Side {
    fn letter(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }

    fn word(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

/// One scene node target of a region, with an optional side qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Plain(String),
    Qualified {
        target: String,
        #[serde(default)]
        side: Option<Side>,
    },
}

impl TargetSpec {
    pub fn plain(target: impl Into<String>) -> Self {
        TargetSpec::Plain(target.into())
    }

    pub fn qualified(target: impl Into<String>, side: Side) -> Self {
        TargetSpec::Qualified {
            target: target.into(),
            side: Some(side),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            TargetSpec::Plain(target) => target,
            TargetSpec::Qualified { target, .. } => target,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            TargetSpec::Plain(_) => None,
            TargetSpec::Qualified { side, .. } => *side,
        }
    }

    /// Name shown in diagnostics: the target with its side spelled out, so
    /// unresolved left and right variants stay distinguishable.
    pub fn display_name(&self) -> String {
        match self.side() {
            None => self.target().to_string(),
            Some(side) => format!("{} {}", side.word(), self.target()),
        }
    }

    /// Node name candidates in resolution order. Unqualified targets have a
    /// single candidate; sided targets try the raw name first and then the
    /// conventional sided spellings.
    pub fn candidates(&self) -> Vec<String> {
        let target = self.target();
        match self.side() {
            None => vec![target.to_string()],
            Some(side) => vec![
                target.to_string(),
                format!("{} {}", target, side.letter()),
                format!("{}.{}", target, side.letter()),
                format!("{}_{}", target, side.letter()),
                format!("{} {}", side.word(), target),
            ],
        }
    }
}

/// Region-to-target mapping for one organ model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    entries: BTreeMap<RegionId, Vec<TargetSpec>>,
}

/// The two accepted document shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDoc {
    Segments {
        segments: BTreeMap<String, SegmentTargets>,
    },
    Records(BTreeMap<String, RecordTargets>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentTargets {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordTargets {
    One(TargetSpec),
    Many(Vec<TargetSpec>),
}

impl MappingTable {
    /// Parses a mapping table from JSON text. Keys that are not numeric
    /// region ids are skipped with a warning rather than failing the load.
    pub fn from_json(text: &str) -> Result<Self, MappingError> {
        let doc: MappingDoc = serde_json::from_str(text)?;
        let mut entries = BTreeMap::new();
        match doc {
            MappingDoc::Segments { segments } => {
                for (key, targets) in segments {
                    let Some(id) = RegionId::parse(&key) else {
                        tracing::warn!("Skipping non-numeric mapping key {key:?}");
                        continue;
                    };
                    let targets = match targets {
                        SegmentTargets::One(t) => vec![TargetSpec::Plain(t)],
                        SegmentTargets::Many(ts) => {
                            ts.into_iter().map(TargetSpec::Plain).collect()
                        }
                    };
                    entries.insert(id, targets);
                }
            }
            MappingDoc::Records(records) => {
                for (key, targets) in records {
                    let Some(id) = RegionId::parse(&key) else {
                        tracing::warn!("Skipping non-numeric mapping key {key:?}");
                        continue;
                    };
                    let targets = match targets {
                        RecordTargets::One(t) => vec![t],
                        RecordTargets::Many(ts) => ts,
                    };
                    entries.insert(id, targets);
                }
            }
        }
        if entries.is_empty() {
            return Err(MappingError::UnrecognizedShape);
        }
        Ok(MappingTable { entries })
    }

    /// Reads and parses a mapping table from a file on disk.
    pub fn load(path: &std::path::Path) -> Result<Self, MappingError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn get(&self, id: RegionId) -> Option<&[TargetSpec]> {
        self.entries.get(&id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &[TargetSpec])> {
        self.entries.iter().map(|(id, targets)| (*id, targets.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_shape_parses() {
        let text = r#"{
            "4": {"target": "Lateral Ventricle", "side": "left"},
            "5": "Third Ventricle",
            "6": [{"target": "Cerebellum", "side": "right"}, "Brain Stem"]
        }"#;
        let table = MappingTable::from_json(text).unwrap();
        assert_eq!(table.len(), 3);
        let four = table.get(RegionId(4)).unwrap();
        assert_eq!(four[0].target(), "Lateral Ventricle");
        assert_eq!(four[0].side(), Some(Side::Left));
        let five = table.get(RegionId(5)).unwrap();
        assert_eq!(five[0].target(), "Third Ventricle");
        assert_eq!(five[0].side(), None);
        assert_eq!(table.get(RegionId(6)).unwrap().len(), 2);
    }

    #[test]
    fn segments_shape_parses() {
        let text = r#"{
            "segments": {
                "1": ["Basal Anterior"],
                "2": "Basal Anteroseptal"
            }
        }"#;
        let table = MappingTable::from_json(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(RegionId(1)).unwrap()[0].target(), "Basal Anterior");
        assert_eq!(
            table.get(RegionId(2)).unwrap()[0].target(),
            "Basal Anteroseptal"
        );
    }

    #[test]
    fn side_letter_aliases() {
        let text = r#"{"1": {"target": "Atrium", "side": "L"}}"#;
        let table = MappingTable::from_json(text).unwrap();
        assert_eq!(table.get(RegionId(1)).unwrap()[0].side(), Some(Side::Left));
    }

    #[test]
    fn non_numeric_keys_skipped() {
        let text = r#"{"1": "Aorta", "meta": "ignored"}"#;
        let table = MappingTable::from_json(text).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(RegionId(1)).is_some());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            MappingTable::from_json("not json"),
            Err(MappingError::Parse(_))
        ));
    }

    #[test]
    fn empty_document_is_unrecognized() {
        assert!(matches!(
            MappingTable::from_json("{}"),
            Err(MappingError::UnrecognizedShape)
        ));
    }

    #[test]
    fn candidate_order_for_sided_target() {
        let spec = TargetSpec::qualified("Hippocampus", Side::Left);
        assert_eq!(
            spec.candidates(),
            vec![
                "Hippocampus".to_string(),
                "Hippocampus L".to_string(),
                "Hippocampus.L".to_string(),
                "Hippocampus_L".to_string(),
                "Left Hippocampus".to_string(),
            ]
        );
    }

    #[test]
    fn plain_target_has_single_candidate() {
        let spec = TargetSpec::plain("Aorta");
        assert_eq!(spec.candidates(), vec!["Aorta".to_string()]);
    }

    #[test]
    fn display_name_spells_out_the_side() {
        assert_eq!(TargetSpec::plain("Aorta").display_name(), "Aorta");
        assert_eq!(
            TargetSpec::qualified("Hippocampus", Side::Right).display_name(),
            "Right Hippocampus"
        );
    }

    #[test]
    fn load_reads_a_table_from_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"1": "Aorta", "2": {{"target": "Atrium", "side": "left"}}}}"#).unwrap();
        let table = MappingTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(RegionId(2)).unwrap()[0].side(), Some(Side::Left));

        assert!(matches!(
            MappingTable::load(std::path::Path::new("/nonexistent/mapping.json")),
            Err(MappingError::Io(_))
        ));
    }
}
