//! Anatomical region identifiers, organ profiles, and label lookup tables
//!
//! Regions are the unit the backend scores: MALPEM labels for the brain,
//! AHA 17-segment ids for the heart. Lookup tables translate numeric label
//! ids into human-readable names.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric identifier of an anatomical region within one organ's labelling
/// scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl RegionId {
    /// Parses a region id from a string key as found in mapping tables and
    /// backend responses. Leading/trailing whitespace is tolerated.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u32>().ok().map(RegionId)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organs with a packaged 3D model and a backend inference pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organ {
    Brain,
    Heart,
}

impl Organ {
    pub fn as_str(&self) -> &'static str {
        match self {
            Organ::Brain => "brain",
            Organ::Heart => "heart",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brain" => Some(Organ::Brain),
            "heart" => Some(Organ::Heart),
            _ => None,
        }
    }

    /// Title-cased name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Organ::Brain => "Brain",
            Organ::Heart => "Heart",
        }
    }
}

impl fmt::Display for Organ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-organ viewer configuration: where the model and mapping table live
/// and how score selection is tuned by default.
#[derive(Debug, Clone)]
pub struct OrganProfile {
    pub organ: Organ,
    pub model_path: &'static str,
    pub mapping_path: &'static str,
    /// Label lookup table shipped with the model, for organs whose region
    /// names are not fixed by a clinical convention.
    pub lut_path: Option<&'static str>,
    pub default_top_k: usize,
    pub default_threshold: f64,
}

impl OrganProfile {
    pub fn for_organ(organ: Organ) -> Self {
        match organ {
            Organ::Brain => OrganProfile {
                organ,
                model_path: "models/brain.glb",
                mapping_path: "models/brain_mapping.json",
                lut_path: Some("models/brain_labels.csv"),
                default_top_k: 10,
                default_threshold: 0.05,
            },
            Organ::Heart => OrganProfile {
                organ,
                model_path: "models/heart.glb",
                mapping_path: "models/heart_mapping.json",
                // AHA segment names are fixed, no table needed
                lut_path: None,
                default_top_k: 8,
                default_threshold: 0.25,
            },
        }
    }
}

/// Names of the AHA 17-segment model of the left ventricle, indexed by
/// segment id. Segment 17 (apical cap) is included for completeness even
/// though the backend scores only segments 1-16.
pub fn aha_segment_name(id: RegionId) -> Option<&'static str> {
    let name = match id.0 {
        1 => "Basal anterior",
        2 => "Basal anteroseptal",
        3 => "Basal inferoseptal",
        4 => "Basal inferior",
        5 => "Basal inferolateral",
        6 => "Basal anterolateral",
        7 => "Mid anterior",
        8 => "Mid anteroseptal",
        9 => "Mid inferoseptal",
        10 => "Mid inferior",
        11 => "Mid inferolateral",
        12 => "Mid anterolateral",
        13 => "Apical anterior",
        14 => "Apical septal",
        15 => "Apical inferior",
        16 => "Apical lateral",
        17 => "Apex",
        _ => return None,
    };
    Some(name)
}

#[derive(Error, Debug)]
pub enum LutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lookup table contained no label rows")]
    Empty,
}

/// Parses a label lookup table mapping numeric label ids to region names.
///
/// Two on-disk formats are accepted:
/// - header CSV with `label_id` and `label_name` columns
/// - raw MALPEM segment tables: `<id> <R> <G> <B> <A> <vis> <name...>`,
///   optionally preceded by an `irtksegmenttable`-style banner line
pub fn parse_lut(text: &str) -> Result<BTreeMap<u32, String>, LutError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let Some(first) = lines.next() else {
        return Err(LutError::Empty);
    };

    let mut table = BTreeMap::new();

    let header = first.to_ascii_lowercase();
    if header.contains("label_id") && header.contains("label_name") {
        let cols: Vec<&str> = first.split(',').map(str::trim).collect();
        let id_col = cols.iter().position(|c| c.eq_ignore_ascii_case("label_id"));
        let name_col = cols
            .iter()
            .position(|c| c.eq_ignore_ascii_case("label_name"));
        if let (Some(id_col), Some(name_col)) = (id_col, name_col) {
            for line in lines {
                let fields: Vec<&str> = line.split(',').map(str::trim).collect();
                let id = fields.get(id_col).and_then(|f| f.parse::<u32>().ok());
                let name = fields.get(name_col).map(|f| f.to_string());
                if let (Some(id), Some(name)) = (id, name) {
                    if !name.is_empty() {
                        table.insert(id, name);
                    }
                }
            }
        }
    } else {
        // Raw segment table; the banner line carries no labels, everything
        // else starts with a numeric id.
        for line in std::iter::once(first).chain(lines) {
            if line.to_ascii_lowercase().contains("segmenttable") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(id) = fields.next().and_then(|f| f.parse::<u32>().ok()) else {
                continue;
            };
            // Skip R G B A and visibility columns.
            let name: Vec<&str> = fields.skip(5).collect();
            if !name.is_empty() {
                table.insert(id, name.join(" "));
            }
        }
    }

    if table.is_empty() {
        return Err(LutError::Empty);
    }
    Ok(table)
}

/// Reads and parses a label lookup table from a file on disk.
pub fn load_lut(path: &std::path::Path) -> Result<BTreeMap<u32, String>, LutError> {
    let text = std::fs::read_to_string(path)?;
    parse_lut(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_id_parse() {
        assert_eq!(RegionId::parse("17"), Some(RegionId(17)));
        assert_eq!(RegionId::parse(" 3 "), Some(RegionId(3)));
        assert_eq!(RegionId::parse("lobe"), None);
        assert_eq!(RegionId::parse("-1"), None);
    }

    #[test]
    fn organ_round_trip() {
        assert_eq!(Organ::from_str_loose("Brain"), Some(Organ::Brain));
        assert_eq!(Organ::from_str_loose(" heart "), Some(Organ::Heart));
        assert_eq!(Organ::from_str_loose("liver"), None);
        assert_eq!(Organ::Brain.as_str(), "brain");
    }

    #[test]
    fn aha_names_cover_model() {
        assert_eq!(aha_segment_name(RegionId(1)), Some("Basal anterior"));
        assert_eq!(aha_segment_name(RegionId(16)), Some("Apical lateral"));
        assert_eq!(aha_segment_name(RegionId(17)), Some("Apex"));
        assert_eq!(aha_segment_name(RegionId(18)), None);
        assert_eq!(aha_segment_name(RegionId(0)), None);
    }

    #[test]
    fn lut_header_csv() {
        let text = "label_id,label_name,color\n1,Hippocampus L,#ff0000\n2,Hippocampus R,#00ff00\n";
        let table = parse_lut(text).unwrap();
        assert_eq!(table.get(&1).map(String::as_str), Some("Hippocampus L"));
        assert_eq!(table.get(&2).map(String::as_str), Some("Hippocampus R"));
    }

    #[test]
    fn lut_raw_segment_table() {
        let text = "# irtksegmenttable 2\n1 255 0 0 1 1 Hippocampus L\n2 0 255 0 1 1 Amygdala R\n";
        let table = parse_lut(text).unwrap();
        assert_eq!(table.get(&1).map(String::as_str), Some("Hippocampus L"));
        assert_eq!(table.get(&2).map(String::as_str), Some("Amygdala R"));
    }

    #[test]
    fn lut_empty_is_error() {
        assert!(matches!(parse_lut(""), Err(LutError::Empty)));
        assert!(matches!(parse_lut("# irtksegmenttable 0\n"), Err(LutError::Empty)));
    }

    #[test]
    fn lut_loads_from_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "label_id,label_name\n4,Amygdala L\n5,Amygdala R\n").unwrap();
        let table = load_lut(file.path()).unwrap();
        assert_eq!(table.get(&4).map(String::as_str), Some("Amygdala L"));
        assert_eq!(table.len(), 2);

        assert!(matches!(
            load_lut(std::path::Path::new("/nonexistent/labels.csv")),
            Err(LutError::Io(_))
        ));
    }
}
