use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classify::Category;

/// Word records keyed by lowercase word.
pub type WordRecords = HashMap<String, WordRecord>;

/// Legacy per-word projection points keyed by lowercase word.
pub type CoordinateTable = HashMap<String, ProjectedPair>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// A neighbor as stored upstream: `["word", similarity]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct Neighbor {
    pub word: String,
    pub similarity: f64,
}

impl Neighbor {
    pub fn new(word: impl Into<String>, similarity: f64) -> Self {
        Self {
            word: word.into(),
            similarity,
        }
    }
}

impl From<(String, f64)> for Neighbor {
    fn from((word, similarity): (String, f64)) -> Self {
        Self { word, similarity }
    }
}

impl From<Neighbor> for (String, f64) {
    fn from(value: Neighbor) -> Self {
        (value.word, value.similarity)
    }
}

/// Severity tag attached to a shift label; maps onto a badge color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftClass {
    Success,
    Warning,
    Danger,
    Info,
    Primary,
    Secondary,
    Light,
    Dark,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ShiftClass {
    pub fn badge_class(&self) -> &'static str {
        match self {
            ShiftClass::Success => "badge bg-success",
            ShiftClass::Warning => "badge bg-warning",
            ShiftClass::Danger => "badge bg-danger",
            ShiftClass::Info => "badge bg-info",
            ShiftClass::Primary => "badge bg-primary",
            ShiftClass::Secondary | ShiftClass::Unknown => "badge bg-secondary",
            ShiftClass::Light => "badge bg-light",
            ShiftClass::Dark => "badge bg-dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub cosine_similarity: f64,
    pub neighbor_overlap: f64,
    pub shift_type: String,
    #[serde(default)]
    pub shift_class: ShiftClass,
    #[serde(default)]
    pub canonical_neighbors: Vec<Neighbor>,
    #[serde(default)]
    pub naive_neighbors: Vec<Neighbor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_data: Option<VisualizationData>,
}

/// Precomputed scatter layout exported alongside a record. The three
/// sequences are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    pub words: Vec<String>,
    pub word_status: Vec<Category>,
    pub coords: Vec<[f64; 2]>,
}

impl VisualizationData {
    pub fn is_aligned(&self) -> bool {
        self.words.len() == self.word_status.len() && self.words.len() == self.coords.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub suggestions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPair {
    pub canonical: Point,
    pub naive: Point,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_upstream_shape() {
        let raw = r#"{
            "cosine_similarity": 0.5,
            "neighbor_overlap": 0.25,
            "shift_type": "Strong Shift",
            "shift_class": "danger",
            "canonical_neighbors": [["a", 0.9], ["b", 0.8]],
            "naive_neighbors": [["c", 0.7]],
            "visualization_data": {
                "words": ["w", "a", "c"],
                "word_status": ["target", "canonical", "mystery"],
                "coords": [[0.0, 0.0], [1.0, 2.0], [-1.5, 0.5]]
            }
        }"#;
        let record: WordRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.shift_class, ShiftClass::Danger);
        assert_eq!(record.canonical_neighbors[1], Neighbor::new("b", 0.8));
        let vis = record.visualization_data.unwrap();
        assert!(vis.is_aligned());
        assert_eq!(vis.word_status[2], Category::Naive);
        assert_eq!(Point::from(vis.coords[1]), Point::new(1.0, 2.0));
    }

    #[test]
    fn unknown_shift_class_uses_neutral_badge() {
        let raw = r#"{"cosine_similarity": 1.0, "neighbor_overlap": 1.0, "shift_type": "x", "shift_class": "purple"}"#;
        let record: WordRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.shift_class, ShiftClass::Unknown);
        assert_eq!(record.shift_class.badge_class(), "badge bg-secondary");
        assert!(record.canonical_neighbors.is_empty());
    }

    #[test]
    fn coordinate_table_parses_point_objects() {
        let raw = r#"{"стих": {"canonical": {"x": 1.0, "y": 2.0}, "naive": {"x": -3.0, "y": 4.5}}}"#;
        let table: CoordinateTable = serde_json::from_str(raw).unwrap();
        assert_eq!(table["стих"].naive, Point::new(-3.0, 4.5));
    }
}
