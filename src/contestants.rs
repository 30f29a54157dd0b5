//! Contestant records supplied by the data provider
//!
//! The roster is read-only input: blocks hold a `ContestantId` and resolve it
//! through the roster at read time, never owning the record.

use serde::{Deserialize, Serialize};

/// Identifier of a contestant record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestantId(pub u32);

/// One externally owned contestant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    pub id: ContestantId,
    #[serde(default)]
    pub name: String,
    pub category: String,
    /// Completion in [0, 1]
    #[serde(default)]
    pub progress: f32,
    /// Palette slot for the block's top
    #[serde(default, rename = "colorIndex")]
    pub color_index: usize,
}

/// Arena of contestant records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestantRoster {
    records: Vec<Contestant>,
}

impl ContestantRoster {
    pub fn new(mut records: Vec<Contestant>) -> Self {
        for record in &mut records {
            record.progress = if record.progress.is_finite() {
                record.progress.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        Self { records }
    }

    /// Parse a JSON array of records
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<Contestant> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ContestantId) -> Option<&Contestant> {
        self.records.iter().find(|c| c.id == id)
    }

    /// Record at roster position (packing order)
    pub fn at(&self, index: usize) -> Option<&Contestant> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contestant> {
        self.records.iter()
    }

    /// Progress of a contestant (0 when the reference does not resolve)
    pub fn progress_of(&self, id: Option<ContestantId>) -> f32 {
        id.and_then(|id| self.get(id)).map(|c| c.progress).unwrap_or(0.0)
    }

    /// Category of a contestant, if the reference resolves
    pub fn category_of(&self, id: Option<ContestantId>) -> Option<&str> {
        id.and_then(|id| self.get(id)).map(|c| c.category.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"id": 7, "name": "Ada", "category": "prize", "progress": 0.5, "colorIndex": 2},
            {"id": 9, "category": "open"}
        ]"#;
        let roster = ContestantRoster::from_json(json).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(ContestantId(7)).map(|c| c.color_index), Some(2));
        assert_eq!(roster.category_of(Some(ContestantId(9))), Some("open"));
        assert_eq!(roster.progress_of(Some(ContestantId(9))), 0.0);
    }

    #[test]
    fn test_progress_clamped() {
        let roster = ContestantRoster::new(vec![Contestant {
            id: ContestantId(1),
            name: String::new(),
            category: "a".into(),
            progress: 4.0,
            color_index: 0,
        }]);
        assert_eq!(roster.progress_of(Some(ContestantId(1))), 1.0);
    }

    #[test]
    fn test_dangling_reference_resolves_to_nothing() {
        let roster = ContestantRoster::default();
        assert_eq!(roster.progress_of(Some(ContestantId(3))), 0.0);
        assert!(roster.category_of(Some(ContestantId(3))).is_none());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(ContestantRoster::from_json("{not json").is_err());
    }
}
