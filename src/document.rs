//! The persisted JSON form of a [`Diagram`].
//!
//! Records are flat and reference each other by id. Loading checks every
//! reference before a `Diagram` is built, so a broken file never yields a
//! half-loaded diagram.

use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};

use crate::error::{Error, Result};
use crate::geometry::{self, Point};
use crate::ids::{BlobId, IdGenerator, MAX_ID, OutcomeId, SwimlaneId};
use crate::model::{
    BlobAnchors, DEFAULT_SWIMLANE_COLOR, DEFAULT_SWIMLANE_LENGTH, Diagram, Outcome, Rgba,
    ScopeBlob, Swimlane, blob_palette_color,
};

/// An id as found in a file: a number, or a string holding one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    fn resolve(&self) -> Option<u64> {
        match self {
            WireId::Number(n) => Some(*n),
            WireId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u64> for WireId {
    fn from(id: u64) -> Self {
        WireId::Number(id)
    }
}

fn default_length() -> f64 {
    DEFAULT_SWIMLANE_LENGTH
}

fn default_lane_color() -> Rgba {
    DEFAULT_SWIMLANE_COLOR
}

fn default_blob_color() -> Rgba {
    blob_palette_color(0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwimlaneRecord {
    pub id: WireId,
    pub angle: f64,
    #[serde(default = "default_length")]
    pub length: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_lane_color")]
    pub color: Rgba,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: WireId,
    pub swimlane_id: WireId,
    pub distance: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub color: Option<Rgba>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    pub id: WireId,
    pub points: Vec<Point>,
    #[serde(default = "default_blob_color")]
    pub color: Rgba,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub start_swimlane_id: Option<WireId>,
    #[serde(default)]
    pub end_swimlane_id: Option<WireId>,
    #[serde(default)]
    pub start_outcome_id: Option<WireId>,
    #[serde(default)]
    pub end_outcome_id: Option<WireId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub center: Point,
    #[serde(default)]
    pub swimlanes: Vec<SwimlaneRecord>,
    #[serde(default)]
    pub outcomes: Vec<OutcomeRecord>,
    #[serde(default)]
    pub blobs: Vec<BlobRecord>,
}

/// Tracks ids seen while loading so duplicates and dangling references
/// are caught before anything is built.
#[derive(Default)]
struct IdCheck {
    seen: HashSet<u64>,
    lanes: HashSet<u64>,
    outcomes: HashSet<u64>,
    max: u64,
}

impl IdCheck {
    fn claim(&mut self, what: &str, id: &WireId) -> Result<u64> {
        let raw = id
            .resolve()
            .ok_or_else(|| Error::integrity(format!("{what} has a non-numeric id {id:?}")))?;
        if raw > MAX_ID {
            return Err(Error::integrity(format!(
                "{what} id {raw} is above the largest allowed id {MAX_ID}"
            )));
        }
        if !self.seen.insert(raw) {
            return Err(Error::integrity(format!("duplicate id {raw} on {what}")));
        }
        self.max = self.max.max(raw);
        Ok(raw)
    }

    fn lane(&self, owner: &str, id: &WireId) -> Result<SwimlaneId> {
        match id.resolve() {
            Some(raw) if self.lanes.contains(&raw) => Ok(SwimlaneId(raw)),
            _ => Err(Error::integrity(format!(
                "{owner} references missing swimlane {id:?}"
            ))),
        }
    }

    fn outcome(&self, owner: &str, id: &WireId) -> Result<OutcomeId> {
        match id.resolve() {
            Some(raw) if self.outcomes.contains(&raw) => Ok(OutcomeId(raw)),
            _ => Err(Error::integrity(format!(
                "{owner} references missing outcome {id:?}"
            ))),
        }
    }
}

fn finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::integrity(format!("{what} is not a finite number")))
    }
}

fn non_negative(what: &str, value: f64) -> Result<f64> {
    let value = finite(what, value)?;
    if value < 0.0 {
        return Err(Error::integrity(format!("{what} is negative ({value})")));
    }
    Ok(value)
}

impl Diagram {
    pub fn to_document(&self) -> Document {
        let opt = |id: Option<u64>| id.map(WireId::from);
        Document {
            center: self.center,
            swimlanes: self
                .swimlanes()
                .map(|l| SwimlaneRecord {
                    id: l.id.0.into(),
                    angle: l.angle,
                    length: l.length,
                    label: l.label.clone(),
                    color: l.color,
                })
                .collect(),
            outcomes: self
                .outcomes()
                .map(|o| OutcomeRecord {
                    id: o.id.0.into(),
                    swimlane_id: o.swimlane_id.0.into(),
                    distance: o.distance,
                    label: o.label.clone(),
                    color: o.color,
                })
                .collect(),
            blobs: self
                .blobs()
                .iter()
                .map(|b| BlobRecord {
                    id: b.id.0.into(),
                    points: b.points.clone(),
                    color: b.color,
                    label: b.label.clone(),
                    start_swimlane_id: opt(b.anchors.start_swimlane.map(|l| l.0)),
                    end_swimlane_id: opt(b.anchors.end_swimlane.map(|l| l.0)),
                    start_outcome_id: opt(b.anchors.start_outcome.map(|o| o.0)),
                    end_outcome_id: opt(b.anchors.end_outcome.map(|o| o.0)),
                })
                .collect(),
        }
    }

    /// Builds a diagram from a document, rejecting dangling references and
    /// duplicate ids with [`Error::Integrity`].
    pub fn from_document(doc: &Document) -> Result<Diagram> {
        if !doc.center.is_finite() {
            return Err(Error::integrity("diagram center is not finite"));
        }
        let mut check = IdCheck::default();

        let mut swimlanes = IndexMap::with_capacity(doc.swimlanes.len());
        for rec in &doc.swimlanes {
            let raw = check.claim("swimlane", &rec.id)?;
            check.lanes.insert(raw);
            let id = SwimlaneId(raw);
            let lane = Swimlane {
                id,
                label: rec.label.clone(),
                angle: geometry::normalize_angle(finite("swimlane angle", rec.angle)?),
                length: non_negative("swimlane length", rec.length)?,
                color: rec.color,
            };
            swimlanes.insert(id, lane);
        }

        let mut outcomes = IndexMap::with_capacity(doc.outcomes.len());
        for rec in &doc.outcomes {
            let raw = check.claim("outcome", &rec.id)?;
            let owner = format!("outcome {raw}");
            let outcome = Outcome {
                id: OutcomeId(raw),
                swimlane_id: check.lane(&owner, &rec.swimlane_id)?,
                distance: non_negative("outcome distance", rec.distance)?,
                label: rec.label.clone(),
                color: rec.color,
            };
            check.outcomes.insert(raw);
            outcomes.insert(outcome.id, outcome);
        }

        let mut blobs = Vec::with_capacity(doc.blobs.len());
        for rec in &doc.blobs {
            let raw = check.claim("blob", &rec.id)?;
            let owner = format!("blob {raw}");
            if rec.points.len() < 3 {
                return Err(Error::integrity(format!(
                    "{owner} has {} outline points, needs at least 3",
                    rec.points.len()
                )));
            }
            if rec.points.iter().any(|p| !p.is_finite()) {
                return Err(Error::integrity(format!("{owner} has a non-finite point")));
            }
            let lane = |id: &Option<WireId>| id.as_ref().map(|id| check.lane(&owner, id)).transpose();
            let outcome =
                |id: &Option<WireId>| id.as_ref().map(|id| check.outcome(&owner, id)).transpose();
            blobs.push(ScopeBlob {
                id: BlobId(raw),
                points: rec.points.clone(),
                color: rec.color,
                label: rec.label.clone(),
                anchors: BlobAnchors {
                    start_swimlane: lane(&rec.start_swimlane_id)?,
                    end_swimlane: lane(&rec.end_swimlane_id)?,
                    start_outcome: outcome(&rec.start_outcome_id)?,
                    end_outcome: outcome(&rec.end_outcome_id)?,
                },
            });
        }

        let mut ids = IdGenerator::default();
        ids.seed_past(check.max);
        Ok(Diagram {
            center: doc.center,
            swimlanes,
            outcomes,
            blobs,
            ids,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str) -> Result<Diagram> {
        let doc: Document = serde_json::from_str(json)?;
        Diagram::from_document(&doc)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json)?;
        info!("Saved diagram to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Diagram> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let diagram = Diagram::from_json(&json)?;
        info!(
            swimlanes = diagram.swimlanes.len(),
            outcomes = diagram.outcomes.len(),
            blobs = diagram.blobs.len();
            "Loaded diagram from {}",
            path.display()
        );
        Ok(diagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Diagram {
        let mut d = Diagram::with_center(Point::new(12.5, -3.0));
        let east = d.add_swimlane(0.0, "east", None);
        let south = d
            .add_swimlane_with_length(90.0, "south", Some(Rgba::rgb(1, 2, 3)), 0.0)
            .unwrap();
        let a = d.add_outcome(east, 100.125, "a").unwrap();
        d.add_outcome(south, 0.0, "b").unwrap();
        d.set_outcome_color(a, Some(Rgba::rgb(9, 9, 9).with_alpha(10)))
            .unwrap();
        d.add_blob(
            vec![
                Point::new(50.0, -20.0),
                Point::new(150.0, -20.0),
                Point::new(150.0, 20.0),
                Point::new(50.0, 20.0),
            ],
            blob_palette_color(1),
            Some("scope".into()),
        )
        .unwrap();
        d
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let d = sample();
        let json = d.to_json().unwrap();
        let back = Diagram::from_json(&json).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn test_empty_diagram_round_trip() {
        let d = Diagram::new();
        let back = Diagram::from_json(&d.to_json().unwrap()).unwrap();
        assert_eq!(back, d);
        assert!(back.is_empty());
    }

    #[test]
    fn test_colors_written_canonically() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"#00BCD4FF\""));
        assert!(json.contains("\"#0909090A\""));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{
            "swimlanes": [{"id": 1, "angle": 45}],
            "outcomes": [{"id": 2, "swimlane_id": 1, "distance": 10}]
        }"#;
        let d = Diagram::from_json(json).unwrap();
        assert_eq!(d.center(), Point::ORIGIN);
        let lane = d.swimlane(SwimlaneId(1)).unwrap();
        assert_eq!(lane.length, DEFAULT_SWIMLANE_LENGTH);
        assert_eq!(lane.label, "");
        assert_eq!(lane.color, DEFAULT_SWIMLANE_COLOR);
        assert_eq!(d.outcome(OutcomeId(2)).unwrap().color, None);
    }

    #[test]
    fn test_string_ids_are_accepted() {
        let json = r#"{
            "swimlanes": [{"id": "7", "angle": 0}],
            "outcomes": [{"id": "8", "swimlane_id": "7", "distance": 1}]
        }"#;
        let d = Diagram::from_json(json).unwrap();
        assert_eq!(d.outcome(OutcomeId(8)).unwrap().swimlane_id, SwimlaneId(7));
    }

    #[test]
    fn test_dangling_outcome_reference_is_integrity_error() {
        let json = r##"{
            "swimlanes": [{"id": 1, "angle": 0}],
            "outcomes": [{"id": 2, "swimlane_id": 1, "distance": 10}],
            "blobs": [{
                "id": 3,
                "points": [{"x": 0, "y": 0}, {"x": 1, "y": 0}, {"x": 1, "y": 1}],
                "color": "#FF000032",
                "start_outcome_id": "missing"
            }]
        }"##;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_outcome_on_unknown_swimlane_is_integrity_error() {
        let json = r#"{"outcomes": [{"id": 2, "swimlane_id": 99, "distance": 10}]}"#;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_duplicate_ids_are_integrity_error() {
        let json = r#"{
            "swimlanes": [{"id": 1, "angle": 0}],
            "outcomes": [{"id": 1, "swimlane_id": 1, "distance": 10}]
        }"#;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_load_seeds_id_generator() {
        let json = r#"{"swimlanes": [{"id": 41, "angle": 0}]}"#;
        let mut d = Diagram::from_json(json).unwrap();
        let next = d.add_swimlane(10.0, "", None);
        assert_eq!(next, SwimlaneId(42));
    }

    #[test]
    fn test_id_above_max_is_integrity_error() {
        let json = r#"{"swimlanes": [{"id": 18446744073709551615, "angle": 0}]}"#;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
        let json = r#"{"swimlanes": [{"id": "9223372036854775808", "angle": 0}]}"#;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_largest_allowed_id_still_allocates() {
        let json = r#"{"swimlanes": [{"id": 9223372036854775807, "angle": 0}]}"#;
        let mut d = Diagram::from_json(json).unwrap();
        let lane = d.add_swimlane(10.0, "", None);
        assert_eq!(lane, SwimlaneId(MAX_ID + 1));
        let outcome = d.add_outcome(lane, 5.0, "").unwrap();
        assert_eq!(outcome, OutcomeId(MAX_ID + 2));
    }

    #[test]
    fn test_color_input_forms_normalize() {
        let json = r##"{"swimlanes": [
            {"id": 1, "angle": 0, "color": "#FF0000"},
            {"id": 2, "angle": 0, "color": [255, 0, 0]},
            {"id": 3, "angle": 0, "color": {"r": 255, "g": 0, "b": 0, "a": 255}}
        ]}"##;
        let d = Diagram::from_json(json).unwrap();
        let colors: Vec<Rgba> = d.swimlanes().map(|l| l.color).collect();
        assert!(colors.iter().all(|c| *c == Rgba::rgb(255, 0, 0)));
    }

    #[test]
    fn test_short_blob_outline_rejected() {
        let json = r#"{"blobs": [{"id": 1, "points": [{"x": 0, "y": 0}]}]}"#;
        assert!(matches!(Diagram::from_json(json), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        assert!(matches!(Diagram::from_json("{"), Err(Error::Json(_))));
    }
}
