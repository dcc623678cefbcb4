//! The diagram aggregate and its entities.
//!
//! [`Diagram`] owns every swimlane, outcome and blob. Entities refer to one
//! another by id only, and all creation and removal goes through the
//! diagram's methods so references can never dangle.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::{EntityKind, Error, Result};
use crate::geometry::{self, Point};
use crate::ids::{BlobId, IdGenerator, OutcomeId, SwimlaneId};

pub const DEFAULT_SWIMLANE_LENGTH: f64 = 250.0;

/// Segment palette. Blobs cycle through it in creation order.
pub const SEGMENT_COLORS: [Rgba; 4] = [
    Rgba::rgb(0x00, 0xBC, 0xD4),
    Rgba::rgb(0x21, 0x96, 0xF3),
    Rgba::rgb(0xE9, 0x1E, 0x63),
    Rgba::rgb(0xF4, 0x43, 0x36),
];

pub const DEFAULT_SWIMLANE_COLOR: Rgba = SEGMENT_COLORS[0];

const BLOB_ALPHA: u8 = 80;

/// Fill color for the `index`-th blob of a diagram.
pub fn blob_palette_color(index: usize) -> Rgba {
    SEGMENT_COLORS[index % SEGMENT_COLORS.len()].with_alpha(BLOB_ALPHA)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Canonical `#RRGGBBAA` form.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Accepts `#RRGGBB` and `#RRGGBBAA`, with or without the `#`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }

    fn from_channels(channels: &[u8]) -> Option<Self> {
        match *channels {
            [r, g, b] => Some(Self::rgb(r, g, b)),
            [r, g, b, a] => Some(Self { r, g, b, a }),
            _ => None,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgba {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s).ok_or_else(|| Error::validation(format!("invalid color '{s}'")))
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Channels(Vec<u8>),
    Object {
        r: u8,
        g: u8,
        b: u8,
        #[serde(default = "opaque")]
        a: u8,
    },
}

fn opaque() -> u8 {
    255
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;
        match ColorRepr::deserialize(deserializer)? {
            ColorRepr::Hex(s) => {
                Rgba::from_hex(&s).ok_or_else(|| D::Error::custom(format!("invalid hex color '{s}'")))
            }
            ColorRepr::Channels(c) => Rgba::from_channels(&c).ok_or_else(|| {
                D::Error::custom(format!("color arrays need 3 or 4 channels, got {}", c.len()))
            }),
            ColorRepr::Object { r, g, b, a } => Ok(Rgba { r, g, b, a }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Swimlane {
    pub id: SwimlaneId,
    pub label: String,
    /// Degrees in `[0, 360)`.
    pub angle: f64,
    pub length: f64,
    pub color: Rgba,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub id: OutcomeId,
    pub swimlane_id: SwimlaneId,
    pub distance: f64,
    pub label: String,
    /// `None` draws the outcome in its swimlane's color.
    pub color: Option<Rgba>,
}

/// Cached association between a blob and the outcomes it contains.
///
/// Recomputed from geometry; never the source of truth for containment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlobAnchors {
    pub start_swimlane: Option<SwimlaneId>,
    pub end_swimlane: Option<SwimlaneId>,
    pub start_outcome: Option<OutcomeId>,
    pub end_outcome: Option<OutcomeId>,
}

impl BlobAnchors {
    pub fn is_empty(&self) -> bool {
        self.start_swimlane.is_none()
            && self.end_swimlane.is_none()
            && self.start_outcome.is_none()
            && self.end_outcome.is_none()
    }

    fn references(&self, lanes: &[SwimlaneId], outcomes: &[OutcomeId]) -> bool {
        let lane_hit = |l: Option<SwimlaneId>| l.is_some_and(|l| lanes.contains(&l));
        let outcome_hit = |o: Option<OutcomeId>| o.is_some_and(|o| outcomes.contains(&o));
        lane_hit(self.start_swimlane)
            || lane_hit(self.end_swimlane)
            || outcome_hit(self.start_outcome)
            || outcome_hit(self.end_outcome)
    }

    fn without(&self, lanes: &[SwimlaneId], outcomes: &[OutcomeId]) -> Self {
        let lane = |l: Option<SwimlaneId>| l.filter(|l| !lanes.contains(l));
        let outcome = |o: Option<OutcomeId>| o.filter(|o| !outcomes.contains(o));
        Self {
            start_swimlane: lane(self.start_swimlane),
            end_swimlane: lane(self.end_swimlane),
            start_outcome: outcome(self.start_outcome),
            end_outcome: outcome(self.end_outcome),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeBlob {
    pub id: BlobId,
    pub points: Vec<Point>,
    pub color: Rgba,
    pub label: Option<String>,
    pub anchors: BlobAnchors,
}

/// A reference to any entity, used for selection and hit-testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Swimlane(SwimlaneId),
    Outcome(OutcomeId),
    Blob(BlobId),
}

impl EntityRef {
    pub fn kind(self) -> EntityKind {
        match self {
            EntityRef::Swimlane(_) => EntityKind::Swimlane,
            EntityRef::Outcome(_) => EntityKind::Outcome,
            EntityRef::Blob(_) => EntityKind::Blob,
        }
    }

    pub fn raw(self) -> u64 {
        match self {
            EntityRef::Swimlane(id) => id.0,
            EntityRef::Outcome(id) => id.0,
            EntityRef::Blob(id) => id.0,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw())
    }
}

/// Where a draggable entity sits.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    Outcome { swimlane_id: SwimlaneId, distance: f64 },
    Swimlane { angle: f64, length: f64 },
    Blob { points: Vec<Point> },
}

/// Everything one removal took out of the diagram, with positions, so it
/// can be put back exactly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemovedSubgraph {
    /// `(index, entity)` in removal order.
    pub swimlanes: Vec<(usize, Swimlane)>,
    pub outcomes: Vec<(usize, Outcome)>,
    /// Removed blobs keep the anchors they had before the removal.
    pub blobs: Vec<(usize, ScopeBlob)>,
    /// Surviving blobs whose anchors were cleared, with the old anchors.
    pub detached: Vec<(BlobId, BlobAnchors)>,
}

impl RemovedSubgraph {
    pub fn is_empty(&self) -> bool {
        self.swimlanes.is_empty()
            && self.outcomes.is_empty()
            && self.blobs.is_empty()
            && self.detached.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.swimlanes.len() + self.outcomes.len() + self.blobs.len()
    }
}

fn validate_distance(what: &str, d: f64) -> Result<()> {
    if !d.is_finite() || d < 0.0 {
        return Err(Error::validation(format!(
            "{what} must be a non-negative number, got {d}"
        )));
    }
    Ok(())
}

fn validate_outline(points: &[Point]) -> Result<()> {
    if points.len() < 3 {
        return Err(Error::validation(format!(
            "a blob outline needs at least 3 points, got {}",
            points.len()
        )));
    }
    if let Some(p) = points.iter().find(|p| !p.is_finite()) {
        return Err(Error::validation(format!("non-finite blob point {p:?}")));
    }
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct Diagram {
    pub(crate) center: Point,
    pub(crate) swimlanes: IndexMap<SwimlaneId, Swimlane>,
    pub(crate) outcomes: IndexMap<OutcomeId, Outcome>,
    pub(crate) blobs: Vec<ScopeBlob>,
    pub(crate) ids: IdGenerator,
}

/// Equal when the observable content is equal, in order. The id counter is
/// not part of the content.
impl PartialEq for Diagram {
    fn eq(&self, other: &Self) -> bool {
        self.center == other.center
            && self.swimlanes.iter().eq(other.swimlanes.iter())
            && self.outcomes.iter().eq(other.outcomes.iter())
            && self.blobs == other.blobs
    }
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_center(center: Point) -> Self {
        Self {
            center,
            ..Self::default()
        }
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn swimlanes(&self) -> impl DoubleEndedIterator<Item = &Swimlane> {
        self.swimlanes.values()
    }

    pub fn outcomes(&self) -> impl DoubleEndedIterator<Item = &Outcome> {
        self.outcomes.values()
    }

    pub fn blobs(&self) -> &[ScopeBlob] {
        &self.blobs
    }

    pub fn swimlane(&self, id: SwimlaneId) -> Option<&Swimlane> {
        self.swimlanes.get(&id)
    }

    pub fn outcome(&self, id: OutcomeId) -> Option<&Outcome> {
        self.outcomes.get(&id)
    }

    pub fn blob(&self, id: BlobId) -> Option<&ScopeBlob> {
        self.blobs.iter().find(|b| b.id == id)
    }

    fn blob_index(&self, id: BlobId) -> Option<usize> {
        self.blobs.iter().position(|b| b.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.swimlanes.is_empty() && self.outcomes.is_empty() && self.blobs.is_empty()
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Swimlane(id) => self.swimlanes.contains_key(&id),
            EntityRef::Outcome(id) => self.outcomes.contains_key(&id),
            EntityRef::Blob(id) => self.blob_index(id).is_some(),
        }
    }

    /// Outcomes on a swimlane, in diagram order.
    pub fn outcomes_on(&self, swimlane_id: SwimlaneId) -> impl Iterator<Item = &Outcome> {
        self.outcomes
            .values()
            .filter(move |o| o.swimlane_id == swimlane_id)
    }

    pub fn outcome_position(&self, id: OutcomeId) -> Option<Point> {
        let outcome = self.outcomes.get(&id)?;
        let lane = self.swimlanes.get(&outcome.swimlane_id)?;
        Some(geometry::to_cartesian(self.center, lane.angle, outcome.distance))
    }

    pub fn swimlane_tip(&self, id: SwimlaneId) -> Option<Point> {
        let lane = self.swimlanes.get(&id)?;
        Some(geometry::to_cartesian(self.center, lane.angle, lane.length))
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        self.ids.next_id()
    }

    fn lane_mut(&mut self, id: SwimlaneId) -> Result<&mut Swimlane> {
        self.swimlanes
            .get_mut(&id)
            .ok_or_else(|| Error::reference(EntityKind::Swimlane, id.0))
    }

    fn outcome_mut(&mut self, id: OutcomeId) -> Result<&mut Outcome> {
        self.outcomes
            .get_mut(&id)
            .ok_or_else(|| Error::reference(EntityKind::Outcome, id.0))
    }

    fn blob_mut(&mut self, id: BlobId) -> Result<&mut ScopeBlob> {
        self.blobs
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::reference(EntityKind::Blob, id.0))
    }

    fn require_lane(&self, id: SwimlaneId) -> Result<()> {
        if self.swimlanes.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::reference(EntityKind::Swimlane, id.0))
        }
    }

    /// Never fails: the angle is folded into `[0, 360)`.
    pub fn add_swimlane(
        &mut self,
        angle: f64,
        label: impl Into<String>,
        color: Option<Rgba>,
    ) -> SwimlaneId {
        let lane = self.new_swimlane(angle, label.into(), color, DEFAULT_SWIMLANE_LENGTH);
        let id = lane.id;
        self.swimlanes.insert(id, lane);
        id
    }

    pub fn add_swimlane_with_length(
        &mut self,
        angle: f64,
        label: impl Into<String>,
        color: Option<Rgba>,
        length: f64,
    ) -> Result<SwimlaneId> {
        validate_distance("swimlane length", length)?;
        let lane = self.new_swimlane(angle, label.into(), color, length);
        let id = lane.id;
        self.swimlanes.insert(id, lane);
        Ok(id)
    }

    /// Builds a swimlane with a fresh id without inserting it.
    pub(crate) fn new_swimlane(
        &mut self,
        angle: f64,
        label: String,
        color: Option<Rgba>,
        length: f64,
    ) -> Swimlane {
        Swimlane {
            id: SwimlaneId(self.allocate_id()),
            label,
            angle: geometry::normalize_angle(angle),
            length,
            color: color.unwrap_or(DEFAULT_SWIMLANE_COLOR),
        }
    }

    /// Blobs whose outline now holds the new outcome are re-anchored.
    pub fn add_outcome(
        &mut self,
        swimlane_id: SwimlaneId,
        distance: f64,
        label: impl Into<String>,
    ) -> Result<OutcomeId> {
        let outcome = self.new_outcome(swimlane_id, distance, label.into())?;
        let id = outcome.id;
        self.outcomes.insert(id, outcome);
        self.recompute_all_associations();
        Ok(id)
    }

    pub(crate) fn new_outcome(
        &mut self,
        swimlane_id: SwimlaneId,
        distance: f64,
        label: String,
    ) -> Result<Outcome> {
        self.require_lane(swimlane_id)?;
        validate_distance("outcome distance", distance)?;
        Ok(Outcome {
            id: OutcomeId(self.allocate_id()),
            swimlane_id,
            distance,
            label,
            color: None,
        })
    }

    /// Commits a finished outline. Associations are computed immediately.
    pub fn add_blob(
        &mut self,
        points: Vec<Point>,
        color: Rgba,
        label: Option<String>,
    ) -> Result<BlobId> {
        let blob = self.new_blob(points, color, label)?;
        let id = blob.id;
        self.blobs.push(blob);
        Ok(id)
    }

    pub(crate) fn new_blob(
        &mut self,
        points: Vec<Point>,
        color: Rgba,
        label: Option<String>,
    ) -> Result<ScopeBlob> {
        validate_outline(&points)?;
        let anchors = self.associations_for(&points);
        Ok(ScopeBlob {
            id: BlobId(self.allocate_id()),
            points,
            color,
            label,
            anchors,
        })
    }

    /// Appends a fully-formed swimlane, outcome or blob. Used to replay
    /// creations; every reference must already be live.
    pub(crate) fn insert_swimlane(&mut self, lane: Swimlane) -> Result<()> {
        if self.swimlanes.contains_key(&lane.id) {
            return Err(Error::consistency(format!("swimlane {} already exists", lane.id)));
        }
        self.ids.seed_past(lane.id.0);
        self.swimlanes.insert(lane.id, lane);
        Ok(())
    }

    pub(crate) fn insert_outcome(&mut self, outcome: Outcome) -> Result<()> {
        if self.outcomes.contains_key(&outcome.id) {
            return Err(Error::consistency(format!("outcome {} already exists", outcome.id)));
        }
        self.require_lane(outcome.swimlane_id)?;
        self.ids.seed_past(outcome.id.0);
        self.outcomes.insert(outcome.id, outcome);
        Ok(())
    }

    pub(crate) fn insert_blob(&mut self, blob: ScopeBlob) -> Result<()> {
        if self.blob_index(blob.id).is_some() {
            return Err(Error::consistency(format!("blob {} already exists", blob.id)));
        }
        self.check_anchors(&blob.anchors)?;
        self.ids.seed_past(blob.id.0);
        self.blobs.push(blob);
        Ok(())
    }

    /// Removes an entity that nothing references. Undoes a creation.
    pub(crate) fn withdraw(&mut self, entity: EntityRef) -> Result<()> {
        if !self.contains(entity) {
            return Err(Error::reference(entity.kind(), entity.raw()));
        }
        if self.is_referenced(entity) {
            return Err(Error::consistency(format!(
                "{entity} is still referenced and cannot be withdrawn"
            )));
        }
        match entity {
            EntityRef::Swimlane(id) => {
                self.swimlanes.shift_remove(&id);
            }
            EntityRef::Outcome(id) => {
                self.outcomes.shift_remove(&id);
            }
            EntityRef::Blob(id) => {
                self.blobs.retain(|b| b.id != id);
            }
        }
        Ok(())
    }

    fn is_referenced(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Swimlane(id) => {
                self.outcomes.values().any(|o| o.swimlane_id == id)
                    || self.blobs.iter().any(|b| b.anchors.references(&[id], &[]))
            }
            EntityRef::Outcome(id) => self.blobs.iter().any(|b| b.anchors.references(&[], &[id])),
            EntityRef::Blob(_) => false,
        }
    }

    /// Removes the swimlane and every outcome on it. Blobs referencing any
    /// of them lose those references, and a blob left with no anchors is
    /// removed as well.
    pub fn remove_swimlane(&mut self, id: SwimlaneId) -> Result<RemovedSubgraph> {
        self.require_lane(id)?;
        let doomed: Vec<OutcomeId> = self.outcomes_on(id).map(|o| o.id).collect();
        let mut removed = RemovedSubgraph::default();
        for oid in &doomed {
            if let Some((index, _, outcome)) = self.outcomes.shift_remove_full(oid) {
                removed.outcomes.push((index, outcome));
            }
        }
        if let Some((index, _, lane)) = self.swimlanes.shift_remove_full(&id) {
            removed.swimlanes.push((index, lane));
        }
        self.detach_blobs(&[id], &doomed, &mut removed);
        debug!(
            swimlane = id.0,
            outcomes = removed.outcomes.len(),
            blobs = removed.blobs.len();
            "Removed swimlane"
        );
        Ok(removed)
    }

    pub fn remove_outcome(&mut self, id: OutcomeId) -> Result<RemovedSubgraph> {
        let Some((index, _, outcome)) = self.outcomes.shift_remove_full(&id) else {
            return Err(Error::reference(EntityKind::Outcome, id.0));
        };
        let mut removed = RemovedSubgraph::default();
        removed.outcomes.push((index, outcome));
        self.detach_blobs(&[], &[id], &mut removed);
        debug!(outcome = id.0, blobs = removed.blobs.len(); "Removed outcome");
        Ok(removed)
    }

    pub fn remove_blob(&mut self, id: BlobId) -> Result<RemovedSubgraph> {
        let index = self
            .blob_index(id)
            .ok_or_else(|| Error::reference(EntityKind::Blob, id.0))?;
        let blob = self.blobs.remove(index);
        Ok(RemovedSubgraph {
            blobs: vec![(index, blob)],
            ..RemovedSubgraph::default()
        })
    }

    pub fn remove(&mut self, entity: EntityRef) -> Result<RemovedSubgraph> {
        match entity {
            EntityRef::Swimlane(id) => self.remove_swimlane(id),
            EntityRef::Outcome(id) => self.remove_outcome(id),
            EntityRef::Blob(id) => self.remove_blob(id),
        }
    }

    fn detach_blobs(
        &mut self,
        lanes: &[SwimlaneId],
        outcomes: &[OutcomeId],
        removed: &mut RemovedSubgraph,
    ) {
        let mut i = 0;
        while i < self.blobs.len() {
            let before = self.blobs[i].anchors;
            if !before.references(lanes, outcomes) {
                i += 1;
                continue;
            }
            let after = before.without(lanes, outcomes);
            if after.is_empty() {
                let blob = self.blobs.remove(i);
                removed.blobs.push((i, blob));
                continue;
            }
            self.blobs[i].anchors = after;
            removed.detached.push((self.blobs[i].id, before));
            i += 1;
        }
    }

    /// Puts back exactly what a removal took out. Checks everything before
    /// touching the diagram.
    pub fn restore(&mut self, removed: &RemovedSubgraph) -> Result<()> {
        for (_, lane) in &removed.swimlanes {
            if self.swimlanes.contains_key(&lane.id) {
                return Err(Error::consistency(format!("swimlane {} is already present", lane.id)));
            }
        }
        for (_, outcome) in &removed.outcomes {
            if self.outcomes.contains_key(&outcome.id) {
                return Err(Error::consistency(format!(
                    "outcome {} is already present",
                    outcome.id
                )));
            }
            let lane_back = removed.swimlanes.iter().any(|(_, l)| l.id == outcome.swimlane_id);
            if !lane_back && !self.swimlanes.contains_key(&outcome.swimlane_id) {
                return Err(Error::consistency(format!(
                    "outcome {} needs swimlane {} which is gone",
                    outcome.id, outcome.swimlane_id
                )));
            }
        }
        for (_, blob) in &removed.blobs {
            if self.blob_index(blob.id).is_some() {
                return Err(Error::consistency(format!("blob {} is already present", blob.id)));
            }
        }
        for (blob_id, _) in &removed.detached {
            if self.blob_index(*blob_id).is_none() {
                return Err(Error::consistency(format!(
                    "cannot re-anchor missing blob {blob_id}"
                )));
            }
        }
        check_insert_positions("swimlane", self.swimlanes.len(), &removed.swimlanes)?;
        check_insert_positions("outcome", self.outcomes.len(), &removed.outcomes)?;
        check_insert_positions("blob", self.blobs.len(), &removed.blobs)?;

        for (index, lane) in removed.swimlanes.iter().rev() {
            self.swimlanes.shift_insert(*index, lane.id, lane.clone());
        }
        for (index, outcome) in removed.outcomes.iter().rev() {
            self.outcomes.shift_insert(*index, outcome.id, outcome.clone());
        }
        for (blob_id, anchors) in removed.detached.iter().rev() {
            if let Some(i) = self.blob_index(*blob_id) {
                self.blobs[i].anchors = *anchors;
            }
        }
        for (index, blob) in removed.blobs.iter().rev() {
            self.blobs.insert(*index, blob.clone());
        }
        Ok(())
    }

    /// Moves an outcome onto another swimlane and distance. Blob
    /// associations are left alone; see [`Diagram::recompute_all_associations`].
    pub fn reassign_outcome(
        &mut self,
        id: OutcomeId,
        new_swimlane_id: SwimlaneId,
        new_distance: f64,
    ) -> Result<()> {
        if !self.outcomes.contains_key(&id) {
            return Err(Error::reference(EntityKind::Outcome, id.0));
        }
        self.require_lane(new_swimlane_id)?;
        validate_distance("outcome distance", new_distance)?;
        let outcome = self.outcome_mut(id)?;
        outcome.swimlane_id = new_swimlane_id;
        outcome.distance = new_distance;
        Ok(())
    }

    pub fn set_center(&mut self, center: Point) -> Result<()> {
        if !center.is_finite() {
            return Err(Error::validation("diagram center must be finite"));
        }
        self.center = center;
        Ok(())
    }

    pub fn set_swimlane_label(&mut self, id: SwimlaneId, label: impl Into<String>) -> Result<()> {
        self.lane_mut(id)?.label = label.into();
        Ok(())
    }

    pub fn set_swimlane_angle(&mut self, id: SwimlaneId, angle: f64) -> Result<()> {
        if !angle.is_finite() {
            return Err(Error::validation("swimlane angle must be finite"));
        }
        self.lane_mut(id)?.angle = geometry::normalize_angle(angle);
        Ok(())
    }

    pub fn set_swimlane_length(&mut self, id: SwimlaneId, length: f64) -> Result<()> {
        self.require_lane(id)?;
        validate_distance("swimlane length", length)?;
        self.lane_mut(id)?.length = length;
        Ok(())
    }

    pub fn set_swimlane_color(&mut self, id: SwimlaneId, color: Rgba) -> Result<()> {
        self.lane_mut(id)?.color = color;
        Ok(())
    }

    pub fn set_outcome_label(&mut self, id: OutcomeId, label: impl Into<String>) -> Result<()> {
        self.outcome_mut(id)?.label = label.into();
        Ok(())
    }

    pub fn set_outcome_color(&mut self, id: OutcomeId, color: Option<Rgba>) -> Result<()> {
        self.outcome_mut(id)?.color = color;
        Ok(())
    }

    pub fn set_blob_label(&mut self, id: BlobId, label: Option<String>) -> Result<()> {
        self.blob_mut(id)?.label = label;
        Ok(())
    }

    pub fn set_blob_color(&mut self, id: BlobId, color: Rgba) -> Result<()> {
        self.blob_mut(id)?.color = color;
        Ok(())
    }

    /// Replaces a blob's outline. Associations are left alone.
    pub fn set_blob_points(&mut self, id: BlobId, points: Vec<Point>) -> Result<()> {
        if self.blob_index(id).is_none() {
            return Err(Error::reference(EntityKind::Blob, id.0));
        }
        validate_outline(&points)?;
        self.blob_mut(id)?.points = points;
        Ok(())
    }

    pub(crate) fn set_blob_anchors(&mut self, id: BlobId, anchors: BlobAnchors) -> Result<()> {
        if self.blob_index(id).is_none() {
            return Err(Error::reference(EntityKind::Blob, id.0));
        }
        self.check_anchors(&anchors)?;
        self.blob_mut(id)?.anchors = anchors;
        Ok(())
    }

    fn check_anchors(&self, anchors: &BlobAnchors) -> Result<()> {
        for lane in [anchors.start_swimlane, anchors.end_swimlane].into_iter().flatten() {
            self.require_lane(lane)?;
        }
        for outcome in [anchors.start_outcome, anchors.end_outcome].into_iter().flatten() {
            if !self.outcomes.contains_key(&outcome) {
                return Err(Error::reference(EntityKind::Outcome, outcome.0));
            }
        }
        Ok(())
    }

    pub fn placement(&self, entity: EntityRef) -> Option<Placement> {
        match entity {
            EntityRef::Outcome(id) => self.outcome(id).map(|o| Placement::Outcome {
                swimlane_id: o.swimlane_id,
                distance: o.distance,
            }),
            EntityRef::Swimlane(id) => self.swimlane(id).map(|l| Placement::Swimlane {
                angle: l.angle,
                length: l.length,
            }),
            EntityRef::Blob(id) => self.blob(id).map(|b| Placement::Blob {
                points: b.points.clone(),
            }),
        }
    }

    pub fn set_placement(&mut self, entity: EntityRef, placement: &Placement) -> Result<()> {
        match (entity, placement) {
            (
                EntityRef::Outcome(id),
                Placement::Outcome {
                    swimlane_id,
                    distance,
                },
            ) => self.reassign_outcome(id, *swimlane_id, *distance),
            (EntityRef::Swimlane(id), Placement::Swimlane { angle, length }) => {
                self.require_lane(id)?;
                if !angle.is_finite() {
                    return Err(Error::validation("swimlane angle must be finite"));
                }
                validate_distance("swimlane length", *length)?;
                let lane = self.lane_mut(id)?;
                lane.angle = geometry::normalize_angle(*angle);
                lane.length = *length;
                Ok(())
            }
            (EntityRef::Blob(id), Placement::Blob { points }) => {
                self.set_blob_points(id, points.clone())
            }
            (entity, placement) => {
                warn!("Placement {placement:?} does not fit {entity}");
                Err(Error::validation(format!("placement does not fit {entity}")))
            }
        }
    }

    /// Anchors an outline would get against the current outcomes.
    ///
    /// Outcomes are ordered by (swimlane angle, distance, id): "start" is
    /// the smallest contained outcome and "end" the largest.
    pub fn associations_for(&self, polygon: &[Point]) -> BlobAnchors {
        let inside: Vec<(f64, f64, OutcomeId, SwimlaneId)> = self
            .outcomes
            .values()
            .filter_map(|o| {
                let lane = self.swimlanes.get(&o.swimlane_id)?;
                let pos = geometry::to_cartesian(self.center, lane.angle, o.distance);
                geometry::point_in_polygon(pos, polygon)
                    .then_some((lane.angle, o.distance, o.id, lane.id))
            })
            .collect();
        let order = |a: &&(f64, f64, OutcomeId, SwimlaneId), b: &&(f64, f64, OutcomeId, SwimlaneId)| {
            a.0.total_cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.cmp(&b.2))
        };
        let start = inside.iter().min_by(order);
        let end = inside.iter().max_by(order);
        BlobAnchors {
            start_swimlane: start.map(|s| s.3),
            end_swimlane: end.map(|e| e.3),
            start_outcome: start.map(|s| s.2),
            end_outcome: end.map(|e| e.2),
        }
    }

    pub fn recompute_blob_associations(&mut self, blob_id: BlobId) -> Result<()> {
        let index = self
            .blob_index(blob_id)
            .ok_or_else(|| Error::reference(EntityKind::Blob, blob_id.0))?;
        self.blobs[index].anchors = self.associations_for(&self.blobs[index].points);
        Ok(())
    }

    /// Recomputes every blob and returns the previous anchors of the blobs
    /// that changed.
    pub fn recompute_all_associations(&mut self) -> Vec<(BlobId, BlobAnchors)> {
        let mut changed = Vec::new();
        for i in 0..self.blobs.len() {
            let fresh = self.associations_for(&self.blobs[i].points);
            if fresh != self.blobs[i].anchors {
                changed.push((self.blobs[i].id, self.blobs[i].anchors));
                self.blobs[i].anchors = fresh;
            }
        }
        changed
    }
}

fn check_insert_positions<T>(what: &str, current_len: usize, entries: &[(usize, T)]) -> Result<()> {
    for (k, (index, _)) in entries.iter().rev().enumerate() {
        if *index > current_len + k {
            return Err(Error::consistency(format!(
                "{what} position {index} is past the end of the collection"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_lane_diagram() -> (Diagram, SwimlaneId, SwimlaneId, OutcomeId, OutcomeId) {
        let mut d = Diagram::new();
        let east = d.add_swimlane_with_length(0.0, "east", None, 200.0).unwrap();
        let a = d.add_outcome(east, 100.0, "a").unwrap();
        let south = d.add_swimlane_with_length(90.0, "south", None, 200.0).unwrap();
        let b = d.add_outcome(south, 150.0, "b").unwrap();
        (d, east, south, a, b)
    }

    fn quadrant_outline() -> Vec<Point> {
        vec![
            Point::new(-10.0, -10.0),
            Point::new(220.0, -10.0),
            Point::new(220.0, 220.0),
            Point::new(-10.0, 220.0),
        ]
    }

    #[test]
    fn test_rgba_hex_forms() {
        assert_eq!(Rgba::from_hex("#00BCD4"), Some(Rgba::rgb(0, 0xBC, 0xD4)));
        assert_eq!(
            Rgba::from_hex("#00bcd450"),
            Some(Rgba::rgb(0, 0xBC, 0xD4).with_alpha(0x50))
        );
        assert_eq!(Rgba::from_hex("#12345"), None);
        assert_eq!(Rgba::from_hex("#GG0000"), None);
        assert_eq!(Rgba::rgb(1, 2, 3).to_hex(), "#010203FF");
    }

    #[test]
    fn test_rgba_accepts_every_input_form() {
        let expected = Rgba {
            r: 255,
            g: 0,
            b: 0,
            a: 50,
        };
        let forms = [
            r##""#FF000032""##,
            "[255, 0, 0, 50]",
            r#"{"r": 255, "g": 0, "b": 0, "a": 50}"#,
        ];
        for form in forms {
            let c: Rgba = serde_json::from_str(form).unwrap();
            assert_eq!(c, expected, "form {form}");
        }
        let opaque: Rgba = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(opaque, Rgba::rgb(1, 2, 3));
        assert!(serde_json::from_str::<Rgba>("[1, 2]").is_err());
        assert_eq!(serde_json::to_string(&expected).unwrap(), r##""#FF000032""##);
    }

    #[test]
    fn test_blob_palette_cycles() {
        assert_eq!(blob_palette_color(0), blob_palette_color(4));
        assert_ne!(blob_palette_color(0), blob_palette_color(1));
        assert_eq!(blob_palette_color(2).a, 80);
    }

    #[test]
    fn test_add_swimlane_normalizes_angle() {
        let mut d = Diagram::new();
        let id = d.add_swimlane(-90.0, "up", None);
        let lane = d.swimlane(id).unwrap();
        assert_eq!(lane.angle, 270.0);
        assert_eq!(lane.length, DEFAULT_SWIMLANE_LENGTH);
        assert_eq!(lane.color, DEFAULT_SWIMLANE_COLOR);
    }

    #[test]
    fn test_add_outcome_rejects_unknown_swimlane() {
        let mut d = Diagram::new();
        let err = d.add_outcome(SwimlaneId(99), 10.0, "x").unwrap_err();
        assert!(matches!(err, Error::Reference { kind: EntityKind::Swimlane, id: 99 }));
        assert!(d.is_empty());
    }

    #[test]
    fn test_add_outcome_rejects_negative_distance() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "", None);
        let before = d.clone();
        assert!(matches!(d.add_outcome(lane, -1.0, "x"), Err(Error::Validation(_))));
        assert!(matches!(d.add_outcome(lane, f64::NAN, "x"), Err(Error::Validation(_))));
        assert_eq!(d, before);
    }

    #[test]
    fn test_add_outcome_reanchors_blobs() {
        let mut d = Diagram::new();
        let east = d.add_swimlane_with_length(0.0, "east", None, 200.0).unwrap();
        let blob = d
            .add_blob(quadrant_outline(), blob_palette_color(0), None)
            .unwrap();
        assert!(d.blob(blob).unwrap().anchors.is_empty());

        let a = d.add_outcome(east, 100.0, "a").unwrap();
        let anchors = d.blob(blob).unwrap().anchors;
        assert_eq!(anchors.start_outcome, Some(a));
        assert_eq!(anchors.end_outcome, Some(a));
        assert_eq!(anchors.start_swimlane, Some(east));
        assert_eq!(anchors.end_swimlane, Some(east));
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let (d, east, south, a, b) = two_lane_diagram();
        let mut all = vec![east.0, south.0, a.0, b.0];
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 4);
        assert!(d.ids.peek() > *all.last().unwrap());
    }

    #[test]
    fn test_add_blob_needs_three_points() {
        let mut d = Diagram::new();
        let err = d
            .add_blob(vec![Point::ORIGIN, Point::new(1.0, 1.0)], Rgba::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(d.blobs().is_empty());
    }

    #[test]
    fn test_blob_associations_follow_angle_order() {
        let (mut d, east, south, a, b) = two_lane_diagram();
        let blob = d
            .add_blob(quadrant_outline(), blob_palette_color(0), None)
            .unwrap();
        let anchors = d.blob(blob).unwrap().anchors;
        assert_eq!(anchors.start_outcome, Some(a));
        assert_eq!(anchors.start_swimlane, Some(east));
        assert_eq!(anchors.end_outcome, Some(b));
        assert_eq!(anchors.end_swimlane, Some(south));

        // re-running changes nothing
        d.recompute_blob_associations(blob).unwrap();
        assert_eq!(d.blob(blob).unwrap().anchors, anchors);
    }

    #[test]
    fn test_blob_associations_tie_break_on_distance() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "", None);
        let far = d.add_outcome(lane, 120.0, "far").unwrap();
        let near = d.add_outcome(lane, 60.0, "near").unwrap();
        let blob = d
            .add_blob(quadrant_outline(), Rgba::default(), None)
            .unwrap();
        let anchors = d.blob(blob).unwrap().anchors;
        assert_eq!(anchors.start_outcome, Some(near));
        assert_eq!(anchors.end_outcome, Some(far));
    }

    #[test]
    fn test_blob_with_nothing_inside_has_no_anchors() {
        let (mut d, ..) = two_lane_diagram();
        let outline = vec![
            Point::new(-100.0, -100.0),
            Point::new(-50.0, -100.0),
            Point::new(-50.0, -50.0),
        ];
        let blob = d.add_blob(outline, Rgba::default(), None).unwrap();
        assert!(d.blob(blob).unwrap().anchors.is_empty());
    }

    #[test]
    fn test_remove_swimlane_cascades() {
        let (mut d, east, south, a, b) = two_lane_diagram();
        let a2 = d.add_outcome(east, 50.0, "a2").unwrap();
        // blob only around east-lane outcomes
        let only_east = d
            .add_blob(
                vec![
                    Point::new(20.0, -10.0),
                    Point::new(180.0, -10.0),
                    Point::new(180.0, 10.0),
                    Point::new(20.0, 10.0),
                ],
                Rgba::default(),
                None,
            )
            .unwrap();
        let spanning = d.add_blob(quadrant_outline(), Rgba::default(), None).unwrap();

        let removed = d.remove_swimlane(east).unwrap();
        assert_eq!(removed.swimlanes.len(), 1);
        let removed_outcomes: Vec<OutcomeId> = removed.outcomes.iter().map(|(_, o)| o.id).collect();
        assert_eq!(removed_outcomes, vec![a, a2]);
        assert_eq!(removed.blobs.len(), 1);
        assert_eq!(removed.blobs[0].1.id, only_east);
        assert_eq!(removed.detached.len(), 1);

        assert!(d.blob(only_east).is_none());
        let survivor = d.blob(spanning).unwrap();
        assert_eq!(survivor.anchors.start_outcome, None);
        assert_eq!(survivor.anchors.start_swimlane, None);
        assert_eq!(survivor.anchors.end_outcome, Some(b));
        assert_eq!(survivor.anchors.end_swimlane, Some(south));
        assert!(d.outcome(a).is_none());
    }

    #[test]
    fn test_remove_then_restore_is_exact() {
        let (mut d, east, ..) = two_lane_diagram();
        d.add_outcome(east, 30.0, "c").unwrap();
        d.add_blob(quadrant_outline(), Rgba::default(), Some("scope".into()))
            .unwrap();
        let before = d.clone();
        let removed = d.remove_swimlane(east).unwrap();
        assert_ne!(d, before);
        d.restore(&removed).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_remove_outcome_keeps_anchored_blob() {
        let (mut d, _, south, a, b) = two_lane_diagram();
        let blob = d.add_blob(quadrant_outline(), Rgba::default(), None).unwrap();
        let removed = d.remove_outcome(b).unwrap();
        assert!(removed.blobs.is_empty());
        let anchors = d.blob(blob).unwrap().anchors;
        assert_eq!(anchors.end_outcome, None);
        // the swimlane reference is untouched by an outcome removal
        assert_eq!(anchors.end_swimlane, Some(south));
        assert_eq!(anchors.start_outcome, Some(a));
    }

    #[test]
    fn test_remove_unknown_is_reference_error() {
        let mut d = Diagram::new();
        assert!(matches!(d.remove_swimlane(SwimlaneId(4)), Err(Error::Reference { .. })));
        assert!(matches!(d.remove_outcome(OutcomeId(4)), Err(Error::Reference { .. })));
        assert!(matches!(d.remove_blob(BlobId(4)), Err(Error::Reference { .. })));
    }

    #[test]
    fn test_restore_twice_is_consistency_error() {
        let (mut d, east, ..) = two_lane_diagram();
        let removed = d.remove_swimlane(east).unwrap();
        d.restore(&removed).unwrap();
        let snapshot = d.clone();
        assert!(matches!(d.restore(&removed), Err(Error::Consistency(_))));
        assert_eq!(d, snapshot);
    }

    #[test]
    fn test_reassign_outcome() {
        let (mut d, _, south, a, _) = two_lane_diagram();
        d.reassign_outcome(a, south, 40.0).unwrap();
        let o = d.outcome(a).unwrap();
        assert_eq!(o.swimlane_id, south);
        assert_eq!(o.distance, 40.0);
        assert!(matches!(
            d.reassign_outcome(a, SwimlaneId(777), 1.0),
            Err(Error::Reference { .. })
        ));
        assert_eq!(d.outcome(a).unwrap().swimlane_id, south);
    }

    #[test]
    fn test_withdraw_refuses_referenced_entity() {
        let (mut d, east, ..) = two_lane_diagram();
        assert!(matches!(
            d.withdraw(EntityRef::Swimlane(east)),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn test_set_placement_kind_mismatch() {
        let (mut d, east, ..) = two_lane_diagram();
        let wrong = Placement::Blob { points: vec![] };
        assert!(matches!(
            d.set_placement(EntityRef::Swimlane(east), &wrong),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_outcome_position_uses_swimlane_angle() {
        let (d, _, _, _, b) = two_lane_diagram();
        let p = d.outcome_position(b).unwrap();
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 150.0).abs() < 1e-9);
    }
}
