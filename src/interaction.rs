//! Pointer and keyboard handling.
//!
//! The shell forwards raw input here in diagram coordinates. Gestures are
//! resolved with geometry queries and turned into commands on the session's
//! history. Nothing in [`Mode`] is undoable.

use log::{debug, warn};
use std::mem;

use crate::command::{Command, Entity};
use crate::config::BlobShape;
use crate::error::{Error, Result};
use crate::geometry::{self, Point, Rect};
use crate::ids::{BlobId, SwimlaneId};
use crate::model::{EntityRef, Placement, blob_palette_color};
use crate::session::Session;

const SECTOR_INNER_RADIUS: f64 = 30.0;
const SECTOR_DEFAULT_RADIUS: f64 = 200.0;
const SECTOR_STEPS: usize = 30;
const SECTOR_ANGLE_PAD: f64 = 3.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Delete,
    Backspace,
    Undo,
    Redo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    /// Outcome sliding along and between swimlanes.
    Snap,
    Rotate,
    /// Swimlane grabbed at its tip.
    Resize,
    Translate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Drag {
    pub target: EntityRef,
    pub kind: DragKind,
    pub from: Placement,
    pub grab: Point,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Draft {
    pub points: Vec<Point>,
    pub pressed: bool,
    /// Sector mode: the swimlane picked on press and the press point.
    pub start: Option<(SwimlaneId, Point)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Mode {
    #[default]
    Idle,
    Dragging(Drag),
    Drawing(Draft),
    PendingLabel(Draft),
    RubberBand {
        start: Point,
        current: Point,
        additive: bool,
    },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Dragging(_) => "dragging",
            Mode::Drawing(_) => "drawing",
            Mode::PendingLabel(_) => "pending-label",
            Mode::RubberBand { .. } => "rubber-band",
        }
    }
}

impl Session {
    fn enter(&mut self, mode: Mode) {
        if mem::discriminant(&mode) != mem::discriminant(&self.mode) {
            debug!("Mode {} -> {}", self.mode.name(), mode.name());
        }
        self.mode = mode;
    }

    fn leave(&mut self) -> Mode {
        let old = mem::take(&mut self.mode);
        if !matches!(old, Mode::Idle) {
            debug!("Mode {} -> idle", old.name());
        }
        old
    }

    /// The outline being drawn, if any.
    pub fn draft_points(&self) -> Option<&[Point]> {
        match &self.mode {
            Mode::Drawing(d) | Mode::PendingLabel(d) => Some(&d.points),
            _ => None,
        }
    }

    pub fn rubber_band(&self) -> Option<Rect> {
        match &self.mode {
            Mode::RubberBand { start, current, .. } => Some(Rect::from_corners(*start, *current)),
            _ => None,
        }
    }

    /// Topmost entity under `point`: outcomes, then swimlanes, then blobs.
    pub fn hit_test(&self, point: Point) -> Option<EntityRef> {
        let d = &self.diagram;
        let cfg = &self.config;
        let outcome = d.outcomes().rev().find(|o| {
            d.outcome_position(o.id)
                .is_some_and(|p| p.distance(point) <= cfg.outcome_radius)
        });
        if let Some(o) = outcome {
            return Some(EntityRef::Outcome(o.id));
        }
        let lane = d.swimlanes().rev().find(|l| {
            d.swimlane_tip(l.id).is_some_and(|tip| {
                geometry::hit_test_segment(point, d.center(), tip, cfg.hit_tolerance)
            })
        });
        if let Some(l) = lane {
            return Some(EntityRef::Swimlane(l.id));
        }
        d.blobs()
            .iter()
            .rev()
            .find(|b| geometry::point_in_polygon(point, &b.points))
            .map(|b| EntityRef::Blob(b.id))
    }

    /// Everything a rubber band over `rect` would select.
    pub fn entities_in_rect(&self, rect: Rect) -> Vec<EntityRef> {
        let d = &self.diagram;
        let mut hits = Vec::new();
        hits.extend(
            d.swimlanes()
                .filter(|l| {
                    d.swimlane_tip(l.id)
                        .is_some_and(|tip| rect.intersects_segment(d.center(), tip))
                })
                .map(|l| EntityRef::Swimlane(l.id)),
        );
        hits.extend(
            d.outcomes()
                .filter(|o| d.outcome_position(o.id).is_some_and(|p| rect.contains(p)))
                .map(|o| EntityRef::Outcome(o.id)),
        );
        hits.extend(
            d.blobs()
                .iter()
                .filter(|b| rect.intersects_polygon(&b.points))
                .map(|b| EntityRef::Blob(b.id)),
        );
        hits
    }

    pub fn on_pointer_down(&mut self, point: Point, modifiers: Modifiers) -> Result<()> {
        if !point.is_finite() {
            return Ok(());
        }
        if matches!(self.mode, Mode::Idle) {
            self.press_idle(point, modifiers);
            return Ok(());
        }
        // a label is pending, or a press arrived without its release
        let Mode::Drawing(draft) = &mut self.mode else {
            return Ok(());
        };
        draft.pressed = true;
        draft.points.clear();
        match self.config.blob_shape {
            BlobShape::Freehand => draft.points.push(point),
            BlobShape::Sector => {
                let lane = geometry::nearest_swimlane(
                    &self.diagram,
                    point,
                    self.config.snap_tolerance_degrees,
                );
                draft.start = lane.map(|l| (l, point));
            }
        }
        Ok(())
    }

    fn press_idle(&mut self, point: Point, modifiers: Modifiers) {
        let Some(hit) = self.hit_test(point) else {
            if !modifiers.shift {
                self.selection.clear();
            }
            self.enter(Mode::RubberBand {
                start: point,
                current: point,
                additive: modifiers.shift,
            });
            return;
        };
        if modifiers.shift {
            self.toggle_selected(hit);
            return;
        }
        if !self.is_selected(hit) {
            self.select(hit);
        }
        let Some(from) = self.diagram.placement(hit) else {
            return;
        };
        let kind = match hit {
            EntityRef::Outcome(_) => DragKind::Snap,
            EntityRef::Swimlane(id) => {
                let near_tip = self
                    .diagram
                    .swimlane_tip(id)
                    .is_some_and(|tip| tip.distance(point) <= self.config.handle_radius);
                if near_tip {
                    DragKind::Resize
                } else {
                    DragKind::Rotate
                }
            }
            EntityRef::Blob(_) => DragKind::Translate,
        };
        self.enter(Mode::Dragging(Drag {
            target: hit,
            kind,
            from,
            grab: point,
        }));
    }

    pub fn on_pointer_move(&mut self, point: Point, _modifiers: Modifiers) -> Result<()> {
        if !point.is_finite() {
            return Ok(());
        }
        let min_spacing = self.config.min_point_spacing;
        let sector = self.config.blob_shape == BlobShape::Sector;
        match &self.mode {
            Mode::Dragging(drag) => {
                let target = drag.target;
                if let Some(placement) = self.drag_placement(drag, point) {
                    // live preview; recorded once on release
                    if let Err(err) = self.diagram.set_placement(target, &placement) {
                        warn!("Drag preview of {target} rejected: {err}");
                    }
                }
            }
            Mode::Drawing(draft) if draft.pressed && sector => {
                let preview = draft
                    .start
                    .and_then(|(lane, origin)| self.sector_outline(lane, origin, point))
                    .unwrap_or_default();
                if let Mode::Drawing(draft) = &mut self.mode {
                    draft.points = preview;
                }
            }
            Mode::Drawing(draft) if draft.pressed => {
                let far_enough = draft
                    .points
                    .last()
                    .is_none_or(|last| last.distance(point) >= min_spacing);
                if far_enough && let Mode::Drawing(draft) = &mut self.mode {
                    draft.points.push(point);
                }
            }
            Mode::RubberBand {
                start, additive, ..
            } => {
                let (start, additive) = (*start, *additive);
                self.mode = Mode::RubberBand {
                    start,
                    current: point,
                    additive,
                };
            }
            _ => {}
        }
        Ok(())
    }

    pub fn on_pointer_up(&mut self, point: Point, modifiers: Modifiers) -> Result<()> {
        let point = if point.is_finite() { point } else { Point::ORIGIN };
        match self.leave() {
            Mode::Dragging(drag) => self.finish_drag(drag),
            Mode::Drawing(draft) if draft.pressed => {
                self.finish_stroke(draft, point, modifiers);
                Ok(())
            }
            // released before pressing: keep waiting for the stroke
            Mode::Drawing(draft) => {
                self.mode = Mode::Drawing(draft);
                Ok(())
            }
            Mode::RubberBand {
                start, additive, ..
            } => {
                let hits = self.entities_in_rect(Rect::from_corners(start, point));
                if !additive {
                    self.selection.clear();
                }
                self.selection.extend(hits);
                Ok(())
            }
            other => {
                self.mode = other;
                Ok(())
            }
        }
    }

    pub fn on_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::Escape => {
                self.cancel();
                Ok(())
            }
            Key::Enter if matches!(self.mode, Mode::PendingLabel(_)) => {
                self.confirm_blob_label("").map(|_| ())
            }
            Key::Delete | Key::Backspace if matches!(self.mode, Mode::Idle) => {
                self.delete_selection().map(|_| ())
            }
            Key::Enter | Key::Delete | Key::Backspace => Ok(()),
            Key::Undo => {
                self.cancel();
                self.undo().map(|_| ())
            }
            Key::Redo => {
                self.cancel();
                self.redo().map(|_| ())
            }
        }
    }

    /// Drops whatever gesture is in progress. A drag is rolled back to
    /// where it started.
    pub fn cancel(&mut self) {
        if let Mode::Dragging(drag) = self.leave()
            && let Err(err) = self.diagram.set_placement(drag.target, &drag.from)
        {
            warn!("Could not roll back drag of {}: {err}", drag.target);
        }
    }

    fn drag_placement(&self, drag: &Drag, point: Point) -> Option<Placement> {
        let d = &self.diagram;
        let center = d.center();
        match (drag.kind, &drag.from) {
            (DragKind::Snap, Placement::Outcome { .. }) => {
                let lane_id =
                    geometry::nearest_swimlane(d, point, self.config.snap_tolerance_degrees)?;
                let lane = d.swimlane(lane_id)?;
                Some(Placement::Outcome {
                    swimlane_id: lane_id,
                    distance: geometry::snapped_distance(center, lane, point),
                })
            }
            (DragKind::Rotate, Placement::Swimlane { length, .. }) => {
                if point == center {
                    return None;
                }
                let (angle, _) = geometry::to_polar(center, point);
                Some(Placement::Swimlane {
                    angle,
                    length: *length,
                })
            }
            (DragKind::Resize, Placement::Swimlane { angle, .. }) => {
                let (_, length) = geometry::to_polar(center, point);
                Some(Placement::Swimlane {
                    angle: *angle,
                    length,
                })
            }
            (DragKind::Translate, Placement::Blob { points }) => {
                let delta = point - drag.grab;
                Some(Placement::Blob {
                    points: points.iter().map(|p| *p + delta).collect(),
                })
            }
            _ => None,
        }
    }

    /// Puts the live edit back to `from` and records the whole gesture as
    /// one move.
    fn finish_drag(&mut self, drag: Drag) -> Result<()> {
        let Some(to) = self.diagram.placement(drag.target) else {
            return Err(Error::consistency(format!(
                "{} vanished during a drag",
                drag.target
            )));
        };
        if to == drag.from {
            return Ok(());
        }
        self.diagram
            .set_placement(drag.target, &drag.from)
            .map_err(|err| Error::consistency(format!("drag rollback failed: {err}")))?;
        self.execute(Command::move_entity(drag.target, drag.from, to))
    }

    /// Arms the blob tool. The next press starts the outline.
    pub fn start_blob_drawing(&mut self) {
        self.cancel();
        self.enter(Mode::Drawing(Draft::default()));
    }

    fn finish_stroke(&mut self, mut draft: Draft, point: Point, _modifiers: Modifiers) {
        match self.config.blob_shape {
            BlobShape::Freehand => {
                let far_enough = draft
                    .points
                    .last()
                    .is_none_or(|last| last.distance(point) >= self.config.min_point_spacing);
                if far_enough {
                    draft.points.push(point);
                }
            }
            BlobShape::Sector => {
                let outline = draft
                    .start
                    .and_then(|(lane, origin)| self.sector_outline(lane, origin, point));
                let Some(outline) = outline else {
                    debug!("Sector released off a second swimlane, discarding");
                    return;
                };
                draft.points = outline;
            }
        }
        draft.pressed = false;
        self.enter(Mode::PendingLabel(draft));
    }

    /// Pie segment from the press swimlane to the one nearest `end`.
    fn sector_outline(&self, start_lane: SwimlaneId, origin: Point, end: Point) -> Option<Vec<Point>> {
        let d = &self.diagram;
        let end_lane = geometry::nearest_swimlane(d, end, self.config.snap_tolerance_degrees)?;
        if end_lane == start_lane {
            return None;
        }
        let a = d.swimlane(start_lane)?;
        let b = d.swimlane(end_lane)?;
        let reach = |lane: SwimlaneId, p: Point| {
            d.outcomes_on(lane)
                .filter_map(|o| Some((d.outcome_position(o.id)?.distance(p), o.distance)))
                .min_by(|x, y| x.0.total_cmp(&y.0))
                .map_or(SECTOR_DEFAULT_RADIUS, |(_, distance)| distance)
        };
        // pad so the nearest outcomes land inside rather than on the arc
        let outer = reach(a.id, origin).max(reach(b.id, end)) + self.config.outcome_radius;
        // widen so outcomes sitting on either ray fall inside
        Some(geometry::sector_points(
            d.center(),
            a.angle - SECTOR_ANGLE_PAD,
            b.angle + SECTOR_ANGLE_PAD,
            SECTOR_INNER_RADIUS,
            outer,
            SECTOR_STEPS,
        ))
    }

    /// Commits the pending outline as a blob. An empty label leaves the
    /// blob unlabeled. Too short an outline is discarded with an error.
    pub fn confirm_blob_label(&mut self, label: &str) -> Result<BlobId> {
        let Mode::PendingLabel(draft) = self.leave() else {
            return Err(Error::validation("no blob outline is waiting for a label"));
        };
        let color = blob_palette_color(self.diagram.blobs().len());
        let label = (!label.trim().is_empty()).then(|| label.trim().to_string());
        let cmd = match Command::create_blob(&mut self.diagram, draft.points, color, label) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!("Discarding blob outline: {err}");
                return Err(err);
            }
        };
        let Command::Create {
            entity: Entity::Blob(blob),
            ..
        } = &cmd
        else {
            return Err(Error::consistency("blob constructor built another command"));
        };
        let id = blob.id;
        self.execute(cmd)?;
        self.select(EntityRef::Blob(id));
        Ok(id)
    }
}
