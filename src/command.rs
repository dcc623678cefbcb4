//! Reversible edits.
//!
//! A [`Command`] carries everything it needs to apply and revert itself
//! against a [`Diagram`]. Anything a command learns while applying (what a
//! delete cascaded into, which blob caches a move changed) is stored on the
//! command so the revert is exact.

use log::debug;

use crate::error::{EntityKind, Error, Result};
use crate::geometry::Point;
use crate::ids::{BlobId, OutcomeId, SwimlaneId};
use crate::model::{
    BlobAnchors, Diagram, EntityRef, Outcome, Placement, RemovedSubgraph, Rgba, ScopeBlob,
    Swimlane,
};

/// A fully-formed entity held by a creation.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Swimlane(Swimlane),
    Outcome(Outcome),
    Blob(ScopeBlob),
}

impl Entity {
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Entity::Swimlane(l) => EntityRef::Swimlane(l.id),
            Entity::Outcome(o) => EntityRef::Outcome(o.id),
            Entity::Blob(b) => EntityRef::Blob(b.id),
        }
    }
}

/// A single field edit with its old and new value.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    SwimlaneLabel {
        id: SwimlaneId,
        old: String,
        new: String,
    },
    OutcomeLabel {
        id: OutcomeId,
        old: String,
        new: String,
    },
    BlobLabel {
        id: BlobId,
        old: Option<String>,
        new: Option<String>,
    },
    SwimlaneColor {
        id: SwimlaneId,
        old: Rgba,
        new: Rgba,
    },
    OutcomeColor {
        id: OutcomeId,
        old: Option<Rgba>,
        new: Option<Rgba>,
    },
    BlobColor {
        id: BlobId,
        old: Rgba,
        new: Rgba,
    },
    /// Rotating a swimlane moves its outcomes, so blob caches are
    /// recomputed and the previous ones kept in `reanchored`.
    SwimlaneAngle {
        id: SwimlaneId,
        old: f64,
        new: f64,
        reanchored: Vec<(BlobId, BlobAnchors)>,
    },
    SwimlaneLength {
        id: SwimlaneId,
        old: f64,
        new: f64,
    },
    Center {
        old: Point,
        new: Point,
        reanchored: Vec<(BlobId, BlobAnchors)>,
    },
}

impl Change {
    fn write(&mut self, diagram: &mut Diagram, forward: bool) -> Result<()> {
        match self {
            Change::SwimlaneLabel { id, old, new } => {
                diagram.set_swimlane_label(*id, pick(forward, old, new).clone())
            }
            Change::OutcomeLabel { id, old, new } => {
                diagram.set_outcome_label(*id, pick(forward, old, new).clone())
            }
            Change::BlobLabel { id, old, new } => {
                diagram.set_blob_label(*id, pick(forward, old, new).clone())
            }
            Change::SwimlaneColor { id, old, new } => {
                diagram.set_swimlane_color(*id, *pick(forward, old, new))
            }
            Change::OutcomeColor { id, old, new } => {
                diagram.set_outcome_color(*id, *pick(forward, old, new))
            }
            Change::BlobColor { id, old, new } => diagram.set_blob_color(*id, *pick(forward, old, new)),
            Change::SwimlaneLength { id, old, new } => {
                diagram.set_swimlane_length(*id, *pick(forward, old, new))
            }
            Change::SwimlaneAngle {
                id,
                old,
                new,
                reanchored,
            } => {
                diagram.set_swimlane_angle(*id, *pick(forward, old, new))?;
                settle_anchors(diagram, reanchored, forward)
            }
            Change::Center {
                old,
                new,
                reanchored,
            } => {
                diagram.set_center(*pick(forward, old, new))?;
                settle_anchors(diagram, reanchored, forward)
            }
        }
    }

    fn target(&self) -> Option<EntityRef> {
        match self {
            Change::SwimlaneLabel { id, .. }
            | Change::SwimlaneColor { id, .. }
            | Change::SwimlaneAngle { id, .. }
            | Change::SwimlaneLength { id, .. } => Some(EntityRef::Swimlane(*id)),
            Change::OutcomeLabel { id, .. } | Change::OutcomeColor { id, .. } => {
                Some(EntityRef::Outcome(*id))
            }
            Change::BlobLabel { id, .. } | Change::BlobColor { id, .. } => {
                Some(EntityRef::Blob(*id))
            }
            Change::Center { .. } => None,
        }
    }
}

/// One drag gesture, from press to release.
#[derive(Clone, Debug, PartialEq)]
pub struct Move {
    pub target: EntityRef,
    pub from: Placement,
    pub to: Placement,
    /// Blob caches the move changed, with their previous values.
    pub reanchored: Vec<(BlobId, BlobAnchors)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Create {
        entity: Entity,
        /// Blob caches an added outcome changed, with their previous values.
        reanchored: Vec<(BlobId, BlobAnchors)>,
    },
    Delete {
        target: EntityRef,
        /// Filled in by `apply`.
        removed: Option<RemovedSubgraph>,
    },
    Change(Change),
    Move(Move),
    /// Applied in order, reverted in reverse. All or nothing.
    Composite(Vec<Command>),
}

/// Forward: recompute every cache and remember what changed.
/// Backward: put the remembered caches back.
fn settle_anchors(
    diagram: &mut Diagram,
    reanchored: &mut Vec<(BlobId, BlobAnchors)>,
    forward: bool,
) -> Result<()> {
    if forward {
        *reanchored = diagram.recompute_all_associations();
        return Ok(());
    }
    for (blob, anchors) in reanchored.iter().rev() {
        diagram.set_blob_anchors(*blob, *anchors)?;
    }
    Ok(())
}

fn pick<T>(forward: bool, old: T, new: T) -> T {
    if forward { new } else { old }
}

fn as_consistency(err: Error) -> Error {
    match err {
        Error::Consistency(_) => err,
        other => Error::consistency(other.to_string()),
    }
}

fn kind_name(entity: EntityRef) -> String {
    entity.kind().to_string()
}

impl Command {
    pub fn create(entity: Entity) -> Command {
        Command::Create {
            entity,
            reanchored: Vec::new(),
        }
    }

    /// Allocates the id now so redo recreates the same entity.
    pub fn create_swimlane(
        diagram: &mut Diagram,
        angle: f64,
        label: impl Into<String>,
        color: Option<Rgba>,
        length: f64,
    ) -> Result<Command> {
        if !angle.is_finite() {
            return Err(Error::validation("swimlane angle must be finite"));
        }
        if !length.is_finite() || length < 0.0 {
            return Err(Error::validation(format!(
                "swimlane length must be a non-negative number, got {length}"
            )));
        }
        let lane = diagram.new_swimlane(angle, label.into(), color, length);
        Ok(Command::create(Entity::Swimlane(lane)))
    }

    pub fn create_outcome(
        diagram: &mut Diagram,
        swimlane_id: SwimlaneId,
        distance: f64,
        label: impl Into<String>,
    ) -> Result<Command> {
        let outcome = diagram.new_outcome(swimlane_id, distance, label.into())?;
        Ok(Command::create(Entity::Outcome(outcome)))
    }

    /// The blob's associations are computed against the diagram as it is
    /// now, so the command should be pushed straight away.
    pub fn create_blob(
        diagram: &mut Diagram,
        points: Vec<Point>,
        color: Rgba,
        label: Option<String>,
    ) -> Result<Command> {
        let blob = diagram.new_blob(points, color, label)?;
        Ok(Command::create(Entity::Blob(blob)))
    }

    pub fn delete(target: EntityRef) -> Command {
        Command::Delete {
            target,
            removed: None,
        }
    }

    /// Deletes a set of entities as one step.
    ///
    /// Blobs go first, then outcomes, then swimlanes. Outcomes whose
    /// swimlane is also being deleted are left to the swimlane's cascade.
    pub fn delete_all(diagram: &Diagram, targets: &[EntityRef]) -> Command {
        let lanes: Vec<SwimlaneId> = targets
            .iter()
            .filter_map(|t| match t {
                EntityRef::Swimlane(id) => Some(*id),
                _ => None,
            })
            .collect();
        let mut ordered: Vec<EntityRef> = targets
            .iter()
            .copied()
            .filter(|t| diagram.contains(*t))
            .filter(|t| match t {
                EntityRef::Outcome(id) => diagram
                    .outcome(*id)
                    .is_none_or(|o| !lanes.contains(&o.swimlane_id)),
                _ => true,
            })
            .collect();
        ordered.sort_by_key(|t| match t {
            EntityRef::Blob(_) => 0,
            EntityRef::Outcome(_) => 1,
            EntityRef::Swimlane(_) => 2,
        });
        ordered.dedup();
        match ordered.as_slice() {
            [single] => Command::delete(*single),
            _ => Command::Composite(ordered.into_iter().map(Command::delete).collect()),
        }
    }

    pub fn rename(diagram: &Diagram, entity: EntityRef, label: impl Into<String>) -> Result<Command> {
        let new = label.into();
        let missing = || Error::reference(entity.kind(), entity.raw());
        let change = match entity {
            EntityRef::Swimlane(id) => Change::SwimlaneLabel {
                id,
                old: diagram.swimlane(id).ok_or_else(missing)?.label.clone(),
                new,
            },
            EntityRef::Outcome(id) => Change::OutcomeLabel {
                id,
                old: diagram.outcome(id).ok_or_else(missing)?.label.clone(),
                new,
            },
            EntityRef::Blob(id) => Change::BlobLabel {
                id,
                old: diagram.blob(id).ok_or_else(missing)?.label.clone(),
                new: (!new.is_empty()).then_some(new),
            },
        };
        Ok(Command::Change(change))
    }

    pub fn recolor(diagram: &Diagram, entity: EntityRef, color: Rgba) -> Result<Command> {
        let missing = || Error::reference(entity.kind(), entity.raw());
        let change = match entity {
            EntityRef::Swimlane(id) => Change::SwimlaneColor {
                id,
                old: diagram.swimlane(id).ok_or_else(missing)?.color,
                new: color,
            },
            EntityRef::Outcome(id) => Change::OutcomeColor {
                id,
                old: diagram.outcome(id).ok_or_else(missing)?.color,
                new: Some(color),
            },
            EntityRef::Blob(id) => Change::BlobColor {
                id,
                old: diagram.blob(id).ok_or_else(missing)?.color,
                new: color,
            },
        };
        Ok(Command::Change(change))
    }

    pub fn set_swimlane_angle(diagram: &Diagram, id: SwimlaneId, angle: f64) -> Result<Command> {
        let lane = diagram
            .swimlane(id)
            .ok_or_else(|| Error::reference(EntityKind::Swimlane, id.0))?;
        Ok(Command::Change(Change::SwimlaneAngle {
            id,
            old: lane.angle,
            new: angle,
            reanchored: Vec::new(),
        }))
    }

    pub fn set_swimlane_length(diagram: &Diagram, id: SwimlaneId, length: f64) -> Result<Command> {
        let lane = diagram
            .swimlane(id)
            .ok_or_else(|| Error::reference(EntityKind::Swimlane, id.0))?;
        Ok(Command::Change(Change::SwimlaneLength {
            id,
            old: lane.length,
            new: length,
        }))
    }

    pub fn set_center(diagram: &Diagram, center: Point) -> Command {
        Command::Change(Change::Center {
            old: diagram.center(),
            new: center,
            reanchored: Vec::new(),
        })
    }

    pub fn move_entity(target: EntityRef, from: Placement, to: Placement) -> Command {
        Command::Move(Move {
            target,
            from,
            to,
            reanchored: Vec::new(),
        })
    }

    pub fn apply(&mut self, diagram: &mut Diagram) -> Result<()> {
        match self {
            Command::Create { entity, reanchored } => match entity {
                Entity::Swimlane(l) => diagram.insert_swimlane(l.clone()),
                Entity::Outcome(o) => {
                    diagram.insert_outcome(o.clone())?;
                    settle_anchors(diagram, reanchored, true)
                }
                Entity::Blob(b) => diagram.insert_blob(b.clone()),
            },
            Command::Delete { target, removed } => {
                *removed = Some(diagram.remove(*target)?);
                Ok(())
            }
            Command::Change(change) => change.write(diagram, true),
            Command::Move(mv) => {
                diagram.set_placement(mv.target, &mv.to)?;
                mv.reanchored = diagram.recompute_all_associations();
                Ok(())
            }
            Command::Composite(children) => {
                for i in 0..children.len() {
                    if let Err(err) = children[i].apply(diagram) {
                        debug!("Composite child {i} failed, rolling back: {err}");
                        for done in children[..i].iter_mut().rev() {
                            done.revert(diagram)?;
                        }
                        return Err(err);
                    }
                }
                Ok(())
            }
        }
    }

    /// Any failure here means history and diagram disagree, and is
    /// reported as [`Error::Consistency`].
    pub fn revert(&mut self, diagram: &mut Diagram) -> Result<()> {
        self.revert_inner(diagram).map_err(as_consistency)
    }

    fn revert_inner(&mut self, diagram: &mut Diagram) -> Result<()> {
        match self {
            Command::Create { entity, reanchored } => {
                // Blobs must stop pointing at the outcome before it goes.
                settle_anchors(diagram, reanchored, false)?;
                diagram.withdraw(entity.entity_ref())
            }
            Command::Delete { target, removed } => {
                let subgraph = removed.as_ref().ok_or_else(|| {
                    Error::consistency(format!("delete of {target} was never applied"))
                })?;
                diagram.restore(subgraph)
            }
            Command::Change(change) => change.write(diagram, false),
            Command::Move(mv) => {
                diagram.set_placement(mv.target, &mv.from)?;
                settle_anchors(diagram, &mut mv.reanchored, false)
            }
            Command::Composite(children) => {
                for child in children.iter_mut().rev() {
                    child.revert_inner(diagram)?;
                }
                Ok(())
            }
        }
    }

    /// Entities this command is about, for reselecting after undo/redo.
    pub fn targets(&self) -> Vec<EntityRef> {
        match self {
            Command::Create { entity, .. } => vec![entity.entity_ref()],
            Command::Delete { target, .. } => vec![*target],
            Command::Change(change) => change.target().into_iter().collect(),
            Command::Move(mv) => vec![mv.target],
            Command::Composite(children) => children.iter().flat_map(|c| c.targets()).collect(),
        }
    }

    /// Short description for menus and status lines.
    pub fn label(&self) -> String {
        match self {
            Command::Create { entity, .. } => format!("Add {}", kind_name(entity.entity_ref())),
            Command::Delete { target, .. } => format!("Delete {}", kind_name(*target)),
            Command::Change(change) => match change {
                Change::SwimlaneLabel { .. } => "Rename swimlane".to_string(),
                Change::OutcomeLabel { .. } => "Rename outcome".to_string(),
                Change::BlobLabel { .. } => "Rename blob".to_string(),
                Change::SwimlaneColor { .. } => "Recolor swimlane".to_string(),
                Change::OutcomeColor { .. } => "Recolor outcome".to_string(),
                Change::BlobColor { .. } => "Recolor blob".to_string(),
                Change::SwimlaneAngle { .. } => "Rotate swimlane".to_string(),
                Change::SwimlaneLength { .. } => "Resize swimlane".to_string(),
                Change::Center { .. } => "Move center".to_string(),
            },
            Command::Move(mv) => format!("Move {}", kind_name(mv.target)),
            Command::Composite(children) => match children.as_slice() {
                [only] => only.label(),
                _ if children.iter().all(|c| matches!(c, Command::Delete { .. })) => {
                    format!("Delete {} items", children.len())
                }
                _ if children.iter().all(|c| matches!(c, Command::Change(_))) => {
                    format!("Edit {} items", children.len())
                }
                _ => format!("{} edits", children.len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline() -> Vec<Point> {
        vec![
            Point::new(50.0, -20.0),
            Point::new(150.0, -20.0),
            Point::new(150.0, 20.0),
            Point::new(50.0, 20.0),
        ]
    }

    #[test]
    fn test_create_then_revert() {
        let mut d = Diagram::new();
        let before = d.clone();
        let mut cmd = Command::create_swimlane(&mut d, 30.0, "x", None, 100.0).unwrap();
        cmd.apply(&mut d).unwrap();
        assert_eq!(d.swimlanes().count(), 1);
        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);
        // redo brings back the same id
        cmd.apply(&mut d).unwrap();
        assert_eq!(cmd.targets(), vec![EntityRef::Swimlane(d.swimlanes().next().unwrap().id)]);
    }

    #[test]
    fn test_create_rejects_negative_length() {
        let mut d = Diagram::new();
        assert!(matches!(
            Command::create_swimlane(&mut d, 0.0, "", None, -5.0),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_create_outcome_anchors_existing_blob() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        let blob = d.add_blob(outline(), Rgba::default(), None).unwrap();
        assert!(d.blob(blob).unwrap().anchors.is_empty());
        let before = d.clone();

        let mut cmd = Command::create_outcome(&mut d, lane, 100.0, "a").unwrap();
        cmd.apply(&mut d).unwrap();
        let a = match &cmd {
            Command::Create {
                entity: Entity::Outcome(o),
                reanchored,
            } => {
                assert_eq!(reanchored, &vec![(blob, BlobAnchors::default())]);
                o.id
            }
            other => panic!("expected an outcome creation, got {other:?}"),
        };
        let anchors = d.blob(blob).unwrap().anchors;
        assert_eq!(anchors.start_outcome, Some(a));
        assert_eq!(anchors.end_outcome, Some(a));
        assert_eq!(anchors.start_swimlane, Some(lane));

        // the blob lets go of the outcome before it is withdrawn
        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);

        cmd.apply(&mut d).unwrap();
        assert_eq!(d.blob(blob).unwrap().anchors, anchors);
    }

    #[test]
    fn test_create_outcome_outside_blobs_changes_no_anchors() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        d.add_blob(outline(), Rgba::default(), None).unwrap();
        let mut cmd = Command::create_outcome(&mut d, lane, 300.0, "far").unwrap();
        cmd.apply(&mut d).unwrap();
        assert!(matches!(&cmd, Command::Create { reanchored, .. } if reanchored.is_empty()));
    }

    #[test]
    fn test_delete_records_cascade() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        d.add_outcome(lane, 100.0, "a").unwrap();
        d.add_blob(outline(), Rgba::default(), None).unwrap();
        let before = d.clone();

        let mut cmd = Command::delete(EntityRef::Swimlane(lane));
        cmd.apply(&mut d).unwrap();
        assert!(d.is_empty());
        let Command::Delete { removed: Some(removed), .. } = &cmd else {
            panic!("delete should record what it removed");
        };
        assert_eq!(removed.removed_count(), 3);

        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_change_swimlane_angle_reanchors() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        let a = d.add_outcome(lane, 100.0, "a").unwrap();
        let blob = d.add_blob(outline(), Rgba::default(), None).unwrap();
        assert_eq!(d.blob(blob).unwrap().anchors.start_outcome, Some(a));
        let before = d.clone();

        let mut cmd = Command::set_swimlane_angle(&d, lane, 180.0).unwrap();
        cmd.apply(&mut d).unwrap();
        assert!(d.blob(blob).unwrap().anchors.is_empty());
        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_move_outcome_and_back() {
        let mut d = Diagram::new();
        let east = d.add_swimlane(0.0, "east", None);
        let south = d.add_swimlane(90.0, "south", None);
        let a = d.add_outcome(east, 100.0, "a").unwrap();
        let blob = d.add_blob(outline(), Rgba::default(), None).unwrap();
        let before = d.clone();

        let from = d.placement(EntityRef::Outcome(a)).unwrap();
        let to = Placement::Outcome {
            swimlane_id: south,
            distance: 40.0,
        };
        let mut cmd = Command::move_entity(EntityRef::Outcome(a), from, to);
        cmd.apply(&mut d).unwrap();
        assert_eq!(d.outcome(a).unwrap().swimlane_id, south);
        assert!(d.blob(blob).unwrap().anchors.is_empty());
        assert_eq!(cmd.label(), "Move outcome");

        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_composite_rolls_back_on_failure() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        let before = d.clone();
        let mut cmd = Command::Composite(vec![
            Command::rename(&d, EntityRef::Swimlane(lane), "renamed").unwrap(),
            Command::delete(EntityRef::Outcome(OutcomeId(404))),
        ]);
        let err = cmd.apply(&mut d).unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
        assert_eq!(d, before);
    }

    #[test]
    fn test_delete_all_skips_cascaded_outcomes() {
        let mut d = Diagram::new();
        let lane = d.add_swimlane(0.0, "east", None);
        let a = d.add_outcome(lane, 100.0, "a").unwrap();
        let blob = d.add_blob(outline(), Rgba::default(), None).unwrap();
        let before = d.clone();

        let mut cmd = Command::delete_all(
            &d,
            &[
                EntityRef::Swimlane(lane),
                EntityRef::Outcome(a),
                EntityRef::Blob(blob),
            ],
        );
        assert_eq!(cmd.label(), "Delete 2 items");
        cmd.apply(&mut d).unwrap();
        assert!(d.is_empty());
        cmd.revert(&mut d).unwrap();
        assert_eq!(d, before);
    }

    #[test]
    fn test_rename_blob_to_empty_clears_label() {
        let mut d = Diagram::new();
        let blob = d
            .add_blob(outline(), Rgba::default(), Some("scope".into()))
            .unwrap();
        let mut cmd = Command::rename(&d, EntityRef::Blob(blob), "").unwrap();
        cmd.apply(&mut d).unwrap();
        assert_eq!(d.blob(blob).unwrap().label, None);
    }

    #[test]
    fn test_revert_of_vanished_entity_is_consistency_error() {
        let mut d = Diagram::new();
        let mut cmd = Command::create_swimlane(&mut d, 0.0, "", None, 10.0).unwrap();
        cmd.apply(&mut d).unwrap();
        let id = d.swimlanes().next().unwrap().id;
        d.remove_swimlane(id).unwrap();
        assert!(matches!(cmd.revert(&mut d), Err(Error::Consistency(_))));
    }
}
