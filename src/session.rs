//! One open document: the diagram, its history and the editor state
//! around it.

use indexmap::IndexSet;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::command::{Command, Entity};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geometry::{self, Point};
use crate::history::{CommandStack, StackStep};
use crate::ids::{OutcomeId, SwimlaneId};
use crate::interaction::Mode;
use crate::model::{Diagram, EntityRef, Rgba};

#[derive(Debug)]
pub struct Session {
    pub(crate) diagram: Diagram,
    pub(crate) history: CommandStack,
    pub(crate) config: Config,
    pub(crate) path: Option<PathBuf>,
    pub(crate) selection: IndexSet<EntityRef>,
    pub(crate) mode: Mode,
    pub(crate) dirty: bool,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self::with_diagram(Diagram::new(), config)
    }

    pub fn with_diagram(diagram: Diagram, config: Config) -> Self {
        Self {
            diagram,
            history: CommandStack::new(config.history_limit),
            config,
            path: None,
            selection: IndexSet::new(),
            mode: Mode::Idle,
            dirty: false,
        }
    }

    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let mut session = Self::with_diagram(Diagram::load(path)?, config);
        session.path = Some(path.to_path_buf());
        Ok(session)
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes effect for new gestures. A smaller history limit drops the
    /// oldest entries right away.
    pub fn set_config(&mut self, config: Config) {
        self.history.set_limit(config.history_limit);
        self.config = config;
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Replaces the open diagram with the file's contents. On any error the
    /// current diagram, history and selection are untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let diagram = match Diagram::load(path) {
            Ok(d) => d,
            Err(err) => {
                warn!("Load of {} rejected: {err}", path.display());
                return Err(err);
            }
        };
        self.diagram = diagram;
        self.history.clear();
        self.selection.clear();
        self.mode = Mode::Idle;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.diagram.save(path)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Saves to the path the document came from.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::validation("document has no file path yet"))?;
        self.save_as(path)
    }

    /// Starts over with an empty diagram.
    pub fn reset(&mut self) {
        self.diagram = Diagram::new();
        self.history.clear();
        self.selection.clear();
        self.mode = Mode::Idle;
        self.path = None;
        self.dirty = false;
        info!("Started a new diagram");
    }

    /// Applies and records a command.
    pub fn execute(&mut self, cmd: Command) -> Result<()> {
        if let Err(err) = self.history.push(cmd, &mut self.diagram) {
            warn!("Edit rejected: {err}");
            return Err(err);
        }
        self.dirty = true;
        self.prune_selection();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<StackStep> {
        let step = self.history.undo(&mut self.diagram)?;
        if step == StackStep::Done {
            self.dirty = true;
            let targets = self
                .history
                .last_undone()
                .map(Command::targets)
                .unwrap_or_default();
            self.reselect(targets);
        }
        Ok(step)
    }

    pub fn redo(&mut self) -> Result<StackStep> {
        let step = self.history.redo(&mut self.diagram)?;
        if step == StackStep::Done {
            self.dirty = true;
            let targets = self
                .history
                .last_applied()
                .map(Command::targets)
                .unwrap_or_default();
            self.reselect(targets);
        }
        Ok(step)
    }

    pub fn add_swimlane(
        &mut self,
        angle: f64,
        label: impl Into<String>,
        color: Option<Rgba>,
    ) -> Result<SwimlaneId> {
        let length = self.config.default_swimlane_length;
        let cmd = Command::create_swimlane(&mut self.diagram, angle, label, color, length)?;
        let id = match &cmd {
            Command::Create {
                entity: Entity::Swimlane(lane),
                ..
            } => lane.id,
            _ => return Err(Error::consistency("swimlane constructor built another command")),
        };
        self.execute(cmd)?;
        Ok(id)
    }

    pub fn add_outcome(
        &mut self,
        swimlane_id: SwimlaneId,
        distance: f64,
        label: impl Into<String>,
    ) -> Result<OutcomeId> {
        let cmd = Command::create_outcome(&mut self.diagram, swimlane_id, distance, label)?;
        let id = match &cmd {
            Command::Create {
                entity: Entity::Outcome(outcome),
                ..
            } => outcome.id,
            _ => return Err(Error::consistency("outcome constructor built another command")),
        };
        self.execute(cmd)?;
        Ok(id)
    }

    /// Adds an outcome on the swimlane nearest to `point`, snapped onto it.
    pub fn add_outcome_at(&mut self, point: Point, label: impl Into<String>) -> Result<OutcomeId> {
        let lane_id = geometry::nearest_swimlane(
            &self.diagram,
            point,
            self.config.snap_tolerance_degrees,
        )
        .ok_or_else(|| Error::validation("no swimlane near that point"))?;
        let lane = self
            .diagram
            .swimlane(lane_id)
            .ok_or_else(|| Error::consistency("nearest swimlane vanished"))?;
        let distance = geometry::snapped_distance(self.diagram.center(), lane, point);
        self.add_outcome(lane_id, distance, label)
    }

    pub fn rename(&mut self, entity: EntityRef, label: impl Into<String>) -> Result<()> {
        let cmd = Command::rename(&self.diagram, entity, label)?;
        self.execute(cmd)
    }

    pub fn set_center(&mut self, center: Point) -> Result<()> {
        let cmd = Command::set_center(&self.diagram, center);
        self.execute(cmd)
    }

    pub fn set_swimlane_angle(&mut self, id: SwimlaneId, angle: f64) -> Result<()> {
        let cmd = Command::set_swimlane_angle(&self.diagram, id, angle)?;
        self.execute(cmd)
    }

    pub fn set_swimlane_length(&mut self, id: SwimlaneId, length: f64) -> Result<()> {
        let cmd = Command::set_swimlane_length(&self.diagram, id, length)?;
        self.execute(cmd)
    }

    /// Deletes everything selected as one undo step. Returns how many
    /// selected entities were deleted.
    pub fn delete_selection(&mut self) -> Result<usize> {
        let targets: Vec<EntityRef> = self.selection.iter().copied().collect();
        if targets.is_empty() {
            return Ok(0);
        }
        let cmd = Command::delete_all(&self.diagram, &targets);
        self.execute(cmd)?;
        self.selection.clear();
        Ok(targets.len())
    }

    /// Recolors every selected entity as one undo step.
    pub fn change_selection_color(&mut self, color: Rgba) -> Result<()> {
        let mut children = Vec::with_capacity(self.selection.len());
        for entity in &self.selection {
            children.push(Command::recolor(&self.diagram, *entity, color)?);
        }
        match children.len() {
            0 => Ok(()),
            1 => self.execute(children.remove(0)),
            _ => self.execute(Command::Composite(children)),
        }
    }

    pub fn selection(&self) -> &IndexSet<EntityRef> {
        &self.selection
    }

    pub fn is_selected(&self, entity: EntityRef) -> bool {
        self.selection.contains(&entity)
    }

    pub fn select(&mut self, entity: EntityRef) {
        if self.diagram.contains(entity) {
            self.selection.clear();
            self.selection.insert(entity);
        }
    }

    pub fn toggle_selected(&mut self, entity: EntityRef) {
        if !self.selection.shift_remove(&entity) && self.diagram.contains(entity) {
            self.selection.insert(entity);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self) {
        self.selection.clear();
        let d = &self.diagram;
        self.selection
            .extend(d.swimlanes().map(|l| EntityRef::Swimlane(l.id)));
        self.selection
            .extend(d.outcomes().map(|o| EntityRef::Outcome(o.id)));
        self.selection
            .extend(d.blobs().iter().map(|b| EntityRef::Blob(b.id)));
    }

    fn reselect(&mut self, targets: Vec<EntityRef>) {
        self.selection.clear();
        self.selection.extend(targets);
        self.prune_selection();
    }

    pub(crate) fn prune_selection(&mut self) {
        let diagram = &self.diagram;
        self.selection.retain(|e| diagram.contains(*e));
    }
}
