use log::{debug, error};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::model::Diagram;

pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Outcome of an undo or redo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackStep {
    Done,
    /// Nothing to undo or redo.
    Empty,
}

/// Linear undo/redo history. Pushing a new command discards the redo side.
#[derive(Debug)]
pub struct CommandStack {
    undo: Vec<Command>,
    redo: Vec<Command>,
    limit: usize,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl CommandStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.trim();
    }

    fn trim(&mut self) {
        if self.undo.len() > self.limit {
            let overflow = self.undo.len() - self.limit;
            self.undo.drain(0..overflow);
        }
    }

    /// Applies `cmd` and records it. Nothing is recorded if it fails.
    pub fn push(&mut self, mut cmd: Command, diagram: &mut Diagram) -> Result<()> {
        cmd.apply(diagram)?;
        debug!("Applied {}", cmd.label());
        self.undo.push(cmd);
        self.trim();
        self.redo.clear();
        Ok(())
    }

    pub fn undo(&mut self, diagram: &mut Diagram) -> Result<StackStep> {
        let Some(mut cmd) = self.undo.pop() else {
            return Ok(StackStep::Empty);
        };
        if let Err(err) = cmd.revert(diagram) {
            return Err(self.diverged("undo", &cmd, err));
        }
        debug!("Undid {}", cmd.label());
        self.redo.push(cmd);
        Ok(StackStep::Done)
    }

    pub fn redo(&mut self, diagram: &mut Diagram) -> Result<StackStep> {
        let Some(mut cmd) = self.redo.pop() else {
            return Ok(StackStep::Empty);
        };
        if let Err(err) = cmd.apply(diagram) {
            return Err(self.diverged("redo", &cmd, err));
        }
        debug!("Redid {}", cmd.label());
        self.undo.push(cmd);
        Ok(StackStep::Done)
    }

    /// History can't be trusted once a step fails; drop all of it.
    fn diverged(&mut self, step: &str, cmd: &Command, err: Error) -> Error {
        error!("{step} of '{}' failed, clearing history: {err}", cmd.label());
        self.clear();
        match err {
            Error::Consistency(_) => err,
            other => Error::consistency(format!("{step} failed: {other}")),
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.undo.last().map(Command::label)
    }

    pub fn redo_label(&self) -> Option<String> {
        self.redo.last().map(Command::label)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub(crate) fn last_applied(&self) -> Option<&Command> {
        self.undo.last()
    }

    pub(crate) fn last_undone(&self) -> Option<&Command> {
        self.redo.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityRef;

    fn lane_command(d: &mut Diagram, angle: f64) -> Command {
        Command::create_swimlane(d, angle, "", None, 100.0).unwrap()
    }

    #[test]
    fn test_empty_stack_steps() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::default();
        assert_eq!(stack.undo(&mut d).unwrap(), StackStep::Empty);
        assert_eq!(stack.redo(&mut d).unwrap(), StackStep::Empty);
    }

    #[test]
    fn test_push_undo_redo() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::default();
        let cmd = lane_command(&mut d, 10.0);
        stack.push(cmd, &mut d).unwrap();
        let after = d.clone();

        assert_eq!(stack.undo(&mut d).unwrap(), StackStep::Done);
        assert!(d.is_empty());
        assert_eq!(stack.redo_label().as_deref(), Some("Add swimlane"));
        assert_eq!(stack.redo(&mut d).unwrap(), StackStep::Done);
        assert_eq!(d, after);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::default();
        let first = lane_command(&mut d, 10.0);
        stack.push(first, &mut d).unwrap();
        stack.undo(&mut d).unwrap();
        assert!(stack.can_redo());
        let second = lane_command(&mut d, 20.0);
        stack.push(second, &mut d).unwrap();
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_failed_push_records_nothing() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::default();
        let err = stack
            .push(Command::delete(EntityRef::Blob(crate::ids::BlobId(3))), &mut d)
            .unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::new(3);
        for i in 0..5 {
            let cmd = lane_command(&mut d, i as f64);
            stack.push(cmd, &mut d).unwrap();
        }
        assert_eq!(stack.undo_len(), 3);
        for _ in 0..3 {
            assert_eq!(stack.undo(&mut d).unwrap(), StackStep::Done);
        }
        assert_eq!(stack.undo(&mut d).unwrap(), StackStep::Empty);
        assert_eq!(d.swimlanes().count(), 2);
    }

    #[test]
    fn test_divergence_clears_history() {
        let mut d = Diagram::new();
        let mut stack = CommandStack::default();
        let cmd = lane_command(&mut d, 0.0);
        stack.push(cmd, &mut d).unwrap();
        let other = lane_command(&mut d, 90.0);
        stack.push(other, &mut d).unwrap();
        stack.undo(&mut d).unwrap();

        // edit behind the stack's back
        let id = d.swimlanes().next().unwrap().id;
        d.remove_swimlane(id).unwrap();

        assert!(matches!(stack.undo(&mut d), Err(Error::Consistency(_))));
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
    }
}
