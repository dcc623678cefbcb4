use radscope::{BlobShape, EntityRef, Rgba, StackStep};

use super::DiagramApp;

impl DiagramApp {
    /// Surfaces a failed edit in the status bar.
    pub(super) fn report<T>(&mut self, what: &str, result: radscope::Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.status = Some(format!("{what} failed: {e}"));
                None
            }
        }
    }

    pub(super) fn new_document(&mut self) {
        self.session.reset();
        self.pressed = false;
        self.status = Some("New diagram".to_string());
    }

    pub(super) fn undo(&mut self) {
        self.session.cancel();
        match self.session.undo() {
            Ok(StackStep::Done) => self.status = None,
            Ok(StackStep::Empty) => self.status = Some("Nothing to undo".to_string()),
            Err(e) => self.status = Some(format!("Undo failed: {e}")),
        }
    }

    pub(super) fn redo(&mut self) {
        self.session.cancel();
        match self.session.redo() {
            Ok(StackStep::Done) => self.status = None,
            Ok(StackStep::Empty) => self.status = Some("Nothing to redo".to_string()),
            Err(e) => self.status = Some(format!("Redo failed: {e}")),
        }
    }

    pub(super) fn delete_selected(&mut self) {
        let result = self.session.delete_selection();
        if let Some(n) = self.report("Delete", result)
            && n > 0
        {
            self.status = Some(format!("Deleted {n} item(s)"));
        }
    }

    pub(super) fn add_swimlane(&mut self) {
        let angle = self.drafts.new_swimlane_angle;
        let result = self.session.add_swimlane(angle, "", None);
        if let Some(id) = self.report("Add swimlane", result) {
            self.session.select(EntityRef::Swimlane(id));
        }
    }

    /// Adds an outcome halfway along the selected swimlane.
    pub(super) fn add_outcome_to_selection(&mut self) {
        let lane = self.session.selection().iter().find_map(|e| match e {
            EntityRef::Swimlane(id) => self.session.diagram().swimlane(*id),
            _ => None,
        });
        let Some(lane) = lane else {
            self.status = Some("Select a swimlane first".to_string());
            return;
        };
        let (id, distance) = (lane.id, lane.length / 2.0);
        let result = self.session.add_outcome(id, distance, "");
        if let Some(outcome) = self.report("Add outcome", result) {
            self.session.select(EntityRef::Outcome(outcome));
        }
    }

    pub(super) fn start_blob_tool(&mut self) {
        self.session.start_blob_drawing();
        self.status = Some(match self.session.config().blob_shape {
            BlobShape::Freehand => "Drag to outline a scope blob".to_string(),
            BlobShape::Sector => "Drag from one swimlane to another".to_string(),
        });
    }

    pub(super) fn toggle_blob_shape(&mut self) {
        self.update_config(|config| {
            config.blob_shape = match config.blob_shape {
                BlobShape::Freehand => BlobShape::Sector,
                BlobShape::Sector => BlobShape::Freehand,
            };
        });
    }

    pub(super) fn toggle_labels(&mut self) {
        self.show_labels = !self.show_labels;
        self.persist_settings();
    }

    pub(super) fn confirm_pending_blob(&mut self) {
        let label = std::mem::take(&mut self.drafts.pending_blob_label);
        let result = self.session.confirm_blob_label(&label);
        if self.report("Add blob", result).is_some() {
            self.status = None;
        }
    }

    pub(super) fn entity_label(&self, entity: EntityRef) -> Option<String> {
        let d = self.session.diagram();
        match entity {
            EntityRef::Swimlane(id) => d.swimlane(id).map(|l| l.label.clone()),
            EntityRef::Outcome(id) => d.outcome(id).map(|o| o.label.clone()),
            EntityRef::Blob(id) => d.blob(id).map(|b| b.label.clone().unwrap_or_default()),
        }
    }

    pub(super) fn rename_selected(&mut self) {
        let Some(entity) = self.single_selection() else {
            return;
        };
        if self.entity_label(entity).as_deref() == Some(self.drafts.label.as_str()) {
            return;
        }
        let label = self.drafts.label.clone();
        let result = self.session.rename(entity, label);
        self.report("Rename", result);
    }

    pub(super) fn recolor_selected(&mut self, color: Rgba) {
        let result = self.session.change_selection_color(color);
        self.report("Recolor", result);
    }

    pub(super) fn single_selection(&self) -> Option<EntityRef> {
        match self.session.selection().len() {
            1 => self.session.selection().first().copied(),
            _ => None,
        }
    }

    pub(super) fn save_to_path(&mut self) {
        let result = match self.session.path() {
            Some(_) => self.session.save(),
            None => self.session.save_as(self.file_path.clone()),
        };
        if self.report("Save", result).is_some() {
            self.remember_path("Saved");
        }
    }

    pub(super) fn save_json_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(&self.file_path)
            .add_filter("JSON", &["json"])
            .save_file()
        {
            let result = self.session.save_as(&path);
            if self.report("Save", result).is_some() {
                self.remember_path("Saved");
            }
        }
    }

    pub(super) fn open_json_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        {
            let result = self.session.load(&path);
            if self.report("Open", result).is_some() {
                self.pressed = false;
                self.remember_path("Opened");
            }
        }
    }

    fn remember_path(&mut self, verb: &str) {
        if let Some(path) = self.session.path() {
            self.file_path = path.display().to_string();
            self.status = Some(format!("{verb} {}", self.file_path));
        }
        self.persist_settings();
    }
}
