use eframe::egui;
use radscope::{BlobShape, EntityRef, Key, Mode, Modifiers, Point, Rgba};

use super::command_palette::CommandContext;
use super::geometry::screen_to_point;
use super::render::{color_row, draw_background, draw_diagram, draw_gesture};
use super::DiagramApp;

/// Which panel fields were released this frame.
#[derive(Default)]
struct PanelCommits {
    label: bool,
    angle: bool,
    length: bool,
    center: bool,
    color: Option<Rgba>,
}

impl DiagramApp {
    fn key(&mut self, key: Key) {
        let result = self.session.on_key(key);
        self.report("Edit", result);
    }

    /// Pulls panel values from the model unless a widget is being edited.
    fn sync_drafts(&mut self, entity: Option<EntityRef>) {
        if self.drafts.editing && self.drafts.target == entity {
            return;
        }
        self.drafts.target = entity;
        let c = self.session.diagram().center();
        self.drafts.center = [c.x, c.y];
        self.drafts.label = entity
            .and_then(|e| self.entity_label(e))
            .unwrap_or_default();
        if let Some(EntityRef::Swimlane(id)) = entity
            && let Some(lane) = self.session.diagram().swimlane(id)
        {
            self.drafts.angle = lane.angle;
            self.drafts.length = lane.length;
        }
    }

    fn selection_color(&self) -> Option<Rgba> {
        let d = self.session.diagram();
        self.session.selection().first().and_then(|e| match *e {
            EntityRef::Swimlane(id) => d.swimlane(id).map(|l| l.color),
            EntityRef::Outcome(id) => d.outcome(id).and_then(|o| {
                o.color
                    .or_else(|| d.swimlane(o.swimlane_id).map(|l| l.color))
            }),
            EntityRef::Blob(id) => d.blob(id).map(|b| b.color),
        })
    }

    fn properties_ui(&mut self, ui: &mut egui::Ui) -> PanelCommits {
        let mut commits = PanelCommits::default();
        let mut editing = false;
        let single = self.single_selection();

        ui.heading("Properties");
        ui.separator();
        match self.session.selection().len() {
            0 => {
                ui.label("Nothing selected");
            }
            1 => {
                if let Some(entity) = single {
                    ui.label(format!("{} {}", entity.kind(), entity.raw()));
                }
            }
            n => {
                ui.label(format!("{n} items selected"));
            }
        }

        if single.is_some() {
            ui.label("Label");
            let resp = ui.text_edit_singleline(&mut self.drafts.label);
            editing |= resp.has_focus();
            commits.label = resp.lost_focus();
        }

        if let Some(EntityRef::Swimlane(_)) = single {
            ui.horizontal(|ui| {
                ui.label("Angle");
                let resp = ui.add(
                    egui::DragValue::new(&mut self.drafts.angle)
                        .range(0.0..=360.0)
                        .speed(0.5)
                        .suffix("°"),
                );
                editing |= resp.dragged() || resp.has_focus();
                commits.angle = resp.drag_stopped() || resp.lost_focus();
            });
            ui.horizontal(|ui| {
                ui.label("Length");
                let resp = ui.add(
                    egui::DragValue::new(&mut self.drafts.length)
                        .range(0.0..=f64::MAX)
                        .speed(1.0),
                );
                editing |= resp.dragged() || resp.has_focus();
                commits.length = resp.drag_stopped() || resp.lost_focus();
            });
            if ui.button("Add outcome").clicked() {
                self.add_outcome_to_selection();
            }
        }

        if let Some(mut color) = self.selection_color() {
            ui.separator();
            ui.label("Color");
            if color_row(ui, &mut color) {
                commits.color = Some(color);
            }
        }

        if !self.session.selection().is_empty() {
            ui.separator();
            if ui.button("Delete").clicked() {
                self.delete_selected();
            }
        }

        ui.add_space(12.0);
        ui.heading("Diagram");
        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Center");
            for axis in 0..2 {
                let resp = ui.add(egui::DragValue::new(&mut self.drafts.center[axis]).speed(1.0));
                editing |= resp.dragged() || resp.has_focus();
                commits.center |= resp.drag_stopped() || resp.lost_focus();
            }
        });
        ui.horizontal(|ui| {
            ui.add(
                egui::DragValue::new(&mut self.drafts.new_swimlane_angle)
                    .range(0.0..=360.0)
                    .suffix("°"),
            );
            if ui.button("Add swimlane").clicked() {
                self.add_swimlane();
            }
        });
        let has_lanes = self.session.diagram().swimlanes().next().is_some();
        if ui
            .add_enabled(has_lanes, egui::Button::new("Draw scope blob (B)"))
            .clicked()
        {
            self.start_blob_tool();
        }

        ui.add_space(12.0);
        ui.heading("Editor");
        ui.separator();
        let mut shape = self.session.config().blob_shape;
        ui.horizontal(|ui| {
            ui.label("Blob shape");
            ui.selectable_value(&mut shape, BlobShape::Freehand, "Freehand");
            ui.selectable_value(&mut shape, BlobShape::Sector, "Sector");
        });
        if shape != self.session.config().blob_shape {
            self.update_config(|config| config.blob_shape = shape);
        }
        if ui.checkbox(&mut self.show_labels, "Show labels").changed() {
            self.persist_settings();
        }

        ui.add_space(12.0);
        ui.heading("History");
        ui.separator();
        let history = self.session.history();
        ui.label(format!(
            "Undo: {}",
            history.undo_label().unwrap_or_else(|| "-".to_string())
        ));
        ui.label(format!(
            "Redo: {}",
            history.redo_label().unwrap_or_else(|| "-".to_string())
        ));

        self.drafts.editing = editing;
        commits
    }

    fn apply_commits(&mut self, commits: PanelCommits) {
        if commits.center {
            let center = Point::new(self.drafts.center[0], self.drafts.center[1]);
            if center != self.session.diagram().center() {
                let result = self.session.set_center(center);
                self.report("Move center", result);
            }
        }
        if let Some(color) = commits.color {
            self.recolor_selected(color);
        }
        let Some(entity) = self.single_selection() else {
            return;
        };
        if commits.label {
            self.rename_selected();
        }
        if let EntityRef::Swimlane(id) = entity
            && let Some(lane) = self.session.diagram().swimlane(id)
        {
            let (angle, length) = (lane.angle, lane.length);
            if commits.angle && self.drafts.angle != angle {
                let result = self.session.set_swimlane_angle(id, self.drafts.angle);
                self.report("Rotate swimlane", result);
            }
            if commits.length && self.drafts.length != length {
                let result = self.session.set_swimlane_length(id, self.drafts.length);
                self.report("Resize swimlane", result);
            }
        }
    }

    fn label_prompt(&mut self, ctx: &egui::Context) {
        if !matches!(self.session.mode(), Mode::PendingLabel(_)) {
            return;
        }
        let mut confirm = false;
        let mut cancel = false;
        egui::Window::new("Name scope blob")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_TOP, [0.0, 64.0])
            .show(ctx, |ui| {
                let resp = ui.add(
                    egui::TextEdit::singleline(&mut self.drafts.pending_blob_label)
                        .hint_text("Label (optional)"),
                );
                resp.request_focus();
                if resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    confirm = true;
                }
                if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    cancel = true;
                }
                ui.horizontal(|ui| {
                    confirm |= ui.button("OK").clicked();
                    cancel |= ui.button("Cancel").clicked();
                });
            });
        if confirm {
            self.confirm_pending_blob();
        } else if cancel {
            self.drafts.pending_blob_label.clear();
            self.session.cancel();
            self.status = None;
        }
    }
}

impl eframe::App for DiagramApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let wants_keyboard = ctx.wants_keyboard_input();
        ctx.input_mut(|i| {
            if !self.command_palette.open
                && i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::P)
            {
                self.command_palette.open("");
            }
            if i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::S) {
                self.save_json_dialog();
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::S) {
                self.save_to_path();
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::O) {
                self.open_json_dialog();
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::F1) {
                self.show_help = true;
            }
            let skip_shortcuts = wants_keyboard || self.command_palette.open;
            if !skip_shortcuts {
                if i.consume_key(
                    egui::Modifiers::COMMAND | egui::Modifiers::SHIFT,
                    egui::Key::Z,
                ) || i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y)
                {
                    self.redo();
                } else if i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z) {
                    self.undo();
                }
                if i.consume_key(egui::Modifiers::NONE, egui::Key::Escape) {
                    self.key(Key::Escape);
                    self.status = None;
                }
                if i.consume_key(egui::Modifiers::NONE, egui::Key::Delete) {
                    self.key(Key::Delete);
                }
                if i.consume_key(egui::Modifiers::NONE, egui::Key::Backspace) {
                    self.key(Key::Backspace);
                }
                if i.consume_key(egui::Modifiers::COMMAND, egui::Key::A) {
                    self.session.select_all();
                }
                if i.consume_key(egui::Modifiers::NONE, egui::Key::B) {
                    self.start_blob_tool();
                }
            }
        });

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New").clicked() {
                        self.new_document();
                        ui.close_menu();
                    }
                    if ui.button("Open... (⌘O)").clicked() {
                        self.open_json_dialog();
                        ui.close_menu();
                    }
                    if ui.button("Save (⌘S)").clicked() {
                        self.save_to_path();
                        ui.close_menu();
                    }
                    if ui.button("Save As... (⌘⇧S)").clicked() {
                        self.save_json_dialog();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Edit", |ui| {
                    let history = self.session.history();
                    let undo_text = match history.undo_label() {
                        Some(label) => format!("Undo {label} (⌘Z)"),
                        None => "Undo (⌘Z)".to_string(),
                    };
                    let redo_text = match history.redo_label() {
                        Some(label) => format!("Redo {label} (⌘⇧Z)"),
                        None => "Redo (⌘⇧Z)".to_string(),
                    };
                    let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
                    if ui.add_enabled(can_undo, egui::Button::new(undo_text)).clicked() {
                        self.undo();
                        ui.close_menu();
                    }
                    if ui.add_enabled(can_redo, egui::Button::new(redo_text)).clicked() {
                        self.redo();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Select all (⌘A)").clicked() {
                        self.session.select_all();
                        ui.close_menu();
                    }
                    let any = !self.session.selection().is_empty();
                    if ui.add_enabled(any, egui::Button::new("Delete")).clicked() {
                        self.delete_selected();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Insert", |ui| {
                    if ui.button("Swimlane").clicked() {
                        self.add_swimlane();
                        ui.close_menu();
                    }
                    if ui.button("Outcome on selected swimlane").clicked() {
                        self.add_outcome_to_selection();
                        ui.close_menu();
                    }
                    if ui.button("Scope blob (B)").clicked() {
                        self.start_blob_tool();
                        ui.close_menu();
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("Shortcuts (F1)").clicked() {
                        self.show_help = true;
                        ui.close_menu();
                    }
                    if ui.button("Command palette (⌘⇧P)").clicked() {
                        self.command_palette.open("");
                        ui.close_menu();
                    }
                });
            });
        });

        let single = self.single_selection();
        self.sync_drafts(single);
        let commits = egui::SidePanel::right("right_panel")
            .resizable(true)
            .min_width(200.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .show(ui, |ui| self.properties_ui(ui))
                    .inner
            })
            .inner;
        self.apply_commits(commits);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                } else {
                    ui.label("Ready");
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Zoom: {:.0}%", self.view.zoom * 100.0));
                    ui.separator();
                    ui.label(format!("Selected: {}", self.session.selection().len()));
                    ui.separator();
                    ui.label(format!("Mode: {}", self.session.mode().name()));
                    ui.separator();
                    let name = self
                        .session
                        .path()
                        .map_or_else(|| "untitled".to_string(), |p| p.display().to_string());
                    let dirty = if self.session.is_dirty() { "*" } else { "" };
                    ui.label(format!("{name}{dirty}"));
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (rect, response) =
                ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
            let origin = rect.center();

            let scroll_delta = ctx.input(|i| i.raw_scroll_delta.y);
            if scroll_delta.abs() > 0.0
                && let Some(hover_pos) = ctx.input(|i| i.pointer.hover_pos())
                && rect.contains(hover_pos)
            {
                let zoom_delta = (1.0 + scroll_delta * 0.001).clamp(0.8, 1.25);
                self.view.zoom_about_screen_point(origin, hover_pos, zoom_delta);
            }
            if response.dragged_by(egui::PointerButton::Middle) {
                self.view.pan_screen += response.drag_delta();
            }

            let (down, up, moved, shift) = ctx.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.primary_released(),
                    i.pointer.delta() != egui::Vec2::ZERO,
                    i.modifiers.shift,
                )
            });
            let modifiers = if shift { Modifiers::SHIFT } else { Modifiers::NONE };
            if let Some(pos) = ctx.input(|i| i.pointer.interact_pos()) {
                let world = screen_to_point(origin, &self.view, pos);
                if down && response.hovered() {
                    self.pressed = true;
                    let result = self.session.on_pointer_down(world, modifiers);
                    self.report("Edit", result);
                } else if self.pressed && up {
                    self.pressed = false;
                    let result = self.session.on_pointer_up(world, modifiers);
                    self.report("Edit", result);
                } else if self.pressed && moved {
                    let result = self.session.on_pointer_move(world, modifiers);
                    self.report("Edit", result);
                }
            }

            let painter = ui.painter_at(rect);
            draw_background(&painter, rect, origin, &self.view, &self.session);
            draw_diagram(&painter, origin, &self.view, &self.session, self.show_labels);
            draw_gesture(&painter, origin, &self.view, &self.session);
        });

        self.label_prompt(ctx);

        let cx = CommandContext {
            selected_len: self.session.selection().len(),
            swimlane_selected: self
                .session
                .selection()
                .iter()
                .any(|e| matches!(e, EntityRef::Swimlane(_))),
            has_undo: self.session.history().can_undo(),
            has_redo: self.session.history().can_redo(),
            has_swimlanes: self.session.diagram().swimlanes().next().is_some(),
        };
        if let Some(cmd) = self.command_palette.ui(ctx, cx) {
            super::command_palette::CommandPalette::execute(self, ctx, cmd);
        }

        super::help::draw_help_window(ctx, &mut self.show_help);
    }
}
