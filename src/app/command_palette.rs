use eframe::egui;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::DiagramApp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CommandId {
    AddSwimlane,
    AddOutcome,
    DrawBlob,
    ToggleBlobShape,
    Undo,
    Redo,
    Delete,
    SelectAll,
    ClearSelection,
    ToggleLabels,
    ResetView,
    NewDiagram,
    SaveJson,
    SaveJsonAs,
    LoadJson,
    Help,
}

pub(super) struct CommandSpec {
    pub id: CommandId,
    pub name: &'static str,
    pub search: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec { id: CommandId::AddSwimlane, name: "Insert: Swimlane", search: "add insert swimlane lane ray" },
    CommandSpec { id: CommandId::AddOutcome, name: "Insert: Outcome", search: "add insert outcome point" },
    CommandSpec { id: CommandId::DrawBlob, name: "Insert: Scope blob", search: "draw blob scope shape b" },
    CommandSpec { id: CommandId::ToggleBlobShape, name: "Blob: Toggle freehand/sector", search: "blob shape sector freehand toggle" },
    CommandSpec { id: CommandId::Undo, name: "Edit: Undo", search: "undo" },
    CommandSpec { id: CommandId::Redo, name: "Edit: Redo", search: "redo" },
    CommandSpec { id: CommandId::Delete, name: "Edit: Delete", search: "delete remove" },
    CommandSpec { id: CommandId::SelectAll, name: "Select: All", search: "select all" },
    CommandSpec { id: CommandId::ClearSelection, name: "Select: None", search: "select none clear deselect" },
    CommandSpec { id: CommandId::ToggleLabels, name: "View: Toggle labels", search: "labels text show hide view" },
    CommandSpec { id: CommandId::ResetView, name: "View: Reset zoom", search: "reset view zoom pan" },
    CommandSpec { id: CommandId::NewDiagram, name: "File: New", search: "new file diagram" },
    CommandSpec { id: CommandId::SaveJson, name: "File: Save", search: "save file json" },
    CommandSpec { id: CommandId::SaveJsonAs, name: "File: Save As", search: "save as file json" },
    CommandSpec { id: CommandId::LoadJson, name: "File: Open", search: "load open file json" },
    CommandSpec { id: CommandId::Help, name: "Help: Shortcuts", search: "help shortcuts keys" },
];

#[derive(Default)]
pub(super) struct CommandPalette {
    pub open: bool,
    pub query: String,
    pub selected: usize,
    request_focus: bool,
}

#[derive(Clone, Copy)]
pub(super) struct CommandContext {
    pub selected_len: usize,
    pub swimlane_selected: bool,
    pub has_undo: bool,
    pub has_redo: bool,
    pub has_swimlanes: bool,
}

impl CommandPalette {
    pub fn open(&mut self, query: impl Into<String>) {
        self.open = true;
        self.query = query.into();
        self.selected = 0;
        self.request_focus = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.selected = 0;
        self.request_focus = false;
    }

    fn is_enabled(cx: CommandContext, id: CommandId) -> bool {
        match id {
            CommandId::Undo => cx.has_undo,
            CommandId::Redo => cx.has_redo,
            CommandId::Delete | CommandId::ClearSelection => cx.selected_len > 0,
            CommandId::AddOutcome => cx.swimlane_selected,
            CommandId::DrawBlob => cx.has_swimlanes,
            _ => true,
        }
    }

    pub(super) fn execute(app: &mut DiagramApp, ctx: &egui::Context, id: CommandId) {
        match id {
            CommandId::AddSwimlane => app.add_swimlane(),
            CommandId::AddOutcome => app.add_outcome_to_selection(),
            CommandId::DrawBlob => app.start_blob_tool(),
            CommandId::ToggleBlobShape => app.toggle_blob_shape(),
            CommandId::Undo => app.undo(),
            CommandId::Redo => app.redo(),
            CommandId::Delete => app.delete_selected(),
            CommandId::SelectAll => app.session.select_all(),
            CommandId::ClearSelection => app.session.clear_selection(),
            CommandId::ToggleLabels => app.toggle_labels(),
            CommandId::ResetView => app.view = super::View::default(),
            CommandId::NewDiagram => app.new_document(),
            CommandId::SaveJson => app.save_to_path(),
            CommandId::SaveJsonAs => app.save_json_dialog(),
            CommandId::LoadJson => app.open_json_dialog(),
            CommandId::Help => app.show_help = true,
        }
        ctx.request_repaint();
    }

    fn filtered(&self) -> Vec<(&'static CommandSpec, i64)> {
        let matcher = SkimMatcherV2::default();
        let q = self.query.trim();
        if q.is_empty() {
            return COMMANDS.iter().map(|c| (c, 0)).collect();
        }
        let mut out = Vec::new();
        for c in COMMANDS {
            if let Some(score) = matcher.fuzzy_match(c.search, q) {
                out.push((c, score));
            }
        }
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(b.0.name)));
        out
    }

    pub fn ui(&mut self, ctx: &egui::Context, cx: CommandContext) -> Option<CommandId> {
        if !self.open {
            return None;
        }
        let matches = self.filtered();
        if self.selected >= matches.len() {
            self.selected = matches.len().saturating_sub(1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.close();
            return None;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowDown)) && !matches.is_empty() {
            self.selected = (self.selected + 1).min(matches.len() - 1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowUp)) && !matches.is_empty() {
            self.selected = self.selected.saturating_sub(1);
        }
        let mut run_selected = ctx.input(|i| i.key_pressed(egui::Key::Enter));

        let screen = ctx.content_rect();
        let width = 480.0;
        let height = 280.0;
        let pos = egui::pos2(screen.center().x - width * 0.5, screen.top() + 48.0);
        egui::Area::new(egui::Id::new("command_palette"))
            .fixed_pos(pos)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let frame = egui::Frame::new()
                    .fill(egui::Color32::from_rgba_unmultiplied(20, 20, 20, 240))
                    .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(90, 160, 255)))
                    .inner_margin(10.0)
                    .corner_radius(egui::CornerRadius::same(8));
                frame.show(ui, |ui| {
                    ui.set_min_size(egui::vec2(width, height));
                    let resp = ui.add(
                        egui::TextEdit::singleline(&mut self.query)
                            .desired_width(f32::INFINITY)
                            .hint_text("Search commands"),
                    );
                    if self.request_focus {
                        resp.request_focus();
                        self.request_focus = false;
                    }
                    ui.separator();
                    egui::ScrollArea::vertical().max_height(height - 64.0).show(ui, |ui| {
                        for (idx, (spec, _score)) in matches.iter().enumerate() {
                            let enabled = CommandPalette::is_enabled(cx, spec.id);
                            let resp = ui.add_enabled(
                                enabled,
                                egui::Button::new(spec.name).selected(idx == self.selected),
                            );
                            if resp.clicked() {
                                self.selected = idx;
                                run_selected = true;
                            }
                        }
                    });
                });
            });

        if run_selected
            && let Some((spec, _)) = matches.get(self.selected)
            && CommandPalette::is_enabled(cx, spec.id)
        {
            let cmd = spec.id;
            self.close();
            return Some(cmd);
        }
        None
    }
}
