use eframe::egui;

pub(super) fn draw_help_window(ctx: &egui::Context, open: &mut bool) {
    egui::Window::new("Help & Commands")
        .open(open)
        .resizable(true)
        .default_width(520.0)
        .default_height(420.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Keyboard Shortcuts");
                ui.separator();

                ui.label("General");
                help_row(ui, "⌘⇧P", "Open command palette");
                help_row(ui, "⌘S", "Save diagram (JSON)");
                help_row(ui, "⌘O", "Open diagram");
                help_row(ui, "⌘Z", "Undo");
                help_row(ui, "⌘⇧Z / ⌘Y", "Redo");
                help_row(ui, "Escape", "Cancel the current gesture");

                ui.add_space(10.0);
                ui.label("Editing");
                help_row(ui, "Delete / Backspace", "Delete selected");
                help_row(ui, "⌘A", "Select everything");
                help_row(ui, "Shift + click", "Add to or remove from the selection");
                help_row(ui, "Drag on empty canvas", "Rubber-band selection");
                help_row(ui, "B", "Draw a scope blob");
                help_row(ui, "Enter", "Confirm the blob label");
                help_row(ui, "Scroll wheel", "Zoom in/out");

                ui.add_space(20.0);
                ui.heading("Dragging");
                ui.separator();
                ui.label("• Outcomes slide along their swimlane and jump to the nearest one");
                ui.label("• Drag a swimlane's line to rotate it, or its tip to change its length");
                ui.label("• Drag a scope blob to move it; its outcome links are recomputed");
                ui.label("• A whole drag is a single undo step");

                ui.add_space(20.0);
                ui.heading("Settings");
                ui.separator();
                ui.label("Editor tolerances live in the [editor] table of settings.toml:");
                ui.add_space(5.0);
                ui.code(r##"[editor]
snap_tolerance_degrees = 180.0
hit_tolerance = 6.0
outcome_radius = 10.0
blob_shape = "sector""##);
            });
        });
}

fn help_row(ui: &mut egui::Ui, shortcut: &str, description: &str) {
    ui.horizontal(|ui| {
        ui.add_sized([160.0, 18.0], egui::Label::new(egui::RichText::new(shortcut).monospace()));
        ui.label(description);
    });
}
