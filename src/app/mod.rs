use eframe::egui;
use radscope::{Config, EntityRef, Session};

mod actions;
mod command_palette;
mod geometry;
mod help;
mod render;
mod settings;
mod update;

#[derive(Clone, Copy, Debug)]
struct View {
    pan_screen: egui::Vec2,
    zoom: f32,
}

impl Default for View {
    fn default() -> Self {
        Self {
            pan_screen: egui::Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl View {
    fn world_to_screen(&self, origin: egui::Pos2, world: egui::Pos2) -> egui::Pos2 {
        origin + self.pan_screen + world.to_vec2() * self.zoom
    }

    fn screen_to_world(&self, origin: egui::Pos2, screen: egui::Pos2) -> egui::Pos2 {
        ((screen - origin - self.pan_screen) / self.zoom).to_pos2()
    }

    fn zoom_about_screen_point(
        &mut self,
        origin: egui::Pos2,
        screen_point: egui::Pos2,
        zoom_delta: f32,
    ) {
        let before = self.screen_to_world(origin, screen_point);
        self.zoom = (self.zoom * zoom_delta).clamp(0.1, 8.0);
        let after_screen = self.world_to_screen(origin, before);
        self.pan_screen += screen_point - after_screen;
    }
}

/// Values being edited in the properties panel. They follow the model
/// until a widget is active and are committed as one command on release.
#[derive(Default)]
struct PanelDrafts {
    target: Option<EntityRef>,
    editing: bool,
    label: String,
    angle: f64,
    length: f64,
    center: [f64; 2],
    pending_blob_label: String,
    new_swimlane_angle: f64,
}

pub struct DiagramApp {
    session: Session,
    view: View,
    file_path: String,
    settings_path: String,
    status: Option<String>,
    show_labels: bool,
    drafts: PanelDrafts,
    pressed: bool,
    command_palette: command_palette::CommandPalette,
    show_help: bool,
}

impl DiagramApp {
    fn config_path() -> Option<String> {
        if let Some(home) = std::env::var_os("HOME") {
            let path = std::path::PathBuf::from(home).join(".config").join("radscope.toml");
            if path.exists() {
                return Some(path.display().to_string());
            }
        }
        if std::path::Path::new("settings.toml").exists() {
            return Some("settings.toml".to_string());
        }
        None
    }

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings_path = Self::config_path().unwrap_or_else(|| "settings.toml".to_string());
        let settings = settings::load_settings(&settings_path)
            .or_else(|| settings::load_settings("settings.json"))
            .unwrap_or_default();

        Self {
            session: Session::new(settings.editor),
            view: View::default(),
            file_path: settings.file_path,
            settings_path,
            status: None,
            show_labels: settings.show_labels,
            drafts: PanelDrafts::default(),
            pressed: false,
            command_palette: command_palette::CommandPalette::default(),
            show_help: false,
        }
    }

    fn current_settings(&self) -> settings::AppSettings {
        settings::AppSettings {
            file_path: self.file_path.clone(),
            show_labels: self.show_labels,
            editor: self.session.config().clone(),
        }
    }

    pub(super) fn persist_settings(&mut self) {
        if let Err(e) = settings::save_settings(&self.settings_path, &self.current_settings()) {
            self.status = Some(format!("Settings save failed: {e}"));
        }
    }

    pub(super) fn update_config(&mut self, edit: impl FnOnce(&mut Config)) {
        let mut config = self.session.config().clone();
        edit(&mut config);
        self.session.set_config(config);
        self.persist_settings();
    }
}
