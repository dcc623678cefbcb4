use eframe::egui;
use radscope::{Point, Rgba};

use super::View;

pub(super) fn to_pos2(p: Point) -> egui::Pos2 {
    egui::pos2(p.x as f32, p.y as f32)
}

pub(super) fn to_point(p: egui::Pos2) -> Point {
    Point::new(f64::from(p.x), f64::from(p.y))
}

pub(super) fn point_to_screen(origin: egui::Pos2, view: &View, p: Point) -> egui::Pos2 {
    view.world_to_screen(origin, to_pos2(p))
}

pub(super) fn screen_to_point(origin: egui::Pos2, view: &View, screen: egui::Pos2) -> Point {
    to_point(view.screen_to_world(origin, screen))
}

pub(super) fn points_to_screen(origin: egui::Pos2, view: &View, points: &[Point]) -> Vec<egui::Pos2> {
    points
        .iter()
        .map(|p| point_to_screen(origin, view, *p))
        .collect()
}

pub(super) fn color32(c: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

pub(super) fn rgba_from_color32(c: egui::Color32) -> Rgba {
    let [r, g, b, a] = c.to_srgba_unmultiplied();
    Rgba { r, g, b, a }
}

