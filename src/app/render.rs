use eframe::egui;
use radscope::model::SEGMENT_COLORS;
use radscope::{EntityRef, Rect, Rgba, Session};

use super::View;
use super::geometry::{color32, point_to_screen, points_to_screen, rgba_from_color32};

const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(90, 160, 255);

pub(super) fn color_row(ui: &mut egui::Ui, rgba: &mut Rgba) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        for preset in SEGMENT_COLORS {
            let c = color32(preset);
            if ui
                .add_sized([18.0, 18.0], egui::Button::new("").fill(c))
                .clicked()
            {
                *rgba = rgba_from_color32(c).with_alpha(rgba.a);
                changed = true;
            }
        }
        let mut arr = [rgba.r, rgba.g, rgba.b, rgba.a];
        if ui.color_edit_button_srgba_unmultiplied(&mut arr).changed() {
            *rgba = Rgba {
                r: arr[0],
                g: arr[1],
                b: arr[2],
                a: arr[3],
            };
            changed = true;
        }
    });
    changed
}

/// Background with guide rings around the diagram center.
pub(super) fn draw_background(
    painter: &egui::Painter,
    rect: egui::Rect,
    origin: egui::Pos2,
    view: &View,
    session: &Session,
) {
    let bg = painter.ctx().style().visuals.extreme_bg_color;
    painter.rect_filled(rect, 0.0, bg);
    let ring_color = egui::Color32::from_gray(45);
    let spacing_world = 50.0;
    let spacing_screen = spacing_world * view.zoom;
    if spacing_screen < 12.0 {
        return;
    }
    let center = point_to_screen(origin, view, session.diagram().center());
    let reach = [rect.left_top(), rect.right_top(), rect.left_bottom(), rect.right_bottom()]
        .into_iter()
        .map(|corner| corner.distance(center))
        .fold(0.0, f32::max);
    let mut r = spacing_screen;
    while r < reach {
        painter.circle_stroke(center, r, egui::Stroke::new(1.0, ring_color));
        r += spacing_screen;
    }
}

pub(super) fn draw_diagram(
    painter: &egui::Painter,
    origin: egui::Pos2,
    view: &View,
    session: &Session,
    show_labels: bool,
) {
    let diagram = session.diagram();
    let config = session.config();
    let text_color = painter.ctx().style().visuals.text_color();
    let font = egui::FontId::proportional(13.0);

    for blob in diagram.blobs() {
        let pts = points_to_screen(origin, view, &blob.points);
        let selected = session.is_selected(EntityRef::Blob(blob.id));
        let stroke = if selected {
            egui::Stroke::new(2.0, SELECTION_COLOR)
        } else {
            egui::Stroke::new(1.0, color32(blob.color.with_alpha(255)))
        };
        painter.add(egui::Shape::convex_polygon(
            pts.clone(),
            color32(blob.color),
            egui::Stroke::NONE,
        ));
        painter.add(egui::Shape::closed_line(pts.clone(), stroke));
        if show_labels
            && let Some(label) = &blob.label
            && let Some(top) = pts.iter().min_by(|a, b| a.y.total_cmp(&b.y))
        {
            painter.text(*top, egui::Align2::CENTER_BOTTOM, label, font.clone(), text_color);
        }
    }

    let center = point_to_screen(origin, view, diagram.center());
    for lane in diagram.swimlanes() {
        let Some(tip) = diagram.swimlane_tip(lane.id) else {
            continue;
        };
        let tip = point_to_screen(origin, view, tip);
        let selected = session.is_selected(EntityRef::Swimlane(lane.id));
        let width = if selected { 3.0 } else { 2.0 };
        painter.line_segment([center, tip], egui::Stroke::new(width, color32(lane.color)));
        let handle_r = config.handle_radius as f32 * view.zoom * 0.5;
        if selected {
            painter.circle_stroke(tip, handle_r, egui::Stroke::new(1.5, SELECTION_COLOR));
        }
        if show_labels && !lane.label.is_empty() {
            let dir = (tip - center).normalized();
            painter.text(
                tip + dir * (handle_r + 4.0),
                anchor_for(dir),
                &lane.label,
                font.clone(),
                text_color,
            );
        }
    }

    for outcome in diagram.outcomes() {
        let Some(pos) = diagram.outcome_position(outcome.id) else {
            continue;
        };
        let pos = point_to_screen(origin, view, pos);
        let fill = outcome
            .color
            .or_else(|| diagram.swimlane(outcome.swimlane_id).map(|l| l.color))
            .unwrap_or_default();
        let r = config.outcome_radius as f32 * view.zoom;
        painter.circle_filled(pos, r, color32(fill));
        if session.is_selected(EntityRef::Outcome(outcome.id)) {
            painter.circle_stroke(pos, r + 2.0, egui::Stroke::new(2.0, SELECTION_COLOR));
        }
        if show_labels && !outcome.label.is_empty() {
            painter.text(
                pos + egui::vec2(r + 4.0, 0.0),
                egui::Align2::LEFT_CENTER,
                &outcome.label,
                font.clone(),
                text_color,
            );
        }
    }

    let arm = 6.0;
    let s = egui::Stroke::new(1.5, text_color);
    painter.line_segment([center - egui::vec2(arm, 0.0), center + egui::vec2(arm, 0.0)], s);
    painter.line_segment([center - egui::vec2(0.0, arm), center + egui::vec2(0.0, arm)], s);
}

fn anchor_for(dir: egui::Vec2) -> egui::Align2 {
    let h = if dir.x > 0.3 {
        egui::Align::Min
    } else if dir.x < -0.3 {
        egui::Align::Max
    } else {
        egui::Align::Center
    };
    let v = if dir.y > 0.3 {
        egui::Align::Min
    } else if dir.y < -0.3 {
        egui::Align::Max
    } else {
        egui::Align::Center
    };
    egui::Align2([h, v])
}

/// The outline being drawn and the rubber band, on top of everything else.
pub(super) fn draw_gesture(painter: &egui::Painter, origin: egui::Pos2, view: &View, session: &Session) {
    if let Some(points) = session.draft_points()
        && points.len() >= 2
    {
        let pts = points_to_screen(origin, view, points);
        let stroke = egui::Stroke::new(1.5, SELECTION_COLOR);
        painter.add(egui::Shape::closed_line(pts, stroke));
    }
    if let Some(band) = session.rubber_band() {
        draw_band(painter, origin, view, band);
    }
}

fn draw_band(painter: &egui::Painter, origin: egui::Pos2, view: &View, band: Rect) {
    let r = egui::Rect::from_two_pos(
        point_to_screen(origin, view, band.min),
        point_to_screen(origin, view, band.max),
    );
    painter.rect_filled(r, 0.0, SELECTION_COLOR.gamma_multiply(0.1));
    painter.rect_stroke(r, 0.0, egui::Stroke::new(1.0, SELECTION_COLOR), egui::StrokeKind::Middle);
}
