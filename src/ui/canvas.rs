// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing canvas for the captured frame and its polygon overlays.
//!
//! This module shows the captured frame fitted to the available space,
//! paints the session's overlays through an egui-backed [`RenderPort`],
//! and reports pointer input in canvas-local (display space) coordinates.

use super::render::{render_session, OverlayStyle, RenderPort};
use crate::models::annotation::{Dimensions, Vertex};
use crate::models::session::{AnnotationSession, Mode};
use crate::util::geometry::CoordinateScaler;

/// Display sizes closer than this (in points) count as unchanged.
const RESIZE_TOLERANCE: f64 = 0.5;

/// Result of canvas interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasAction {
    PointerDown(Vertex),
    PointerUp,
    /// The fitted frame now occupies a different size.
    Resized(Dimensions),
}

/// Everything the canvas reports for one frame.
#[derive(Debug, Default)]
pub struct CanvasOutput {
    pub actions: Vec<CanvasAction>,
    /// Space available for the frame, when a frame is shown.
    pub bounds: Option<Dimensions>,
}

/// Whether the session's display size is out of date for the fitted frame.
fn needs_resize(current: Dimensions, fitted: Dimensions) -> bool {
    (current.width - fitted.width).abs() > RESIZE_TOLERANCE
        || (current.height - fitted.height).abs() > RESIZE_TOLERANCE
}

/// Mapping from the frame as laid out on screen to the session's display space.
///
/// The two differ for a frame when the layout moved but the session has not
/// been told yet, or by less than [`RESIZE_TOLERANCE`].
fn screen_to_display(fitted: Dimensions, current: Dimensions) -> Option<CoordinateScaler> {
    CoordinateScaler::new(fitted, current).ok()
}

/// [`RenderPort`] drawing onto an egui painter.
struct PainterPort<'a> {
    painter: &'a egui::Painter,
    origin: egui::Pos2,
    to_screen: CoordinateScaler,
    marker_radius: f32,
}

impl PainterPort<'_> {
    fn to_screen(&self, v: &Vertex) -> egui::Pos2 {
        let local = self.to_screen.scale(*v);
        self.origin + egui::vec2(local.x as f32, local.y as f32)
    }

    fn screen_points(&self, points: &[Vertex]) -> Vec<egui::Pos2> {
        points.iter().map(|p| self.to_screen(p)).collect()
    }
}

fn overlay_color(style: OverlayStyle) -> egui::Color32 {
    match style {
        OverlayStyle::Committed => egui::Color32::from_rgb(40, 110, 255),
        OverlayStyle::InProgress => egui::Color32::RED,
    }
}

impl RenderPort for PainterPort<'_> {
    fn draw_closed_polygon(&mut self, points: &[Vertex], style: OverlayStyle) {
        let stroke = egui::Stroke::new(2.0, overlay_color(style));
        self.painter
            .add(egui::Shape::closed_line(self.screen_points(points), stroke));
    }

    fn draw_open_polyline(&mut self, points: &[Vertex], style: OverlayStyle) {
        let stroke = egui::Stroke::new(2.0, overlay_color(style));
        self.painter
            .add(egui::Shape::line(self.screen_points(points), stroke));
    }

    fn draw_marker(&mut self, at: Vertex, style: OverlayStyle) {
        let center = self.to_screen(&at);
        self.painter
            .circle_filled(center, self.marker_radius, overlay_color(style));
        self.painter.circle_stroke(
            center,
            self.marker_radius,
            egui::Stroke::new(1.0, egui::Color32::BLACK),
        );
    }
}

/// Display the canvas and collect this frame's pointer input.
pub fn show(
    ui: &mut egui::Ui,
    session: Option<&AnnotationSession>,
    frame_texture: Option<&egui::TextureHandle>,
    marker_radius: f32,
) -> CanvasOutput {
    let mut output = CanvasOutput::default();
    ui.style_mut().visuals.extreme_bg_color = egui::Color32::from_gray(40);

    let available_size = ui.available_size() - egui::vec2(0.0, 24.0);

    egui::Frame::canvas(ui.style()).show(ui, |ui| {
        ui.set_min_size(available_size);

        let (Some(texture), Some(session)) = (frame_texture, session) else {
            show_welcome(ui);
            return;
        };

        let available = ui.available_size();
        let bounds = Dimensions::new(available.x as f64, available.y as f64);
        if !bounds.is_valid() {
            return;
        }
        output.bounds = Some(bounds);
        let fitted = session.source_size().fit_within(bounds);
        let current = session.display_size();
        let Some(to_display) = screen_to_display(fitted, current) else {
            return;
        };

        // Center the frame
        let display = egui::vec2(fitted.width as f32, fitted.height as f32);
        let image_rect = egui::Rect::from_min_size(
            ui.min_rect().min + (available - display) / 2.0,
            display,
        );

        if needs_resize(current, fitted) {
            output.actions.push(CanvasAction::Resized(fitted));
        }

        ui.painter().image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        let response = ui.allocate_rect(image_rect, egui::Sense::click());
        if response.hovered() {
            let (pressed, released, pos) = ui.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.primary_released(),
                    i.pointer.interact_pos(),
                )
            });
            if let (true, Some(pos)) = (pressed, pos) {
                if image_rect.contains(pos) {
                    let local = pos - image_rect.min;
                    let point = to_display.scale(Vertex::new(local.x as f64, local.y as f64));
                    output.actions.push(CanvasAction::PointerDown(point));
                }
            }
            if released {
                output.actions.push(CanvasAction::PointerUp);
            }
        }

        let mut port = PainterPort {
            painter: ui.painter(),
            origin: image_rect.min,
            to_screen: to_display.inverse(),
            marker_radius,
        };
        render_session(session, &mut port);
    });

    // Session status at the bottom
    ui.separator();
    ui.horizontal(|ui| match session {
        Some(session) => {
            let mode = match session.mode() {
                Mode::Idle => "Idle".to_string(),
                Mode::Drawing => format!("Drawing ({} vertices)", session.current_polygon().len()),
            };
            ui.label(mode);
            ui.separator();
            ui.label(format!("{} polygons", session.committed_polygons().len()));
            ui.separator();
            let source = session.source_size();
            ui.label(format!("Source {}x{}", source.width, source.height));
        }
        None => {
            ui.label("No frame captured");
        }
    });

    output
}

fn show_welcome(ui: &mut egui::Ui) {
    ui.centered_and_justified(|ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(20.0);
            ui.heading(
                egui::RichText::new("framemark")
                    .size(32.0)
                    .color(egui::Color32::from_gray(200)),
            );
            ui.add_space(20.0);
            ui.label(
                egui::RichText::new("Open a video or enter a URL to capture a frame")
                    .color(egui::Color32::from_gray(180)),
            );
            ui.add_space(10.0);
            ui.label(
                egui::RichText::new("File → Open Video...")
                    .weak()
                    .color(egui::Color32::from_gray(130)),
            );
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serialization::export_polygons;
    use crate::models::session::SessionPolicy;

    #[test]
    fn test_small_layout_changes_do_not_resize() {
        let current = Dimensions::new(800.0, 450.0);

        assert!(!needs_resize(current, Dimensions::new(800.3, 450.2)));
        assert!(needs_resize(current, Dimensions::new(801.0, 450.5)));
        assert!(needs_resize(current, Dimensions::new(640.0, 360.0)));
    }

    #[test]
    fn test_clicks_map_into_session_display_space() {
        // Layout drifted by less than the tolerance, so no resize is sent
        let fitted = Dimensions::new(800.4, 450.225);
        let current = Dimensions::new(800.0, 450.0);
        let to_display = screen_to_display(fitted, current).unwrap();

        let mut session = AnnotationSession::new(
            Dimensions::new(1920.0, 1080.0),
            current,
            SessionPolicy::default(),
        );
        session.start_drawing();
        for (x, y) in [(0.0, 0.0), (800.4, 0.0), (800.4, 450.225)] {
            session.add_vertex(to_display.scale(Vertex::new(x, y)));
        }
        session.end_drawing();

        // The on-screen frame corners land on the source frame corners
        let export = export_polygons(&session).unwrap();
        let expected = [0.0, 0.0, 1920.0, 0.0, 1920.0, 1080.0];
        for (got, want) in export.0[0].iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_overlay_follows_click_position() {
        let fitted = Dimensions::new(640.5, 360.0);
        let to_display = screen_to_display(fitted, Dimensions::new(640.0, 360.0)).unwrap();
        let on_screen = Vertex::new(320.25, 180.0);

        let back = to_display.inverse().scale(to_display.scale(on_screen));

        assert!((back.x - on_screen.x).abs() < 1e-9);
        assert!((back.y - on_screen.y).abs() < 1e-9);
    }

    #[test]
    fn test_no_mapping_for_empty_display() {
        assert!(screen_to_display(Dimensions::new(800.0, 450.0), Dimensions::new(0.0, 0.0)).is_none());
    }
}
