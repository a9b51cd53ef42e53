// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar with source input and drawing controls.
//!
//! This module provides the remote URL field and the buttons that drive
//! the annotation session: start, finish, cancel, clear and export.

use crate::models::session::AnnotationSession;

/// Result of toolbar interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarAction {
    None,
    LoadUrl(String),
    CaptureFrame,
    /// Capture the frame at this many seconds into the video.
    CaptureAt(f64),
    StartDrawing,
    FinishPolygon,
    CancelDrawing,
    ClearPolygons,
    Export,
}

/// Display the toolbar.
pub fn show(
    ui: &mut egui::Ui,
    url_input: &mut String,
    position_secs: &mut f64,
    session: Option<&AnnotationSession>,
    has_source: bool,
    capture_busy: bool,
) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.label("Video URL:");
        let field = ui.add(
            egui::TextEdit::singleline(url_input)
                .hint_text("https://example.com/clip.mp4")
                .desired_width(360.0),
        );
        let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if ui.button("Load").clicked() || submitted {
            action = ToolbarAction::LoadUrl(url_input.clone());
        }

        ui.separator();

        let can_capture = !capture_busy && has_source;
        if ui
            .add_enabled(can_capture, egui::Button::new("Capture Frame"))
            .on_hover_text("Grab the next frame")
            .clicked()
        {
            action = ToolbarAction::CaptureFrame;
        }

        ui.add(egui::DragValue::new(position_secs).speed(0.1).suffix(" s"));
        *position_secs = position_secs.max(0.0);
        if ui
            .add_enabled(can_capture, egui::Button::new("Capture At"))
            .on_hover_text("Seek to this time and grab that frame")
            .clicked()
        {
            action = ToolbarAction::CaptureAt(*position_secs);
        }
        if capture_busy {
            ui.spinner();
        }
    });

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        let has_session = session.is_some();
        let drawing = session.map(AnnotationSession::is_drawing).unwrap_or(false);
        let can_finish = session.map(AnnotationSession::can_finish).unwrap_or(false);
        let has_polygons = session
            .map(|s| !s.committed_polygons().is_empty())
            .unwrap_or(false);

        let start_label = if drawing { "✏ Drawing..." } else { "▱ Start Polygon" };
        if ui
            .add_enabled(has_session && !drawing, egui::Button::new(start_label))
            .clicked()
        {
            action = ToolbarAction::StartDrawing;
        }

        if ui
            .add_enabled(can_finish, egui::Button::new("✔ Finish Polygon (Enter)"))
            .clicked()
        {
            action = ToolbarAction::FinishPolygon;
        }

        if ui
            .add_enabled(drawing, egui::Button::new("✖ Cancel (Esc)"))
            .clicked()
        {
            action = ToolbarAction::CancelDrawing;
        }

        ui.separator();

        if ui
            .add_enabled(has_polygons, egui::Button::new("Clear Polygons"))
            .clicked()
        {
            action = ToolbarAction::ClearPolygons;
        }

        if ui
            .add_enabled(has_polygons, egui::Button::new("Export..."))
            .clicked()
        {
            action = ToolbarAction::Export;
        }

        ui.separator();

        let hint = if drawing {
            "Click to add vertices, click near the first vertex to close"
        } else {
            "Start a polygon, then click on the frame"
        };
        ui.label(egui::RichText::new(hint).italics().weak());
    });

    action
}
