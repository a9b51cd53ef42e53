// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Polygon list and export preview panel.
//!
//! This module lists committed polygons with their vertex counts and shows
//! the document an export would currently produce.

use crate::io::serialization::{export_polygons, to_json};
use crate::models::session::AnnotationSession;

/// Display the properties panel.
pub fn show(ui: &mut egui::Ui, session: Option<&AnnotationSession>) {
    ui.heading("Polygons");
    ui.separator();

    let Some(session) = session else {
        ui.label(egui::RichText::new("No frame captured").weak());
        return;
    };

    if session.committed_polygons().is_empty() {
        ui.label(egui::RichText::new("No polygons yet").weak());
    }
    for (idx, polygon) in session.committed_polygons().iter().enumerate() {
        ui.label(format!("Polygon {} ({} vertices)", idx + 1, polygon.vertex_count()));
    }

    ui.add_space(10.0);
    ui.heading("Export preview");
    ui.separator();

    let preview = export_polygons(session).and_then(|export| to_json(&export));
    egui::ScrollArea::vertical().show(ui, |ui| match preview {
        Ok(json) => {
            ui.monospace(json);
        }
        Err(e) => {
            ui.colored_label(egui::Color32::LIGHT_RED, e.to_string());
        }
    });
}
