// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Polygon export.
//!
//! This module rescales committed polygons into source-video pixel space
//! and writes them as a list of flat `[x0, y0, x1, y1, ...]` arrays in
//! JSON or YAML format.

use crate::models::session::AnnotationSession;
use crate::util::geometry::{CoordinateScaler, ScaleError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Suggested file name for exports.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "polygon_points_scaled.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error("unsupported export format: {0:?}")]
    UnsupportedFormat(Option<String>),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Polygons in source space, one flat coordinate list per polygon in commit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaledExport(pub Vec<Vec<f64>>);

impl ScaledExport {
    pub fn polygon_count(&self) -> usize {
        self.0.len()
    }
}

/// Rescale every committed polygon of `session` into source space.
///
/// Reads the session only; nothing is written anywhere.
pub fn export_polygons(session: &AnnotationSession) -> Result<ScaledExport, ExportError> {
    let scaler = CoordinateScaler::display_to_source(session.display_size(), session.source_size())?;
    Ok(ScaledExport(
        session
            .committed_polygons()
            .iter()
            .map(|polygon| scaler.scale_polygon(polygon).flatten())
            .collect(),
    ))
}

/// Pretty-printed JSON document.
pub fn to_json(export: &ScaledExport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(export)?)
}

/// YAML document.
pub fn to_yaml(export: &ScaledExport) -> Result<String, ExportError> {
    Ok(serde_yaml::to_string(export)?)
}

/// Write the export to `path`, choosing the format from its extension.
pub fn write_export(export: &ScaledExport, path: &Path) -> Result<(), ExportError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);
    let document = match extension.as_deref() {
        Some("json") => to_json(export)?,
        Some("yaml") | Some("yml") => to_yaml(export)?,
        _ => return Err(ExportError::UnsupportedFormat(extension)),
    };
    std::fs::write(path, document)?;
    Ok(())
}
