// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides the coordinate transformation between the display
//! space the user annotates in and the native pixel space of the source video.

use crate::models::annotation::{Dimensions, Polygon, Vertex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error("invalid {space} dimensions {width}x{height}")]
    InvalidDimensions {
        space: &'static str,
        width: f64,
        height: f64,
    },
}

/// Per-axis linear mapping from one rectangular space to another.
///
/// Axes scale independently: when the two aspect ratios differ the mapping
/// is non-uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateScaler {
    from: Dimensions,
    to: Dimensions,
}

impl CoordinateScaler {
    pub fn new(from: Dimensions, to: Dimensions) -> Result<Self, ScaleError> {
        check("from", from)?;
        check("to", to)?;
        Ok(Self { from, to })
    }

    /// Scaler mapping display-space vertices into source-video space.
    pub fn display_to_source(display: Dimensions, source: Dimensions) -> Result<Self, ScaleError> {
        Self::new(display, source)
    }

    /// The reverse mapping.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    pub fn scale_x(&self) -> f64 {
        self.to.width / self.from.width
    }

    pub fn scale_y(&self) -> f64 {
        self.to.height / self.from.height
    }

    pub fn scale(&self, vertex: Vertex) -> Vertex {
        Vertex::new(vertex.x * self.scale_x(), vertex.y * self.scale_y())
    }

    pub fn scale_polygon(&self, polygon: &Polygon) -> Polygon {
        Polygon::new(polygon.vertices().iter().map(|v| self.scale(*v)).collect())
    }
}

fn check(space: &'static str, dims: Dimensions) -> Result<(), ScaleError> {
    if dims.is_valid() {
        Ok(())
    } else {
        Err(ScaleError::InvalidDimensions {
            space,
            width: dims.width,
            height: dims.height,
        })
    }
}
