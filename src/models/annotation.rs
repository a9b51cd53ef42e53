// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the geometric building blocks of an annotation
//! pass: vertices in a pixel coordinate space, polygons made of those
//! vertices, and the dimensions of the spaces they live in.

use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates (display or source space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another vertex.
    pub fn distance_to(&self, other: &Vertex) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An ordered vertex sequence.
///
/// The closing edge from the last vertex back to the first is implicit;
/// auto-closed polygons additionally repeat the anchor as their last vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    vertices: Vec<Vertex>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Flatten into `[x0, y0, x1, y1, ...]`.
    pub fn flatten(&self) -> Vec<f64> {
        self.vertices.iter().flat_map(|v| [v.x, v.y]).collect()
    }
}

/// Width and height of a rectangular pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Dimensions of a raster of `width` x `height` pixels.
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// Both sides are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Largest size with this aspect ratio that fits inside `bounds`.
    pub fn fit_within(&self, bounds: Dimensions) -> Dimensions {
        if self.aspect_ratio() > bounds.aspect_ratio() {
            // Wider than the bounds - fit to width
            Dimensions::new(bounds.width, bounds.width / self.aspect_ratio())
        } else {
            // Taller than the bounds - fit to height
            Dimensions::new(bounds.height * self.aspect_ratio(), bounds.height)
        }
    }
}
