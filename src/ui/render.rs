// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing contract between the session and a 2D surface.
//!
//! The session never draws anything itself. Each frame the current state is
//! walked by [`render_session`] and turned into calls on a [`RenderPort`],
//! all in display-space coordinates.

use crate::models::annotation::Vertex;
use crate::models::session::AnnotationSession;

/// Which overlay a marker or outline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayStyle {
    Committed,
    InProgress,
}

/// The drawing primitives a canvas must offer.
pub trait RenderPort {
    /// Outline including the edge from the last vertex back to the first.
    fn draw_closed_polygon(&mut self, points: &[Vertex], style: OverlayStyle);
    fn draw_open_polyline(&mut self, points: &[Vertex], style: OverlayStyle);
    fn draw_marker(&mut self, at: Vertex, style: OverlayStyle);
}

/// Draw committed polygons, then the polygon being drawn on top.
pub fn render_session<P: RenderPort + ?Sized>(session: &AnnotationSession, port: &mut P) {
    for polygon in session.committed_polygons() {
        port.draw_closed_polygon(polygon.vertices(), OverlayStyle::Committed);
        for vertex in polygon.vertices() {
            port.draw_marker(*vertex, OverlayStyle::Committed);
        }
    }

    let current = session.current_polygon();
    if current.is_empty() {
        return;
    }
    port.draw_open_polyline(current, OverlayStyle::InProgress);
    for vertex in current {
        port.draw_marker(*vertex, OverlayStyle::InProgress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::Dimensions;
    use crate::models::session::SessionPolicy;

    #[derive(Debug, PartialEq)]
    enum Call {
        Closed(usize, OverlayStyle),
        Open(usize, OverlayStyle),
        Marker(Vertex, OverlayStyle),
    }

    #[derive(Default)]
    struct RecordingPort {
        calls: Vec<Call>,
    }

    impl RenderPort for RecordingPort {
        fn draw_closed_polygon(&mut self, points: &[Vertex], style: OverlayStyle) {
            self.calls.push(Call::Closed(points.len(), style));
        }

        fn draw_open_polyline(&mut self, points: &[Vertex], style: OverlayStyle) {
            self.calls.push(Call::Open(points.len(), style));
        }

        fn draw_marker(&mut self, at: Vertex, style: OverlayStyle) {
            self.calls.push(Call::Marker(at, style));
        }
    }

    fn session() -> AnnotationSession {
        AnnotationSession::new(
            Dimensions::new(1920.0, 1080.0),
            Dimensions::new(800.0, 600.0),
            SessionPolicy::default(),
        )
    }

    #[test]
    fn test_empty_session_draws_nothing() {
        let mut port = RecordingPort::default();
        render_session(&session(), &mut port);
        assert!(port.calls.is_empty());
    }

    #[test]
    fn test_committed_and_in_progress_overlays() {
        let mut s = session();
        s.start_drawing();
        for (x, y) in [(10.0, 10.0), (100.0, 10.0), (50.0, 80.0)] {
            s.add_vertex(Vertex::new(x, y));
        }
        s.end_drawing();
        s.start_drawing();
        s.add_vertex(Vertex::new(300.0, 300.0));

        let mut port = RecordingPort::default();
        render_session(&s, &mut port);

        assert_eq!(
            port.calls,
            vec![
                Call::Closed(3, OverlayStyle::Committed),
                Call::Marker(Vertex::new(10.0, 10.0), OverlayStyle::Committed),
                Call::Marker(Vertex::new(100.0, 10.0), OverlayStyle::Committed),
                Call::Marker(Vertex::new(50.0, 80.0), OverlayStyle::Committed),
                Call::Open(1, OverlayStyle::InProgress),
                Call::Marker(Vertex::new(300.0, 300.0), OverlayStyle::InProgress),
            ]
        );
    }
}
