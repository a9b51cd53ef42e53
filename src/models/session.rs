// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation session state machine.
//!
//! An [`AnnotationSession`] turns a stream of pointer clicks and key
//! presses into committed polygons. It cycles between [`Mode::Idle`] and
//! [`Mode::Drawing`] for as long as a frame is loaded; the vertex buffers
//! can only change through the transition methods below, and every
//! transition reports what it did through a [`Transition`] value.
//!
//! All mutation is serialized through [`AnnotationSession::handle`] (or the
//! batched [`AnnotationSession::dispatch`]) on the UI thread.

use super::annotation::{Dimensions, Polygon, Vertex};
use crate::util::geometry::CoordinateScaler;

/// Distance (display pixels) under which a click closes the polygon.
pub const CLOSURE_THRESHOLD: f64 = 10.0;

/// Vertices a polygon needs before it can be committed.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Existing vertices required before a click near the anchor auto-closes.
const MIN_VERTICES_FOR_CLOSURE: usize = 2;

/// Drawing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Drawing,
}

/// Behavioural knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionPolicy {
    /// Auto-close distance in display pixels.
    pub closure_threshold: f64,
    /// Whether starting a new drawing pass discards committed polygons.
    pub start_clears_committed: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            closure_threshold: CLOSURE_THRESHOLD,
            start_clears_committed: false,
        }
    }
}

/// Why an operation left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The operation is only valid while drawing.
    NotDrawing,
    /// Finishing needs more vertices than the buffer holds.
    TooFewVertices { have: usize, need: usize },
    /// A size update carried unusable dimensions.
    InvalidDimensions,
}

/// Outcome of a single session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered drawing mode; `cleared` committed polygons were dropped.
    Started { cleared: usize },
    /// A vertex was appended to the in-progress buffer.
    VertexAdded { count: usize },
    /// The in-progress buffer was committed as polygon `index`.
    Committed {
        index: usize,
        vertex_count: usize,
        auto_closed: bool,
    },
    /// Drawing was abandoned, dropping `discarded` vertices.
    Cancelled { discarded: usize },
    /// A new source replaced every piece of annotation data.
    Reset,
    /// The display space changed and committed polygons were rescaled.
    Resized,
    /// Committed polygons were removed.
    Cleared { removed: usize },
    /// The event does not affect session state.
    Unchanged,
    /// The operation was not valid in the current state.
    Ignored(IgnoreReason),
}

/// A discrete input delivered to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// A frame from a new source is ready.
    SourceLoaded {
        source: Dimensions,
        display: Dimensions,
    },
    /// The rendered frame changed size.
    DisplayResized(Dimensions),
    /// Pointer pressed at canvas-local display coordinates.
    PointerDown(Vertex),
    PointerUp,
    StartDrawing,
    EndDrawing,
    CancelDrawing,
    ClearCommitted,
}

impl SessionEvent {
    /// Geometry changes are applied before any input from the same tick.
    fn priority(&self) -> u8 {
        match self {
            SessionEvent::SourceLoaded { .. } | SessionEvent::DisplayResized(_) => 0,
            _ => 1,
        }
    }
}

/// The annotation state for one loaded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSession {
    mode: Mode,
    current_polygon: Vec<Vertex>,
    committed_polygons: Vec<Polygon>,
    display_size: Dimensions,
    source_size: Dimensions,
    policy: SessionPolicy,
}

impl AnnotationSession {
    /// Create an idle, empty session for a frame of `source` size shown at `display` size.
    pub fn new(source: Dimensions, display: Dimensions, policy: SessionPolicy) -> Self {
        Self {
            mode: Mode::Idle,
            current_polygon: Vec::new(),
            committed_polygons: Vec::new(),
            display_size: display,
            source_size: source,
            policy,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_drawing(&self) -> bool {
        self.mode == Mode::Drawing
    }

    /// Vertices of the polygon being drawn (empty while idle).
    pub fn current_polygon(&self) -> &[Vertex] {
        &self.current_polygon
    }

    /// Committed polygons in commit order.
    pub fn committed_polygons(&self) -> &[Polygon] {
        &self.committed_polygons
    }

    pub fn display_size(&self) -> Dimensions {
        self.display_size
    }

    pub fn source_size(&self) -> Dimensions {
        self.source_size
    }

    /// Whether [`end_drawing`](Self::end_drawing) would commit.
    pub fn can_finish(&self) -> bool {
        self.is_drawing() && self.current_polygon.len() >= MIN_POLYGON_VERTICES
    }

    /// Enter drawing mode with an empty buffer, discarding any uncommitted vertices.
    pub fn start_drawing(&mut self) -> Transition {
        if !self.current_polygon.is_empty() {
            log::debug!(
                "Discarding {} uncommitted vertices",
                self.current_polygon.len()
            );
        }
        self.current_polygon.clear();

        let cleared = if self.policy.start_clears_committed {
            std::mem::take(&mut self.committed_polygons).len()
        } else {
            0
        };

        self.mode = Mode::Drawing;
        log::debug!("Started drawing ({} committed polygons kept)", self.committed_polygons.len());
        Transition::Started { cleared }
    }

    /// Handle a click while drawing.
    ///
    /// The first click sets the anchor. A later click within the closure
    /// threshold of the anchor closes the polygon, provided at least two
    /// vertices already exist; otherwise the click is appended.
    pub fn add_vertex(&mut self, point: Vertex) -> Transition {
        if !self.is_drawing() {
            return Transition::Ignored(IgnoreReason::NotDrawing);
        }

        let Some(anchor) = self.current_polygon.first().copied() else {
            self.current_polygon.push(point);
            log::debug!("Anchor vertex at ({:.1}, {:.1})", point.x, point.y);
            return Transition::VertexAdded { count: 1 };
        };

        let distance = point.distance_to(&anchor);
        if distance < self.policy.closure_threshold
            && self.current_polygon.len() >= MIN_VERTICES_FOR_CLOSURE
        {
            self.current_polygon.push(anchor);
            return self.commit_current(true);
        }

        self.current_polygon.push(point);
        log::debug!(
            "Added vertex at ({:.1}, {:.1}), total vertices: {}",
            point.x,
            point.y,
            self.current_polygon.len()
        );
        Transition::VertexAdded {
            count: self.current_polygon.len(),
        }
    }

    /// Commit the in-progress polygon as an open vertex list.
    ///
    /// With fewer than three vertices the session is left unchanged.
    pub fn end_drawing(&mut self) -> Transition {
        if !self.is_drawing() {
            return Transition::Ignored(IgnoreReason::NotDrawing);
        }
        if self.current_polygon.len() < MIN_POLYGON_VERTICES {
            return Transition::Ignored(IgnoreReason::TooFewVertices {
                have: self.current_polygon.len(),
                need: MIN_POLYGON_VERTICES,
            });
        }
        self.commit_current(false)
    }

    /// Abandon the in-progress polygon. Committed polygons are kept.
    pub fn cancel_drawing(&mut self) -> Transition {
        if !self.is_drawing() {
            return Transition::Ignored(IgnoreReason::NotDrawing);
        }
        let discarded = self.current_polygon.len();
        self.current_polygon.clear();
        self.mode = Mode::Idle;
        log::debug!("Cancelled drawing, discarded {} vertices", discarded);
        Transition::Cancelled { discarded }
    }

    /// Reset everything for a newly loaded source.
    pub fn load_new_source(&mut self, source: Dimensions, display: Dimensions) -> Transition {
        self.mode = Mode::Idle;
        self.current_polygon.clear();
        self.committed_polygons.clear();
        self.source_size = source;
        self.display_size = display;
        log::debug!(
            "Loaded source {}x{} displayed at {:.0}x{:.0}",
            source.width,
            source.height,
            display.width,
            display.height
        );
        Transition::Reset
    }

    /// Move to a new display size, rescaling committed polygons so they stay
    /// on the same frame content. An in-progress polygon is cancelled.
    pub fn resize_display(&mut self, display: Dimensions) -> Transition {
        let scaler = match CoordinateScaler::new(self.display_size, display) {
            Ok(scaler) => scaler,
            Err(e) => {
                log::warn!("Ignoring display resize: {}", e);
                return Transition::Ignored(IgnoreReason::InvalidDimensions);
            }
        };

        if self.is_drawing() {
            self.cancel_drawing();
        }

        for polygon in &mut self.committed_polygons {
            *polygon = scaler.scale_polygon(polygon);
        }
        self.display_size = display;
        Transition::Resized
    }

    /// Drop every committed polygon. The in-progress buffer is untouched.
    pub fn clear_committed(&mut self) -> Transition {
        let removed = self.committed_polygons.len();
        self.committed_polygons.clear();
        Transition::Cleared { removed }
    }

    /// Apply a single event.
    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        match event {
            SessionEvent::SourceLoaded { source, display } => {
                if self.is_drawing() {
                    self.cancel_drawing();
                }
                self.load_new_source(source, display)
            }
            SessionEvent::DisplayResized(display) => self.resize_display(display),
            SessionEvent::PointerDown(point) => self.add_vertex(point),
            SessionEvent::PointerUp => Transition::Unchanged,
            SessionEvent::StartDrawing => self.start_drawing(),
            SessionEvent::EndDrawing => self.end_drawing(),
            SessionEvent::CancelDrawing => self.cancel_drawing(),
            SessionEvent::ClearCommitted => self.clear_committed(),
        }
    }

    /// Apply every event collected during one tick.
    ///
    /// Source reloads and resizes run first, so a click delivered in the
    /// same tick as a reload lands on the fresh session.
    pub fn dispatch<I>(&mut self, events: I) -> Vec<Transition>
    where
        I: IntoIterator<Item = SessionEvent>,
    {
        let mut events: Vec<SessionEvent> = events.into_iter().collect();
        events.sort_by_key(SessionEvent::priority);
        events.into_iter().map(|event| self.handle(event)).collect()
    }

    fn commit_current(&mut self, auto_closed: bool) -> Transition {
        let vertices = std::mem::take(&mut self.current_polygon);
        let vertex_count = vertices.len();
        self.committed_polygons.push(Polygon::new(vertices));
        self.mode = Mode::Idle;

        let index = self.committed_polygons.len() - 1;
        log::info!(
            "Committed polygon {} with {} vertices{}, total: {}",
            index,
            vertex_count,
            if auto_closed { " (auto-closed)" } else { "" },
            self.committed_polygons.len()
        );
        Transition::Committed {
            index,
            vertex_count,
            auto_closed,
        }
    }
}
