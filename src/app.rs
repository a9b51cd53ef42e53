// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! This module owns the annotation session and the capture coordinator and
//! wires them to the UI. A finished capture is applied before anything is
//! drawn. Input gathered during one egui frame (toolbar buttons, keys,
//! canvas clicks and resizes) is turned into [`SessionEvent`]s and handed to
//! the session as a single batch.

use crate::config::AppConfig;
use crate::io::media::{
    CaptureCoordinator, CaptureError, CaptureRequest, CapturedFrame, MediaSource,
    IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
use crate::io::serialization::{export_polygons, write_export};
use crate::models::annotation::Dimensions;
use crate::models::session::{AnnotationSession, IgnoreReason, SessionEvent, SessionPolicy, Transition};
use crate::ui::{canvas, properties, toolbar};
use anyhow::Context;
use std::path::Path;

/// Main application state.
pub struct FramemarkApp {
    config: AppConfig,

    /// Background frame grabbing
    capture: CaptureCoordinator,

    /// Annotation state for the captured frame (None until a frame arrives)
    session: Option<AnnotationSession>,

    /// Captured frame uploaded for display
    frame_texture: Option<egui::TextureHandle>,

    /// Contents of the remote URL field
    url_input: String,

    /// Seek target for "Capture At", in seconds
    capture_position_secs: f64,

    /// Space the canvas last had for the frame
    canvas_bounds: Option<Dimensions>,

    /// Last message worth showing to the user
    status: Option<String>,

    /// Loading state message
    loading_message: Option<String>,
}

impl FramemarkApp {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            capture: CaptureCoordinator::new(),
            session: None,
            frame_texture: None,
            url_input: String::new(),
            capture_position_secs: 0.0,
            canvas_bounds: None,
            status: None,
            loading_message: None,
        }
    }

    /// Switch to a new media source and capture its first frame.
    fn open_source(&mut self, source: MediaSource) {
        // Stale vertices refer to the old frame; drop them before anything else
        if let Some(session) = self.session.as_mut() {
            let transitions = session.dispatch([SessionEvent::CancelDrawing, SessionEvent::ClearCommitted]);
            for transition in transitions {
                self.report(transition);
            }
        }

        log::info!("Opening {}", source);
        self.loading_message = Some(format!("Capturing frame from {}...", source));
        self.capture.load(source);
    }

    fn load_url(&mut self, input: &str) {
        match MediaSource::parse_url(input) {
            Ok(source) => self.open_source(source),
            Err(e) => {
                log::warn!("Rejected URL: {}", e);
                self.status = Some(e.to_string());
            }
        }
    }

    fn request_capture(&mut self, position_ms: Option<f64>) {
        match self.capture.request_capture_at(position_ms) {
            CaptureRequest::Started => {
                self.loading_message = Some("Capturing frame...".to_string());
            }
            CaptureRequest::Coalesced => log::debug!("Capture request merged into running capture"),
            CaptureRequest::NoSource => {
                self.status = Some("Open a video first".to_string());
            }
        }
    }

    /// Apply a finished capture to the texture and the session.
    ///
    /// A reload is applied right away so the new frame is never drawn with
    /// the previous source's geometry.
    fn on_capture(&mut self, result: Result<CapturedFrame, CaptureError>, ctx: &egui::Context) {
        self.loading_message = None;

        let captured = match result {
            Ok(captured) => captured,
            Err(CaptureError::NotReady) => {
                log::warn!("Frame capture attempted before the source was ready");
                self.status = Some("Video not ready yet, try capturing again".to_string());
                self.discard_if_undelivered();
                return;
            }
            Err(e) => {
                log::error!("Frame capture failed: {}", e);
                self.status = Some(format!("Capture failed: {}", e));
                self.discard_if_undelivered();
                return;
            }
        };

        let outcome = capture_outcome(
            self.session.as_ref(),
            &captured,
            self.canvas_bounds,
            self.config.session_policy(),
        );

        let frame = captured.frame;
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.pixels,
        );
        self.frame_texture = Some(ctx.load_texture(
            "captured_frame",
            color_image,
            egui::TextureOptions::LINEAR,
        ));

        match outcome {
            CaptureOutcome::NewSession(session) => {
                log::info!("Annotation session ready for {}x{} frame", frame.width, frame.height);
                self.session = Some(session);
            }
            CaptureOutcome::Reload(event) => {
                if let Some(session) = self.session.as_mut() {
                    let transition = session.handle(event);
                    self.report(transition);
                }
            }
            CaptureOutcome::Keep => log::debug!("Recaptured frame, keeping annotations"),
        }
        self.status = Some(format!("Captured {}x{} frame", frame.width, frame.height));
    }

    /// Without any frame from the current source the session stays inert.
    fn discard_if_undelivered(&mut self) {
        if !self.capture.has_delivered() {
            self.session = None;
            self.frame_texture = None;
        }
    }

    fn export(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .add_filter("YAML", &["yaml", "yml"])
            .set_file_name(&self.config.export_file_name)
            .save_file()
        else {
            return;
        };

        match export_to(session, &path) {
            Ok(count) => {
                log::info!("Exported {} polygons to {}", count, path.display());
                self.status = Some(format!("Exported {} polygons", count));
            }
            Err(e) => {
                log::error!("Failed to export polygons: {:#}", e);
                self.status = Some(format!("Export failed: {}", e));
            }
        }
    }

    /// Log a transition and surface the ones the user should know about.
    fn report(&mut self, transition: Transition) {
        match transition {
            Transition::Ignored(IgnoreReason::TooFewVertices { have, need }) => {
                log::warn!("Cannot finish polygon with {} vertices (need {})", have, need);
                self.status = Some(format!("A polygon needs at least {} vertices", need));
            }
            Transition::Ignored(IgnoreReason::InvalidDimensions) => {
                log::warn!("Ignored size update with invalid dimensions");
            }
            Transition::Ignored(IgnoreReason::NotDrawing) | Transition::Unchanged => {}
            Transition::Committed { index, vertex_count, .. } => {
                self.status = Some(format!("Polygon {} committed ({} vertices)", index + 1, vertex_count));
            }
            Transition::Cancelled { discarded } if discarded > 0 => {
                self.status = Some(format!("Discarded {} unfinished vertices", discarded));
            }
            other => log::debug!("Session transition: {:?}", other),
        }
    }
}

/// What a successful capture does to the annotation session.
#[derive(Debug, PartialEq)]
enum CaptureOutcome {
    /// First frame with no session yet.
    NewSession(AnnotationSession),
    /// New source or changed frame size: reset the session.
    Reload(SessionEvent),
    /// Same source at the same size: annotations still apply.
    Keep,
}

fn capture_outcome(
    session: Option<&AnnotationSession>,
    captured: &CapturedFrame,
    canvas_bounds: Option<Dimensions>,
    policy: SessionPolicy,
) -> CaptureOutcome {
    let source = captured.frame.dimensions();
    let bounds = canvas_bounds
        .filter(Dimensions::is_valid)
        .or_else(|| session.map(AnnotationSession::display_size).filter(Dimensions::is_valid));
    let display = bounds.map(|b| source.fit_within(b)).unwrap_or(source);

    match session {
        None => CaptureOutcome::NewSession(AnnotationSession::new(source, display, policy)),
        Some(session) if captured.fresh_source || session.source_size() != source => {
            CaptureOutcome::Reload(SessionEvent::SourceLoaded { source, display })
        }
        Some(_) => CaptureOutcome::Keep,
    }
}

fn export_to(session: &AnnotationSession, path: &Path) -> anyhow::Result<usize> {
    let export = export_polygons(session).context("failed to scale polygons")?;
    write_export(&export, path).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(export.polygon_count())
}

impl eframe::App for FramemarkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut events = Vec::new();

        // Check for completed frame capture
        if let Some(result) = self.capture.poll() {
            self.on_capture(result, ctx);
        }

        // Request repaint if still loading (to update spinner)
        if self.loading_message.is_some() {
            ctx.request_repaint();
        }

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Video...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Videos", VIDEO_EXTENSIONS)
                            .add_filter("Images", IMAGE_EXTENSIONS)
                            .pick_file()
                        {
                            self.open_source(MediaSource::LocalFile(path));
                        }
                        ui.close_menu();
                    }
                    let has_polygons = self
                        .session
                        .as_ref()
                        .map(|s| !s.committed_polygons().is_empty())
                        .unwrap_or(false);
                    if ui
                        .add_enabled(has_polygons, egui::Button::new("Export Polygons..."))
                        .clicked()
                    {
                        self.export();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        // Toolbar
        let toolbar_action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| {
                toolbar::show(
                    ui,
                    &mut self.url_input,
                    &mut self.capture_position_secs,
                    self.session.as_ref(),
                    self.capture.has_source(),
                    self.capture.is_busy(),
                )
            })
            .inner;

        match toolbar_action {
            toolbar::ToolbarAction::LoadUrl(url) => self.load_url(&url),
            toolbar::ToolbarAction::CaptureFrame => self.request_capture(None),
            toolbar::ToolbarAction::CaptureAt(secs) => self.request_capture(Some(secs * 1000.0)),
            toolbar::ToolbarAction::StartDrawing => events.push(SessionEvent::StartDrawing),
            toolbar::ToolbarAction::FinishPolygon => events.push(SessionEvent::EndDrawing),
            toolbar::ToolbarAction::CancelDrawing => events.push(SessionEvent::CancelDrawing),
            toolbar::ToolbarAction::ClearPolygons => events.push(SessionEvent::ClearCommitted),
            toolbar::ToolbarAction::Export => self.export(),
            toolbar::ToolbarAction::None => {}
        }

        // Status line
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.as_deref().unwrap_or("Ready"));
        });

        // Properties panel (right side)
        egui::SidePanel::right("properties")
            .default_width(260.0)
            .show(ctx, |ui| properties::show(ui, self.session.as_ref()));

        // Handle keyboard events, unless a text field has focus
        if !ctx.wants_keyboard_input() {
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                events.push(SessionEvent::CancelDrawing);
            }
            if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
                events.push(SessionEvent::EndDrawing);
            }
        }

        // Main canvas (center)
        let canvas_output = egui::CentralPanel::default()
            .show(ctx, |ui| {
                if let Some(ref message) = self.loading_message {
                    ui.centered_and_justified(|ui| {
                        ui.vertical_centered(|ui| {
                            ui.add_space(20.0);
                            ui.spinner();
                            ui.add_space(10.0);
                            ui.label(
                                egui::RichText::new(message)
                                    .size(16.0)
                                    .color(egui::Color32::from_gray(200)),
                            );
                        });
                    });
                    canvas::CanvasOutput::default()
                } else {
                    canvas::show(
                        ui,
                        self.session.as_ref(),
                        self.frame_texture.as_ref(),
                        self.config.marker_radius,
                    )
                }
            })
            .inner;

        if let Some(bounds) = canvas_output.bounds {
            self.canvas_bounds = Some(bounds);
        }
        events.extend(canvas_output.actions.into_iter().map(|action| match action {
            canvas::CanvasAction::PointerDown(point) => SessionEvent::PointerDown(point),
            canvas::CanvasAction::PointerUp => SessionEvent::PointerUp,
            canvas::CanvasAction::Resized(display) => SessionEvent::DisplayResized(display),
        }));

        // Apply everything from this frame in one ordered batch
        if events.is_empty() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let transitions = session.dispatch(events);
        for transition in transitions {
            self.report(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::{Frame, FrameSource};
    use crate::models::annotation::Vertex;
    use std::time::{Duration, Instant};

    fn captured(width: u32, height: u32, fresh_source: bool) -> CapturedFrame {
        CapturedFrame {
            frame: Frame {
                width,
                height,
                pixels: vec![0; (width * height * 4) as usize],
            },
            fresh_source,
        }
    }

    fn annotated_session() -> AnnotationSession {
        let mut session = AnnotationSession::new(
            Dimensions::new(1920.0, 1080.0),
            Dimensions::new(800.0, 450.0),
            SessionPolicy::default(),
        );
        session.start_drawing();
        for (x, y) in [(10.0, 10.0), (200.0, 10.0), (100.0, 150.0)] {
            session.add_vertex(Vertex::new(x, y));
        }
        session.end_drawing();
        session
    }

    fn assert_close(actual: Dimensions, expected: Dimensions) {
        assert!(
            (actual.width - expected.width).abs() < 1e-9
                && (actual.height - expected.height).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    struct BlankSource;

    impl FrameSource for BlankSource {
        fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
            Ok(captured(16, 9, true).frame)
        }
    }

    fn blank_opener(_: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(BlankSource))
    }

    fn wait(capture: &mut CaptureCoordinator) -> Result<CapturedFrame, CaptureError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = capture.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "capture did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_first_frame_starts_session_fitted_to_canvas() {
        let outcome = capture_outcome(
            None,
            &captured(1920, 1080, true),
            Some(Dimensions::new(1000.0, 1000.0)),
            SessionPolicy::default(),
        );

        let CaptureOutcome::NewSession(session) = outcome else {
            panic!("expected a new session");
        };
        assert_eq!(session.source_size(), Dimensions::new(1920.0, 1080.0));
        assert_close(session.display_size(), Dimensions::new(1000.0, 562.5));
        assert!(session.committed_polygons().is_empty());
    }

    #[test]
    fn test_first_frame_before_layout_uses_frame_size() {
        let outcome = capture_outcome(None, &captured(640, 360, true), None, SessionPolicy::default());

        let CaptureOutcome::NewSession(session) = outcome else {
            panic!("expected a new session");
        };
        assert_eq!(session.display_size(), Dimensions::new(640.0, 360.0));
    }

    #[test]
    fn test_fresh_source_reloads_at_its_own_aspect() {
        let session = annotated_session();

        let outcome = capture_outcome(
            Some(&session),
            &captured(1080, 1920, true),
            Some(Dimensions::new(800.0, 600.0)),
            SessionPolicy::default(),
        );

        let CaptureOutcome::Reload(SessionEvent::SourceLoaded { source, display }) = outcome else {
            panic!("expected a reload");
        };
        assert_eq!(source, Dimensions::new(1080.0, 1920.0));
        assert_close(display, Dimensions::new(337.5, 600.0));
    }

    #[test]
    fn test_fresh_source_without_layout_fits_previous_display() {
        let session = annotated_session();

        let outcome = capture_outcome(
            Some(&session),
            &captured(1080, 1920, true),
            None,
            SessionPolicy::default(),
        );

        let CaptureOutcome::Reload(SessionEvent::SourceLoaded { display, .. }) = outcome else {
            panic!("expected a reload");
        };
        assert_close(display, Dimensions::new(253.125, 450.0));
    }

    #[test]
    fn test_fresh_source_with_same_size_still_reloads() {
        let session = annotated_session();

        let outcome = capture_outcome(
            Some(&session),
            &captured(1920, 1080, true),
            Some(Dimensions::new(800.0, 450.0)),
            SessionPolicy::default(),
        );

        assert!(matches!(
            outcome,
            CaptureOutcome::Reload(SessionEvent::SourceLoaded { .. })
        ));
    }

    #[test]
    fn test_same_size_recapture_keeps_annotations() {
        let session = annotated_session();

        let outcome = capture_outcome(
            Some(&session),
            &captured(1920, 1080, false),
            Some(Dimensions::new(800.0, 450.0)),
            SessionPolicy::default(),
        );

        assert_eq!(outcome, CaptureOutcome::Keep);
    }

    #[test]
    fn test_recapture_with_new_size_reloads() {
        let session = annotated_session();

        let outcome = capture_outcome(
            Some(&session),
            &captured(1280, 720, false),
            Some(Dimensions::new(800.0, 450.0)),
            SessionPolicy::default(),
        );

        let CaptureOutcome::Reload(SessionEvent::SourceLoaded { source, .. }) = outcome else {
            panic!("expected a reload");
        };
        assert_eq!(source, Dimensions::new(1280.0, 720.0));
    }

    #[test]
    fn test_failed_capture_keeps_session_only_after_a_delivery() {
        let ctx = egui::Context::default();
        let mut app = FramemarkApp::new(AppConfig::default());
        app.capture = CaptureCoordinator::with_opener(blank_opener);

        app.capture.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));
        let result = wait(&mut app.capture);
        app.on_capture(result, &ctx);
        assert!(app.session.is_some());
        assert!(app.frame_texture.is_some());

        // A failed recapture of the same source leaves the frame in place
        app.on_capture(Err(CaptureError::NotReady), &ctx);
        assert!(app.session.is_some());

        // Nothing has arrived from the new source yet
        app.open_source(MediaSource::RemoteUrl("https://example.com/b.mp4".into()));
        app.on_capture(Err(CaptureError::NotReady), &ctx);
        assert!(app.session.is_none());
        assert!(app.frame_texture.is_none());
        assert!(app.capture.has_source());
    }
}
