// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media sources and frame capture.
//!
//! This module opens local files or remote URLs, grabs still frames from
//! them, and runs those grabs off the UI thread. Decoding itself is left to
//! the `image` crate (still frames) and OpenCV (video, behind the
//! `video-opencv` feature).

use crate::models::annotation::Dimensions;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use thiserror::Error;

/// File extensions decoded as single still frames.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// File extensions offered in the video picker.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "webm"];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("media source has not buffered a frame yet")]
    NotReady,
    #[error("unsupported media source: {0}")]
    Unsupported(String),
    #[error("failed to open {location}: {reason}")]
    Open { location: String, reason: String },
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("capture worker exited without delivering a frame")]
    WorkerGone,
}

/// Where a video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl MediaSource {
    /// Parse the contents of the URL text field.
    pub fn parse_url(input: &str) -> Result<Self, CaptureError> {
        let url = input.trim();
        if url.is_empty() {
            return Err(CaptureError::Unsupported("empty URL".to_string()));
        }
        if !url.contains("://") {
            return Err(CaptureError::Unsupported(format!(
                "'{}' is missing a scheme (e.g. https://)",
                url
            )));
        }
        Ok(MediaSource::RemoteUrl(url.to_string()))
    }

    /// Whether this source is a single still image rather than a video.
    pub fn is_still_image(&self) -> bool {
        match self {
            MediaSource::LocalFile(path) => has_extension(path, IMAGE_EXTENSIONS),
            MediaSource::RemoteUrl(_) => false,
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::LocalFile(path) => write!(f, "{}", path.display()),
            MediaSource::RemoteUrl(url) => write!(f, "{}", url),
        }
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// A captured RGBA8 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Native pixel dimensions of the frame (source space).
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::from_pixels(self.width, self.height)
    }
}

/// Something that can hand out the frame it is currently positioned on.
///
/// Implementations must return [`CaptureError::NotReady`] instead of a
/// blank raster when no frame has been decoded yet.
pub trait FrameSource: Send {
    fn capture_current_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Position the source at `position_ms` milliseconds from the start.
    ///
    /// Sources without a timeline have a single frame and ignore this.
    fn seek_to(&mut self, position_ms: f64) -> Result<(), CaptureError> {
        let _ = position_ms;
        Ok(())
    }
}

/// A still image on disk, e.g. a frame exported by another tool.
pub struct StillImageSource {
    path: PathBuf,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for StillImageSource {
    fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
        let rgba = image::open(&self.path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::NotReady);
        }
        Ok(Frame {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(feature = "video-opencv")]
pub use video::VideoFileSource;

#[cfg(feature = "video-opencv")]
mod video {
    use super::{CaptureError, Frame, FrameSource};
    use opencv::{core::Mat, imgproc, prelude::*, videoio};

    /// A video file or network stream decoded through OpenCV.
    ///
    /// Each capture reads the next frame, so repeated captures step
    /// through the video unless a position is given first.
    pub struct VideoFileSource {
        capture: videoio::VideoCapture,
    }

    impl VideoFileSource {
        pub fn open(location: &str) -> Result<Self, CaptureError> {
            let open_err = |reason: String| CaptureError::Open {
                location: location.to_string(),
                reason,
            };
            let capture = videoio::VideoCapture::from_file(location, videoio::CAP_ANY)
                .map_err(|e| open_err(e.to_string()))?;
            if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
                return Err(open_err("no video backend accepted the source".to_string()));
            }
            Ok(Self { capture })
        }
    }

    impl FrameSource for VideoFileSource {
        fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
            let decode = |e: opencv::Error| CaptureError::Decode(e.to_string());

            let mut bgr = Mat::default();
            let grabbed = self.capture.read(&mut bgr).map_err(decode)?;
            if !grabbed || bgr.empty() {
                return Err(CaptureError::NotReady);
            }

            let mut rgba = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgba, imgproc::COLOR_BGR2RGBA, 0).map_err(decode)?;

            Ok(Frame {
                width: rgba.cols() as u32,
                height: rgba.rows() as u32,
                pixels: rgba.data_bytes().map_err(decode)?.to_vec(),
            })
        }

        fn seek_to(&mut self, position_ms: f64) -> Result<(), CaptureError> {
            let accepted = self
                .capture
                .set(videoio::CAP_PROP_POS_MSEC, position_ms.max(0.0))
                .map_err(|e| CaptureError::Decode(e.to_string()))?;
            if !accepted {
                return Err(CaptureError::Unsupported(
                    "this video backend cannot seek".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Open a frame source for `source`.
pub fn open_source(source: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
    if let MediaSource::LocalFile(path) = source {
        if !path.exists() {
            return Err(CaptureError::Open {
                location: source.to_string(),
                reason: "file not found".to_string(),
            });
        }
        if source.is_still_image() {
            return Ok(Box::new(StillImageSource::new(path.clone())));
        }
    }
    open_video(source)
}

#[cfg(feature = "video-opencv")]
fn open_video(source: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(VideoFileSource::open(&source.to_string())?))
}

#[cfg(not(feature = "video-opencv"))]
fn open_video(source: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported(format!(
        "{} (video decoding needs the video-opencv feature)",
        source
    )))
}

/// Opens a frame source; swapped out in tests.
pub type SourceOpener = fn(&MediaSource) -> Result<Box<dyn FrameSource>, CaptureError>;

/// A successfully captured frame.
#[derive(Debug)]
pub struct CapturedFrame {
    pub frame: Frame,
    /// First frame delivered for the current source.
    pub fresh_source: bool,
}

/// Outcome of [`CaptureCoordinator::request_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRequest {
    Started,
    /// A capture is already running; its result will answer this request too.
    Coalesced,
    NoSource,
}

struct Delivery {
    generation: u64,
    reader: Option<Box<dyn FrameSource>>,
    result: Result<Frame, CaptureError>,
}

/// Runs frame captures on a background thread, one at a time.
///
/// Loading a new source supersedes any capture still running for the old
/// one; its result is dropped with the old channel.
pub struct CaptureCoordinator {
    opener: SourceOpener,
    source: Option<MediaSource>,
    generation: u64,
    delivered_generation: Option<u64>,
    reader: Option<Box<dyn FrameSource>>,
    pending: Option<Receiver<Delivery>>,
}

impl Default for CaptureCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureCoordinator {
    pub fn new() -> Self {
        Self::with_opener(open_source)
    }

    pub fn with_opener(opener: SourceOpener) -> Self {
        Self {
            opener,
            source: None,
            generation: 0,
            delivered_generation: None,
            reader: None,
            pending: None,
        }
    }

    /// Whether a capture is in flight.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a source is loaded, whether or not a frame has arrived yet.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Whether the current source has produced at least one frame.
    pub fn has_delivered(&self) -> bool {
        self.source.is_some() && self.delivered_generation == Some(self.generation)
    }

    /// Switch to a new source and start capturing its first frame.
    pub fn load(&mut self, source: MediaSource) {
        if self.pending.take().is_some() {
            log::debug!("Superseding in-flight capture for previous source");
        }
        self.generation += 1;
        self.reader = None;
        self.source = Some(source);
        self.spawn(None);
    }

    /// Capture the current frame of the loaded source.
    pub fn request_capture(&mut self) -> CaptureRequest {
        self.request_capture_at(None)
    }

    /// Capture the frame at `position_ms`, or the current one when `None`.
    ///
    /// A coalesced request keeps the running capture's position.
    pub fn request_capture_at(&mut self, position_ms: Option<f64>) -> CaptureRequest {
        if self.pending.is_some() {
            log::debug!("Capture already in flight, coalescing request");
            return CaptureRequest::Coalesced;
        }
        if self.source.is_none() {
            return CaptureRequest::NoSource;
        }
        self.spawn(position_ms);
        CaptureRequest::Started
    }

    /// Collect a finished capture, if any.
    pub fn poll(&mut self) -> Option<Result<CapturedFrame, CaptureError>> {
        let receiver = self.pending.as_ref()?;
        let delivery = match receiver.try_recv() {
            Ok(delivery) => delivery,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                return Some(Err(CaptureError::WorkerGone));
            }
        };
        self.pending = None;

        if delivery.generation != self.generation {
            log::debug!("Dropping capture from superseded source");
            return None;
        }
        self.reader = delivery.reader;

        Some(delivery.result.map(|frame| {
            let fresh_source = self.delivered_generation != Some(delivery.generation);
            self.delivered_generation = Some(delivery.generation);
            CapturedFrame {
                frame,
                fresh_source,
            }
        }))
    }

    fn spawn(&mut self, position_ms: Option<f64>) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let (sender, receiver) = channel();
        self.pending = Some(receiver);

        let generation = self.generation;
        let opener = self.opener;
        let reader = self.reader.take();

        std::thread::spawn(move || {
            let (reader, result) = match reader.map(Ok).unwrap_or_else(|| opener(&source)) {
                Ok(mut reader) => {
                    let result = match position_ms {
                        Some(ms) => reader.seek_to(ms),
                        None => Ok(()),
                    }
                    .and_then(|()| reader.capture_current_frame());
                    (Some(reader), result)
                }
                Err(e) => (None, Err(e)),
            };

            match &result {
                Ok(frame) => log::info!("Captured {}x{} frame from {}", frame.width, frame.height, source),
                Err(e) => log::warn!("Frame capture from {} failed: {}", source, e),
            }

            let _ = sender.send(Delivery {
                generation,
                reader,
                result,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct SolidSource {
        width: u32,
        height: u32,
        delay: Duration,
    }

    impl FrameSource for SolidSource {
        fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
            std::thread::sleep(self.delay);
            Ok(Frame {
                width: self.width,
                height: self.height,
                pixels: vec![255; (self.width * self.height * 4) as usize],
            })
        }
    }

    struct NeverReady;

    impl FrameSource for NeverReady {
        fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
            Err(CaptureError::NotReady)
        }
    }

    /// Reports its playhead in seconds as the frame width.
    struct ClockSource {
        position_ms: f64,
    }

    impl FrameSource for ClockSource {
        fn capture_current_frame(&mut self) -> Result<Frame, CaptureError> {
            let width = 1 + (self.position_ms / 1000.0) as u32;
            self.position_ms += 40.0;
            Ok(Frame {
                width,
                height: 1,
                pixels: vec![0; (width * 4) as usize],
            })
        }

        fn seek_to(&mut self, position_ms: f64) -> Result<(), CaptureError> {
            self.position_ms = position_ms;
            Ok(())
        }
    }

    fn clock_opener(_: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(ClockSource { position_ms: 0.0 }))
    }

    fn solid_opener(source: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
        let (width, height) = match source {
            MediaSource::RemoteUrl(url) if url.contains("wide") => (64, 36),
            _ => (32, 24),
        };
        Ok(Box::new(SolidSource {
            width,
            height,
            delay: Duration::from_millis(50),
        }))
    }

    fn never_ready_opener(_: &MediaSource) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(NeverReady))
    }

    fn wait(coordinator: &mut CaptureCoordinator) -> Result<CapturedFrame, CaptureError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = coordinator.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "capture did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            MediaSource::parse_url("  https://example.com/clip.mp4 ").unwrap(),
            MediaSource::RemoteUrl("https://example.com/clip.mp4".to_string())
        );
        assert!(MediaSource::parse_url("   ").is_err());
        assert!(MediaSource::parse_url("example.com/clip.mp4").is_err());
    }

    #[test]
    fn test_still_image_detection() {
        assert!(MediaSource::LocalFile("frame.PNG".into()).is_still_image());
        assert!(!MediaSource::LocalFile("clip.mp4".into()).is_still_image());
        assert!(!MediaSource::RemoteUrl("https://example.com/a.png".into()).is_still_image());
    }

    #[test]
    fn test_still_image_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        image::RgbaImage::from_pixel(40, 30, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut source = open_source(&MediaSource::LocalFile(path)).unwrap();
        let frame = source.capture_current_frame().unwrap();

        assert_eq!((frame.width, frame.height), (40, 30));
        assert_eq!(frame.pixels.len(), 40 * 30 * 4);
        assert_eq!(&frame.pixels[..4], &[10, 20, 30, 255]);
        assert_eq!(frame.dimensions(), Dimensions::new(40.0, 30.0));
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let err = open_source(&MediaSource::LocalFile("/nonexistent/frame.png".into()))
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::Open { .. }));
    }

    #[test]
    fn test_request_without_source() {
        let mut coordinator = CaptureCoordinator::with_opener(solid_opener);
        assert_eq!(coordinator.request_capture(), CaptureRequest::NoSource);
        assert!(coordinator.poll().is_none());
    }

    #[test]
    fn test_second_request_is_coalesced() {
        let mut coordinator = CaptureCoordinator::with_opener(solid_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));

        assert_eq!(coordinator.request_capture(), CaptureRequest::Coalesced);
        assert!(coordinator.is_busy());

        let captured = wait(&mut coordinator).unwrap();
        assert!(captured.fresh_source);
        assert_eq!(captured.frame.dimensions(), Dimensions::new(32.0, 24.0));

        // Exactly one delivery for the two requests
        assert!(!coordinator.is_busy());
        assert!(coordinator.poll().is_none());
    }

    #[test]
    fn test_recapture_is_not_fresh() {
        let mut coordinator = CaptureCoordinator::with_opener(solid_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));
        assert!(wait(&mut coordinator).unwrap().fresh_source);
        assert!(coordinator.has_delivered());

        assert_eq!(coordinator.request_capture(), CaptureRequest::Started);
        assert!(!wait(&mut coordinator).unwrap().fresh_source);
    }

    #[test]
    fn test_load_supersedes_in_flight_capture() {
        let mut coordinator = CaptureCoordinator::with_opener(solid_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));
        coordinator.load(MediaSource::RemoteUrl("https://example.com/wide.mp4".into()));

        let captured = wait(&mut coordinator).unwrap();

        assert!(captured.fresh_source);
        assert_eq!(captured.frame.dimensions(), Dimensions::new(64.0, 36.0));
    }

    #[test]
    fn test_not_ready_is_reported() {
        let mut coordinator = CaptureCoordinator::with_opener(never_ready_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));

        let err = wait(&mut coordinator).unwrap_err();

        assert!(matches!(err, CaptureError::NotReady));
        assert!(!coordinator.is_busy());
        assert!(!coordinator.has_delivered());
    }

    #[test]
    fn test_retry_after_failed_first_capture() {
        let mut coordinator = CaptureCoordinator::with_opener(never_ready_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));
        assert!(wait(&mut coordinator).is_err());

        assert!(coordinator.has_source());
        assert!(!coordinator.has_delivered());
        assert_eq!(coordinator.request_capture(), CaptureRequest::Started);
        assert!(matches!(wait(&mut coordinator), Err(CaptureError::NotReady)));
    }

    #[test]
    fn test_capture_at_position() {
        let mut coordinator = CaptureCoordinator::with_opener(clock_opener);
        coordinator.load(MediaSource::RemoteUrl("https://example.com/a.mp4".into()));
        assert_eq!(wait(&mut coordinator).unwrap().frame.width, 1);

        assert_eq!(
            coordinator.request_capture_at(Some(12_500.0)),
            CaptureRequest::Started
        );
        assert_eq!(wait(&mut coordinator).unwrap().frame.width, 13);

        // Without a position the reader carries on from where it was
        coordinator.request_capture();
        assert_eq!(wait(&mut coordinator).unwrap().frame.width, 13);

        coordinator.request_capture_at(Some(0.0));
        assert_eq!(wait(&mut coordinator).unwrap().frame.width, 1);
    }

    #[test]
    fn test_still_image_ignores_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        image::RgbaImage::new(8, 6).save(&path).unwrap();

        let mut source = StillImageSource::new(path);
        source.seek_to(5_000.0).unwrap();

        assert_eq!(source.capture_current_frame().unwrap().dimensions(), Dimensions::new(8.0, 6.0));
    }
}
