//! Camera devices and their live streams.
//!
//! A `CameraDevice` opens a `VideoStream`; the stream yields frames until
//! it is stopped. `MediaCapture` owns at most one open stream at a time.

use super::CaptureError;
use image::DynamicImage;
use std::path::PathBuf;

/// Which way the camera should face. Rear-facing is preferred for
/// photographing food on a counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

pub trait CameraDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire the device. Fails with `PermissionDenied` or
    /// `DeviceUnavailable` when the device cannot be used.
    fn open(&self, facing: FacingMode) -> Result<Box<dyn VideoStream>, CaptureError>;
}

pub trait VideoStream: Send {
    /// The frame currently on the preview.
    fn grab_frame(&mut self) -> Result<DynamicImage, CaptureError>;

    /// Release the device. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Camera backed by a snapshot file that an external webcam tool keeps
/// overwriting with the latest frame (e.g. `ffmpeg -update 1 frame.jpg`).
#[derive(Debug, Clone)]
pub struct SnapshotCamera {
    path: PathBuf,
}

impl SnapshotCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CameraDevice for SnapshotCamera {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn open(&self, facing: FacingMode) -> Result<Box<dyn VideoStream>, CaptureError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "{} is not a file",
                    self.path.display()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(CaptureError::PermissionDenied)
            }
            Err(e) => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
        log::debug!(
            "[CAPTURE] Snapshot camera has a fixed orientation, ignoring {:?}",
            facing
        );
        Ok(Box::new(SnapshotStream {
            path: self.path.clone(),
            stopped: false,
        }))
    }
}

struct SnapshotStream {
    path: PathBuf,
    stopped: bool,
}

impl VideoStream for SnapshotStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        if self.stopped {
            return Err(CaptureError::DeviceUnavailable("stream stopped".to_string()));
        }
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ => CaptureError::Io(e),
        })?;
        image::load_from_memory(&bytes).map_err(|e| CaptureError::Decode(e.to_string()))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
