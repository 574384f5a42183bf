//! Media capture domain: public API.
//!
//! This module owns camera stream acquisition/teardown and file reading.
//! Both produce a single in-memory `CapturedImage`.
//! External code should only use the types exported here.

mod camera;
mod encode;

pub use camera::{CameraDevice, FacingMode, SnapshotCamera, VideoStream};
pub use encode::{decode_data_url, encode_jpeg, JPEG_QUALITY};

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera access denied, use a photo file instead")]
    PermissionDenied,
    #[error("camera not supported: {0}")]
    Unsupported(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("no file selected")]
    NoFileSelected,
    #[error("file is not a supported image")]
    UnsupportedFormat,
    #[error("could not decode frame: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("invalid image data URL: {0}")]
    InvalidDataUrl(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Encoded image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_data_url(data_url: &str) -> Result<Self, CaptureError> {
        decode_data_url(data_url)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the bytes, exactly what goes into `inline_data.data`.
    pub fn to_base64(&self) -> String {
        encode::base64_encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Where the next image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    File(PathBuf),
}

/// Stops the stream when dropped, whatever path the capture took.
struct StreamGuard(Box<dyn VideoStream>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.stop();
        log::info!("[CAPTURE] Camera released");
    }
}

/// Owns the camera while it is active and turns sources into images.
pub struct MediaCapture {
    camera: Option<Arc<dyn CameraDevice>>,
    stream: Option<StreamGuard>,
    facing: FacingMode,
    jpeg_quality: u8,
}

impl MediaCapture {
    pub fn new(camera: Option<Arc<dyn CameraDevice>>) -> Self {
        Self {
            camera,
            stream: None,
            facing: FacingMode::Environment,
            jpeg_quality: JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// True while a preview stream is open.
    pub fn is_camera_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the camera preview. Any stream already open is released first.
    pub async fn start_camera(&mut self) -> Result<(), CaptureError> {
        self.stop_camera();
        let camera = self
            .camera
            .clone()
            .ok_or_else(|| CaptureError::Unsupported("no camera configured".to_string()))?;
        let facing = self.facing;
        let device = camera.clone();
        let stream = tokio::task::spawn_blocking(move || device.open(facing))
            .await
            .map_err(task_failed)?
            .inspect_err(|e| {
                log::warn!("[CAPTURE] Failed to open {} camera: {}", camera.name(), e);
            })?;
        self.stream = Some(StreamGuard(stream));
        log::info!("[CAPTURE] {} camera active", camera.name());
        Ok(())
    }

    /// Cancel the preview, releasing the device.
    pub fn stop_camera(&mut self) {
        self.stream = None;
    }

    /// Grab the current preview frame as JPEG. The stream is released
    /// whether or not the grab succeeds.
    /// Device reads and JPEG encoding run on the blocking pool.
    pub async fn capture_frame(&mut self) -> Result<CapturedImage, CaptureError> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| CaptureError::DeviceUnavailable("camera is not active".to_string()))?;
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || {
            let frame = stream.0.grab_frame()?;
            encode_jpeg(&frame, quality)
        })
        .await
        .map_err(task_failed)?
    }

    /// Read an image file selected by the user.
    pub async fn read_file(path: &std::path::Path) -> Result<CapturedImage, CaptureError> {
        if path.as_os_str().is_empty() {
            return Err(CaptureError::NoFileSelected);
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CaptureError::NoFileSelected,
            _ => CaptureError::Io(e),
        })?;
        let image = encode::sniff_image(bytes)?;
        log::info!(
            "[CAPTURE] Read {} ({}, {} bytes)",
            path.display(),
            image.mime_type(),
            image.len()
        );
        Ok(image)
    }

    /// Produce one image from the given source.
    ///
    /// For the camera, an existing preview is used if one is open,
    /// otherwise the camera is opened just for this frame. Either way the
    /// camera is inactive again when this returns.
    pub async fn acquire_image(&mut self, source: &ImageSource) -> Result<CapturedImage, CaptureError> {
        match source {
            ImageSource::Camera => {
                if !self.is_camera_active() {
                    self.start_camera().await?;
                }
                self.capture_frame().await
            }
            ImageSource::File(path) => {
                self.stop_camera();
                Self::read_file(path).await
            }
        }
    }
}

fn task_failed(e: tokio::task::JoinError) -> CaptureError {
    CaptureError::DeviceUnavailable(format!("capture task failed: {}", e))
}

impl Drop for MediaCapture {
    fn drop(&mut self) {
        self.stop_camera();
    }
}
