use crate::config::{ImageFormat, SessionConfig};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture unavailable: {0}")]
    Grab(String),
    #[error("failed to encode screenshot: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Full-screen capture primitive.
pub trait ScreenGrabber: Send {
    fn grab(&self) -> Result<RgbaImage, CaptureError>;
}

impl<F> ScreenGrabber for F
where
    F: Fn() -> Result<RgbaImage, CaptureError> + Send,
{
    fn grab(&self) -> Result<RgbaImage, CaptureError> {
        self()
    }
}

/// Reports where the pointer is right now, in screen coordinates.
pub trait PointerLocator: Send {
    fn position(&self) -> Option<(f64, f64)>;
}

impl<F> PointerLocator for F
where
    F: Fn() -> Option<(f64, f64)> + Send,
{
    fn position(&self) -> Option<(f64, f64)> {
        self()
    }
}

/// Loads the cursor overlay. Any problem disables the overlay for the session.
pub fn load_cursor(path: Option<&Path>) -> Option<RgbaImage> {
    let path = path?;
    match image::open(path) {
        Ok(img) => {
            debug!(path = %path.display(), "loaded cursor overlay");
            Some(img.to_rgba8())
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "could not load cursor image, screenshots will have no cursor overlay"
            );
            None
        }
    }
}

/// Pastes `cursor` onto `canvas` with alpha blending. Coordinates are not
/// clamped; whatever falls outside the canvas is dropped.
pub fn composite_cursor(canvas: &mut RgbaImage, cursor: &RgbaImage, x: f64, y: f64) {
    image::imageops::overlay(canvas, cursor, x as i64, y as i64);
}

pub fn screenshot_filename(title: &str, counter: u64, format: ImageFormat) -> String {
    format!("{}_step_{}.{}", title, counter, format.extension())
}

/// Encodes a frame. Quality only applies to the lossy format.
pub fn encode(img: RgbaImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
        ImageFormat::Jpeg => {
            // jpeg has no alpha channel
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;
        }
    }
    Ok(buf)
}

/// Produces one composed screenshot per trigger into the session's
/// ephemeral directory.
pub struct Capturer {
    grabber: Box<dyn ScreenGrabber>,
    locator: Box<dyn PointerLocator>,
    cursor: Option<RgbaImage>,
    dir: PathBuf,
    title: String,
    format: ImageFormat,
    quality: u8,
}

impl Capturer {
    pub fn new(
        config: &SessionConfig,
        dir: PathBuf,
        grabber: Box<dyn ScreenGrabber>,
        locator: Box<dyn PointerLocator>,
    ) -> Self {
        let cursor = load_cursor(config.cursor());
        if config.cursor().is_none() {
            info!("no cursor image configured, screenshots will have no cursor overlay");
        }
        Self {
            grabber,
            locator,
            cursor,
            dir,
            title: config.title().to_string(),
            format: config.format(),
            quality: config.quality(),
        }
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// Captures the screen and returns the stored filename, or `None` if
    /// anything failed. `counter` advances on every call so a failed
    /// attempt's name is never handed out again.
    pub fn capture(&self, counter: &mut u64) -> Option<String> {
        let n = *counter;
        *counter += 1;

        match self.try_capture(n) {
            Ok(filename) => {
                debug!(%filename, "screenshot saved");
                Some(filename)
            }
            Err(e) => {
                warn!(step = n, error = %e, "screenshot failed, step recorded without image");
                None
            }
        }
    }

    fn try_capture(&self, n: u64) -> Result<String, CaptureError> {
        let mut frame = self.grabber.grab()?;

        if let (Some(cursor), Some((x, y))) = (&self.cursor, self.locator.position()) {
            composite_cursor(&mut frame, cursor, x, y);
        }

        let filename = screenshot_filename(&self.title, n, self.format);
        let path = self.dir.join(&filename);
        let bytes = encode(frame, self.format, self.quality)?;
        fs::write(&path, bytes).map_err(|source| CaptureError::Write { path, source })?;
        Ok(filename)
    }
}
