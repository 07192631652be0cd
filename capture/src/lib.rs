//! Frame acquisition for the barcode reader.
//!
//! Every source hands out one decoded [`Frame`] per call to
//! [`CaptureSource::next_frame`]. Any error ends the session: sources do not
//! reconnect or retry.

mod images;
mod mjpeg;
#[cfg(feature = "v4l")]
mod webcam;

pub use images::ImageDirSource;
pub use mjpeg::{MjpegParser, MjpegSource, PollingSource};
#[cfg(feature = "v4l")]
pub use webcam::V4lSource;

use barcode_reader_common::config::CameraConfig;
use barcode_reader_common::frame::{Frame, FrameError};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        source: std::io::Error,
    },
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("stream ended")]
    StreamEnded,
    #[error("no more frames in {0}")]
    Exhausted(String),
    #[error("frame decode failed: {0}")]
    Decode(#[from] FrameError),
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
    #[error("camera.{0} must be set for mode {1:?}")]
    MissingSetting(&'static str, String),
    #[error("unknown camera mode {0:?}, expected 'v4l', 'mjpeg', 'polling' or 'images'")]
    UnknownMode(String),
    #[error("camera mode {mode:?} needs the `{feature}` cargo feature; rebuild with --features {feature}")]
    FeatureDisabled {
        mode: String,
        feature: &'static str,
    },
}

/// A blocking-in-spirit producer of frames: each call waits for the next frame.
#[allow(async_fn_in_trait)]
pub trait CaptureSource {
    /// Acquire the next frame. An error means the source is finished for good.
    async fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Human-readable description for logging.
    fn describe(&self) -> String;
}

/// The configured capture source.
pub enum Source {
    #[cfg(feature = "v4l")]
    V4l(V4lSource),
    Mjpeg(MjpegSource),
    Polling(PollingSource),
    Images(ImageDirSource),
}

impl Source {
    /// Open the source selected by `camera.mode`.
    pub async fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let source = match config.mode.as_str() {
            #[cfg(feature = "v4l")]
            "v4l" => Self::V4l(V4lSource::open(config.device, config.width, config.height)?),
            #[cfg(not(feature = "v4l"))]
            "v4l" => {
                return Err(CaptureError::FeatureDisabled {
                    mode: config.mode.clone(),
                    feature: "v4l",
                })
            }
            "mjpeg" => {
                let url = required(config.url.as_deref(), "url", &config.mode)?;
                Self::Mjpeg(MjpegSource::connect(url).await?)
            }
            "polling" => {
                let url = required(config.url.as_deref(), "url", &config.mode)?;
                Self::Polling(PollingSource::new(url, config.fps))
            }
            "images" => {
                let path = required(config.path.as_deref(), "path", &config.mode)?;
                Self::Images(ImageDirSource::open(path, config.fps)?)
            }
            other => return Err(CaptureError::UnknownMode(other.to_string())),
        };
        info!(source = source.describe(), "capture source opened");
        Ok(source)
    }
}

fn required<'a, T: ?Sized>(
    value: Option<&'a T>,
    name: &'static str,
    mode: &str,
) -> Result<&'a T, CaptureError> {
    value.ok_or_else(|| CaptureError::MissingSetting(name, mode.to_string()))
}

impl CaptureSource for Source {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        match self {
            #[cfg(feature = "v4l")]
            Self::V4l(s) => s.next_frame().await,
            Self::Mjpeg(s) => s.next_frame().await,
            Self::Polling(s) => s.next_frame().await,
            Self::Images(s) => s.next_frame().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            #[cfg(feature = "v4l")]
            Self::V4l(s) => s.describe(),
            Self::Mjpeg(s) => s.describe(),
            Self::Polling(s) => s.describe(),
            Self::Images(s) => s.describe(),
        }
    }
}
