use barcode_reader_common::frame::Frame;
use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::mjpeg::pacing;
use crate::{CaptureError, CaptureSource};

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays still images from a directory in file-name order.
///
/// Running out of images ends the session the same way an unplugged camera does.
pub struct ImageDirSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    ticker: Option<tokio::time::Interval>,
    seq: u64,
}

impl ImageDirSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|e| CaptureError::Open {
            device: dir.display().to_string(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        debug!(dir = %dir.display(), images = files.len(), "image replay prepared");

        Ok(Self {
            dir: dir.to_path_buf(),
            pending: files.into(),
            ticker: pacing(fps),
            seq: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl CaptureSource for ImageDirSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let Some(path) = self.pending.pop_front() else {
            return Err(CaptureError::Exhausted(self.dir.display().to_string()));
        };
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }

        let encoded = tokio::fs::read(&path).await?;
        let frame =
            Frame::decode_image(&encoded)?.with_meta(self.seq, Utc::now().timestamp_millis());
        debug!(path = %path.display(), seq = self.seq, "replayed image");
        self.seq += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("image replay {}", self.dir.display())
    }
}
