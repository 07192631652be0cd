use barcode_reader_common::frame::Frame;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{CaptureError, CaptureSource};

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for a `multipart/x-mixed-replace` MJPEG body.
///
/// Feed it arbitrary chunks; complete JPEG parts come out of [`next_jpeg`](Self::next_jpeg)
/// in stream order. A part is only complete once the following boundary arrives.
pub struct MjpegParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MjpegParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete JPEG part, if the buffered bytes contain one.
    /// Empty parts are skipped.
    pub fn next_jpeg(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        return None;
                    }
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    else {
                        // Skip already scanned bytes on the next call
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        return None;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before boundary
                    let end = if jpeg_end >= 2
                        && self.buffer[jpeg_end - 2] == b'\r'
                        && self.buffer[jpeg_end - 1] == b'\n'
                    {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                    self.state = ParseState::SeekingHeaderEnd;
                    if !jpeg.is_empty() {
                        return Some(jpeg);
                    }
                }
            }
        }
    }
}

/// Live MJPEG stream over HTTP (IP cameras, mjpg-streamer, ...).
///
/// The stream ending or erroring is a capture failure; there is no reconnect.
pub struct MjpegSource {
    url: String,
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: MjpegParser,
    seq: u64,
}

impl MjpegSource {
    pub async fn connect(url: &str) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CaptureError::HttpConnect)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(CaptureError::HttpConnect)?;

        if !response.status().is_success() {
            return Err(CaptureError::HttpStatus(response.status().as_u16()));
        }

        info!(url, status = %response.status(), "connected to MJPEG stream");

        Ok(Self {
            url: url.to_string(),
            body: response.bytes_stream().boxed(),
            parser: MjpegParser::new(),
            seq: 0,
        })
    }
}

impl CaptureSource for MjpegSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        loop {
            if let Some(jpeg) = self.parser.next_jpeg() {
                let frame = Frame::decode_image(&jpeg)?
                    .with_meta(self.seq, Utc::now().timestamp_millis());
                debug!(seq = self.seq, bytes = jpeg.len(), "MJPEG frame received");
                self.seq += 1;
                return Ok(frame);
            }
            match self.body.next().await {
                Some(chunk) => self.parser.feed(&chunk.map_err(CaptureError::HttpStream)?),
                None => return Err(CaptureError::StreamEnded),
            }
        }
    }

    fn describe(&self) -> String {
        format!("MJPEG stream {}", self.url)
    }
}

/// Polling-based fallback: periodically fetch single JPEG snapshots.
pub struct PollingSource {
    url: String,
    client: reqwest::Client,
    ticker: Option<tokio::time::Interval>,
    seq: u64,
}

impl PollingSource {
    /// `fps <= 0` fetches back to back without pacing.
    pub fn new(url: &str, fps: f64) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            ticker: pacing(fps),
            seq: 0,
        }
    }
}

impl CaptureSource for PollingSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::HttpConnect)?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let jpeg = resp.bytes().await.map_err(CaptureError::HttpStream)?;
        let frame =
            Frame::decode_image(&jpeg)?.with_meta(self.seq, Utc::now().timestamp_millis());
        self.seq += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("snapshot polling {}", self.url)
    }
}

/// Frame pacing for sources that would otherwise run as fast as they can read.
pub(crate) fn pacing(fps: f64) -> Option<tokio::time::Interval> {
    let period = frame_period(fps)?;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    Some(ticker)
}

/// Time between frames at `fps`. `None` when there is nothing to pace: a
/// non-positive or non-finite rate, or one whose period rounds to zero or
/// does not fit in a `Duration`.
fn frame_period(fps: f64) -> Option<Duration> {
    if !(fps > 0.0 && fps.is_finite()) {
        return None;
    }
    match Duration::try_from_secs_f64(1.0 / fps) {
        Ok(period) if !period.is_zero() => Some(period),
        _ => {
            warn!(fps, "frame rate out of range, frames will not be paced");
            None
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
