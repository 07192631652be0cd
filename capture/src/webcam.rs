use barcode_reader_common::frame::{ChannelOrder, Frame};
use chrono::Utc;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::{CaptureError, CaptureSource};

const MJPG: &[u8; 4] = b"MJPG";
const YUYV: &[u8; 4] = b"YUYV";

/// Local webcam via V4L2 memory-mapped streaming.
///
/// The device is held for the lifetime of this value and released on drop.
pub struct V4lSource {
    path: String,
    stream: MmapStream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
    seq: u64,
    _device: Device,
}

impl V4lSource {
    /// Open `/dev/video{index}` and ask for MJPG at the requested size.
    /// YUYV is accepted when the driver insists on it.
    pub fn open(index: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
        let path = format!("/dev/video{index}");
        info!(device = path, width, height, "opening V4L2 device");

        let device = Device::new(index as usize).map_err(|e| CaptureError::Open {
            device: path.clone(),
            source: e,
        })?;

        let mut format = device.format()?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(MJPG);
        let format = device.set_format(&format)?;

        if format.fourcc != FourCC::new(MJPG) && format.fourcc != FourCC::new(YUYV) {
            return Err(CaptureError::UnsupportedFormat(
                String::from_utf8_lossy(&format.fourcc.repr).into_owned(),
            ));
        }
        if format.width != width || format.height != height {
            warn!(
                requested_width = width,
                requested_height = height,
                width = format.width,
                height = format.height,
                "device picked a different frame size"
            );
        }
        info!(
            width = format.width,
            height = format.height,
            fourcc = %String::from_utf8_lossy(&format.fourcc.repr),
            "V4L2 format set"
        );

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)?;

        Ok(Self {
            path,
            stream,
            fourcc: format.fourcc,
            width: format.width,
            height: format.height,
            seq: 0,
            _device: device,
        })
    }
}

impl CaptureSource for V4lSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let stream = &mut self.stream;
        // Dequeueing blocks until the driver hands over a buffer.
        let bytes = tokio::task::block_in_place(move || -> std::io::Result<Vec<u8>> {
            let (buf, meta) = stream.next()?;
            let used = match meta.bytesused as usize {
                0 => buf.len(),
                n => n.min(buf.len()),
            };
            Ok(buf[..used].to_vec())
        })?;

        let frame = if self.fourcc == FourCC::new(MJPG) {
            Frame::decode_image(&bytes)?
        } else {
            Frame::new(
                self.width,
                self.height,
                ChannelOrder::Rgb,
                yuyv_to_rgb(&bytes, self.width, self.height),
            )?
        };

        if self.seq % 100 == 0 {
            debug!(seq = self.seq, bytes = bytes.len(), "V4L2 frame captured");
        }
        let frame = frame.with_meta(self.seq, Utc::now().timestamp_millis());
        self.seq += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("V4L2 {} {}x{}", self.path, self.width, self.height)
    }
}

impl Drop for V4lSource {
    fn drop(&mut self) {
        info!(device = self.path, "releasing V4L2 device");
    }
}

/// Convert packed YUYV 4:2:2 to RGB. Missing trailing bytes come out black.
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let mut rgb = vec![0u8; pixels * 3];

    for (pair, out) in yuyv.chunks_exact(4).zip(rgb.chunks_exact_mut(6)) {
        let (y0, u, y1, v) = (pair[0], pair[1], pair[2], pair[3]);
        out[..3].copy_from_slice(&yuv_to_rgb(y0, u, v));
        out[3..].copy_from_slice(&yuv_to_rgb(y1, u, v));
    }
    rgb
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_grey_stays_grey() {
        let rgb = yuyv_to_rgb(&[126, 128, 126, 128], 2, 1);
        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| (127..=129).contains(&c)));
    }

    #[test]
    fn yuyv_short_buffer_is_padded() {
        let rgb = yuyv_to_rgb(&[235, 128, 235, 128], 4, 1);
        assert_eq!(rgb.len(), 12);
        assert_eq!(&rgb[..3], &[255, 255, 255]);
        assert_eq!(&rgb[6..], &[0, 0, 0, 0, 0, 0]);
    }
}
