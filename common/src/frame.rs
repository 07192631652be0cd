use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageBuffer, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

/// Byte order of the three channels of each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red. The order decoders and overlays work in.
    Bgr,
    /// Red, green, blue. The order the browser expects.
    Rgb,
}

/// A captured camera frame: tightly packed 3-channel pixels with capture metadata.
///
/// A frame is owned by the loop iteration that captured it and is dropped
/// once it has been displayed.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
    pub captured_at_ms: i64,
    pub seq: u64,
}

const CHANNELS: usize = 3;

impl Frame {
    /// Wrap a raw pixel buffer. The buffer must hold exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected,
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
            captured_at_ms: 0,
            seq: 0,
        })
    }

    /// Attach capture metadata.
    pub fn with_meta(mut self, seq: u64, captured_at_ms: i64) -> Self {
        self.seq = seq;
        self.captured_at_ms = captured_at_ms;
        self
    }

    /// Build a frame from a decoded RGB image.
    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            data: img.into_raw(),
            captured_at_ms: 0,
            seq: 0,
        }
    }

    /// Decode an encoded image (JPEG from a camera, or anything `image` can guess).
    pub fn decode_image(encoded: &[u8]) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(encoded))
            .with_guessed_format()?
            .decode()?;
        Ok(Self::from_rgb_image(img.to_rgb8()))
    }

    /// Encode as JPEG in RGB order, regardless of the frame's own order.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let rgb = self.clone().into_order(ChannelOrder::Rgb);
        let mut out = Vec::with_capacity(rgb.data.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode(&rgb.data, rgb.width, rgb.height, ExtendedColorType::Rgb8)?;
        Ok(out)
    }

    /// Reorder channels in place. A no-op when the frame is already in `order`.
    pub fn into_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for px in self.data.chunks_exact_mut(CHANNELS) {
                px.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    /// Pixel at (x, y) as `[r, g, b]`, or `None` outside the frame.
    pub fn rgb_at(&self, x: i32, y: i32) -> Option<[u8; 3]> {
        let i = self.offset(x, y)?;
        let px = &self.data[i..i + CHANNELS];
        Some(match self.order {
            ChannelOrder::Rgb => [px[0], px[1], px[2]],
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        })
    }

    /// Mutable `image` view over the raw buffer, for `imageproc` drawing.
    ///
    /// The view holds bytes in the frame's own order; build colors with
    /// [`native_pixel`](Self::native_pixel).
    pub fn pixels_mut(&mut self) -> Option<ImageBuffer<Rgb<u8>, &mut [u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_mut_slice())
    }

    /// An `[r, g, b]` color as stored in this frame's channel order.
    pub fn native_pixel(&self, rgb: [u8; 3]) -> Rgb<u8> {
        match self.order {
            ChannelOrder::Rgb => Rgb(rgb),
            ChannelOrder::Bgr => Rgb([rgb[2], rgb[1], rgb[0]]),
        }
    }

    /// Rec.601 luma of pixel (x, y). Coordinates must lie inside the frame.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let (r, g, b) = match self.order {
            ChannelOrder::Rgb => (self.data[i], self.data[i + 1], self.data[i + 2]),
            ChannelOrder::Bgr => (self.data[i + 2], self.data[i + 1], self.data[i]),
        };
        ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer has {got} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        got: usize,
        expected: usize,
        width: u32,
        height: u32,
    },
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, order: ChannelOrder, px: [u8; 3]) -> Frame {
        let data = px.repeat((width * height) as usize);
        Frame::new(width, height, order, data).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let err = Frame::new(2, 2, ChannelOrder::Bgr, vec![0; 11]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { got: 11, expected: 12, .. }));
    }

    #[test]
    fn bgr_to_rgb_swaps_outer_channels() {
        let frame = solid(2, 1, ChannelOrder::Bgr, [10, 20, 30]);
        let rgb = frame.into_order(ChannelOrder::Rgb);
        assert_eq!(rgb.order(), ChannelOrder::Rgb);
        assert_eq!(rgb.data(), &[30, 20, 10, 30, 20, 10]);
    }

    #[test]
    fn same_order_is_untouched() {
        let frame = solid(1, 1, ChannelOrder::Rgb, [1, 2, 3]);
        assert_eq!(frame.into_order(ChannelOrder::Rgb).data(), &[1, 2, 3]);
    }

    #[test]
    fn drawing_view_writes_in_frame_order() {
        let mut frame = solid(2, 2, ChannelOrder::Bgr, [0, 0, 0]);
        let red = frame.native_pixel([255, 0, 0]);
        frame.pixels_mut().unwrap().put_pixel(1, 1, red);
        assert_eq!(&frame.data()[9..12], &[0, 0, 255]);
        assert_eq!(frame.rgb_at(1, 1), Some([255, 0, 0]));
        assert_eq!(frame.rgb_at(5, 5), None);
    }

    #[test]
    fn luma_is_order_independent() {
        let bgr = solid(1, 1, ChannelOrder::Bgr, [0, 0, 255]);
        let rgb = solid(1, 1, ChannelOrder::Rgb, [255, 0, 0]);
        assert_eq!(bgr.luma(0, 0), rgb.luma(0, 0));
        assert_eq!(rgb.luma(0, 0), 76);
    }

    #[test]
    fn jpeg_encode_then_decode_keeps_dimensions() {
        let frame = solid(16, 8, ChannelOrder::Bgr, [0, 200, 0]);
        let jpeg = frame.to_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = Frame::decode_image(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        assert_eq!(decoded.order(), ChannelOrder::Rgb);
        let [r, g, b] = decoded.rgb_at(8, 4).unwrap();
        assert!(g > 150 && r < 60 && b < 60);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(Frame::decode_image(&[0x00, 0x01, 0x02]).is_err());
    }
}
