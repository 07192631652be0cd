//! Overlay drawing on raw frames: thick closed outlines and code labels,
//! rendered with `imageproc` onto an `image` view of the frame buffer.

use std::sync::OnceLock;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use barcode_reader_common::frame::Frame;
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use tracing::warn;

use crate::decoder::Point;

/// Overlay color as `[r, g, b]`.
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const OUTLINE_THICKNESS: u32 = 2;
pub const LABEL_SCALE: f32 = 0.5;
pub const LABEL_THICKNESS: u32 = 2;
/// Label baseline sits this many pixels above the first outline point.
pub const LABEL_OFFSET_Y: i32 = 10;

/// Label font pixel height at scale 1.0.
const LABEL_BASE_PX: f32 = 30.0;

static LABEL_FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_DATA) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(error = %e, "label font unreadable, codes will be drawn without labels");
            None
        }
    })
    .as_ref()
}

/// Outline a detected code and write its payload next to it.
pub fn annotate_code(frame: &mut Frame, polygon: &[Point], label: &str) {
    draw_polygon(frame, polygon, GREEN, OUTLINE_THICKNESS);
    if let Some(first) = polygon.first() {
        let origin = Point::new(first.x, first.y - LABEL_OFFSET_Y);
        draw_text(frame, label, origin, LABEL_SCALE, GREEN, LABEL_THICKNESS);
    }
}

/// Closed outline through every point, last point joined back to the first.
pub fn draw_polygon(frame: &mut Frame, points: &[Point], rgb: [u8; 3], thickness: u32) {
    for (i, &from) in points.iter().enumerate() {
        let to = points[(i + 1) % points.len()];
        draw_line(frame, from, to, rgb, thickness);
    }
}

/// Line `thickness` pixels wide, stamped as shifted one-pixel segments that
/// extend right and down of the path. Only the part inside the frame is walked.
pub fn draw_line(frame: &mut Frame, from: Point, to: Point, rgb: [u8; 3], thickness: u32) {
    let t = thickness.max(1) as i32;
    let lo = -(t - 1) / 2;
    let hi = t / 2;

    let margin = f64::from(t);
    let bounds = (
        -margin,
        -margin,
        f64::from(frame.width()) - 1.0 + margin,
        f64::from(frame.height()) - 1.0 + margin,
    );
    let Some((start, end)) = clip_segment(from, to, bounds) else {
        return;
    };

    let color = frame.native_pixel(rgb);
    let Some(mut canvas) = frame.pixels_mut() else {
        return;
    };
    for oy in lo..=hi {
        for ox in lo..=hi {
            let shift = |(x, y): (f32, f32)| (x + ox as f32, y + oy as f32);
            draw_line_segment_mut(&mut canvas, shift(start), shift(end), color);
        }
    }
}

/// Liang-Barsky clip of the segment to `(min_x, min_y, max_x, max_y)`.
/// Endpoints already inside are returned unchanged.
fn clip_segment(
    from: Point,
    to: Point,
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
) -> Option<((f32, f32), (f32, f32))> {
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let (dx, dy) = (f64::from(to.x) - x0, f64::from(to.y) - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [
        (-dx, x0 - min_x),
        (dx, max_x - x0),
        (-dy, y0 - min_y),
        (dy, max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| ((x0 + t * dx) as f32, (y0 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Render `text` with its baseline starting at `origin`. Thicker text is
/// drawn as repeated passes shifted one pixel to the right.
pub fn draw_text(frame: &mut Frame, text: &str, origin: Point, scale: f32, rgb: [u8; 3], thickness: u32) {
    let Some(font) = label_font() else {
        return;
    };
    let px = PxScale::from(LABEL_BASE_PX * scale);
    let top = origin.y - font.as_scaled(px).ascent().round() as i32;

    let color = frame.native_pixel(rgb);
    let Some(mut canvas) = frame.pixels_mut() else {
        return;
    };
    for pass in 0..thickness.max(1) as i32 {
        draw_text_mut(&mut canvas, color, origin.x + pass, top, px, font, text);
    }
}
