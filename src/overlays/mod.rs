// ============================================================================
// OVERLAYS — transient paint/placement layers merged into the base on commit
// ============================================================================
//
// Every overlay follows the same lifecycle: `activate` allocates a
// transparent working buffer sized to the image rect, paint/place calls
// mutate only that buffer (the base image is read-only until commit),
// `commit` alpha-merges the buffer into the base and clears the overlay,
// `cancel` just clears.  A commit with no paint operations returns a
// pixel-identical base.
// ============================================================================

pub mod doodle;
pub mod label;
pub mod mosaic;
pub mod placed;
pub mod sticker;

use image::{GrayImage, RgbImage, RgbaImage, imageops};
use rayon::prelude::*;

/// Straight-alpha merge of an RGBA overlay over an RGB base:
/// `out = overlay*α + base*(1-α)`.
///
/// The overlay is resampled to the base's dimensions when the two disagree
/// (an overlay activated against a display rect at a different scale).
pub fn merge_down(base: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    let (w, h) = base.dimensions();
    let overlay = if overlay.dimensions() == (w, h) {
        overlay.clone()
    } else {
        imageops::resize(overlay, w, h, imageops::FilterType::Triangle)
    };

    let w = w as usize;
    let base_stride = w * 3;
    let over_stride = w * 4;
    let base_raw = base.as_raw();
    let over_raw = overlay.as_raw();
    let mut out_raw = vec![0u8; base_raw.len()];

    out_raw.par_chunks_mut(base_stride).enumerate().for_each(|(y, row_out)| {
        let base_off = y * base_stride;
        let over_off = y * over_stride;
        for x in 0..w {
            let bi = x * 3;
            let oi = x * 4;
            let alpha = over_raw[over_off + oi + 3] as f32 / 255.0;
            for c in 0..3 {
                let o = over_raw[over_off + oi + c] as f32;
                let b = base_raw[base_off + bi + c] as f32;
                row_out[bi + c] = (o * alpha + b * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbImage::from_raw(base.width(), base.height(), out_raw).unwrap()
}

// ---------------------------------------------------------------------------
//  Shared brush rasterization (circle stamps, dense sub-pixel stepping)
// ---------------------------------------------------------------------------

/// Stamp a filled circle into an RGBA layer.  `color = None` clears alpha
/// (eraser); `Some` overwrites the pixel with the stroke color.
pub(crate) fn stamp_circle_rgba(
    layer: &mut RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    color: Option<[u8; 4]>,
) {
    let w = layer.width() as i32;
    let h = layer.height() as i32;
    let r2 = radius * radius;
    let x0 = ((cx - radius).floor() as i32).max(0);
    let x1 = ((cx + radius).ceil() as i32).min(w - 1);
    let y0 = ((cy - radius).floor() as i32).max(0);
    let y1 = ((cy + radius).ceil() as i32).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let p = layer.get_pixel_mut(x as u32, y as u32);
            match color {
                Some(c) => p.0 = c,
                None => p.0[3] = 0,
            }
        }
    }
}

/// Stamp a filled circle of `value` into a single-channel mask.
pub(crate) fn stamp_circle_gray(mask: &mut GrayImage, cx: f32, cy: f32, radius: f32, value: u8) {
    let w = mask.width() as i32;
    let h = mask.height() as i32;
    let r2 = radius * radius;
    let x0 = ((cx - radius).floor() as i32).max(0);
    let x1 = ((cx + radius).ceil() as i32).min(w - 1);
    let y0 = ((cy - radius).floor() as i32).max(0);
    let y1 = ((cy + radius).ceil() as i32).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                mask.put_pixel(x as u32, y as u32, image::Luma([value]));
            }
        }
    }
}

/// Round-capped thick segment into an RGBA layer: dense circle stamps from
/// `from` to `to` so strokes stay smooth at any drag speed.
pub(crate) fn stroke_segment_rgba(
    layer: &mut RgbaImage,
    from: (f32, f32),
    to: (f32, f32),
    width: f32,
    color: Option<[u8; 4]>,
) {
    let radius = (width * 0.5).max(0.5);
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance < 0.1 {
        stamp_circle_rgba(layer, from.0, from.1, radius, color);
        return;
    }

    let steps = distance.ceil() as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp_circle_rgba(layer, from.0 + dx * t, from.1 + dy * t, radius, color);
    }
}

/// Same dense stepping into a single-channel mask.
pub(crate) fn stroke_segment_gray(
    mask: &mut GrayImage,
    from: (f32, f32),
    to: (f32, f32),
    width: f32,
    value: u8,
) {
    let radius = (width * 0.5).max(0.5);
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance < 0.1 {
        stamp_circle_gray(mask, from.0, from.1, radius, value);
        return;
    }

    let steps = distance.ceil() as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp_circle_gray(mask, from.0 + dx * t, from.1 + dy * t, radius, value);
    }
}

/// Bounding rectangle of a brush segment, inflated by the brush radius plus
/// a safety margin and clamped to the buffer.  Returns `None` when the
/// segment lies fully outside.  This is what bounds incremental repaints.
pub(crate) fn segment_roi(
    from: (f32, f32),
    to: (f32, f32),
    radius: f32,
    margin: f32,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let pad = radius + margin;
    let x0 = (from.0.min(to.0) - pad).floor().max(0.0) as u32;
    let y0 = (from.1.min(to.1) - pad).floor().max(0.0) as u32;
    let x1 = ((from.0.max(to.0) + pad).ceil() as i64).clamp(0, width as i64) as u32;
    let y1 = ((from.1.max(to.1) + pad).ceil() as i64).clamp(0, height as i64) as u32;

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1, y1))
}
