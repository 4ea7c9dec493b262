// ============================================================================
// GEOMETRY OPERATIONS — quarter turns, flip, free-angle rotation, crop
// ============================================================================

use image::{RgbImage, imageops};
use rayon::prelude::*;

/// Fill for regions a free-angle rotation exposes outside the source.
pub const ROTATION_BORDER_FILL: [u8; 3] = [0, 0, 0];

/// A crop region in normalized coordinates, relative to the image as it
/// appears **after** rotation/flip.  Always stored clamped to [0,1]×[0,1].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl CropRect {
    /// Build a crop rect, clamping every edge into the unit square.
    /// Negative origins are pushed to 0; extents are trimmed so that
    /// x+w ≤ 1 and y+h ≤ 1.
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        let cx = x.clamp(0.0, 1.0);
        let cy = y.clamp(0.0, 1.0);
        Self {
            x: cx,
            y: cy,
            w: w.clamp(0.0, 1.0 - cx),
            h: h.clamp(0.0, 1.0 - cy),
        }
    }

    /// Map to pixel coordinates of a `width`×`height` buffer.
    /// Returns `None` when the clamped rect has no area (degenerate crop is
    /// treated as "no crop", never an error).
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let px = (self.x * width as f32).round() as u32;
        let py = (self.y * height as f32).round() as u32;
        let pw = (self.w * width as f32).round() as u32;
        let ph = (self.h * height as f32).round() as u32;

        let px = px.min(width);
        let py = py.min(height);
        let pw = pw.min(width - px);
        let ph = ph.min(height - py);

        if pw == 0 || ph == 0 {
            return None;
        }
        Some((px, py, pw, ph))
    }
}

/// Rotate by `turns` quarter-turns clockwise (0..=3).
pub fn rotate_quarter(img: &RgbImage, turns: u8) -> RgbImage {
    match turns % 4 {
        1 => imageops::rotate90(img),
        2 => imageops::rotate180(img),
        3 => imageops::rotate270(img),
        _ => img.clone(),
    }
}

/// Mirror left↔right.
pub fn flip_horizontal(img: &RgbImage) -> RgbImage {
    imageops::flip_horizontal(img)
}

/// Free-angle rotation about the image center, clockwise positive degrees.
///
/// Output keeps the input dimensions; exposed corners take
/// `ROTATION_BORDER_FILL`.  Sampling is inverse-mapped bilinear, parallel
/// by row.
pub fn rotate_free(img: &RgbImage, angle_deg: f32) -> RgbImage {
    if angle_deg.abs() < 1e-3 {
        return img.clone();
    }

    let w = img.width() as usize;
    let h = img.height() as usize;
    let cx = w as f32 * 0.5;
    let cy = h as f32 * 0.5;

    // Inverse rotation: for each destination pixel, sample the source at -θ.
    let (sin, cos) = (-angle_deg).to_radians().sin_cos();

    let src_raw = img.as_raw();
    let src_stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw.par_chunks_mut(src_stride).enumerate().for_each(|(dy, row)| {
        let v = dy as f32 - cy;
        for dx in 0..w {
            let u = dx as f32 - cx;
            let src_x = u * cos - v * sin + cx;
            let src_y = u * sin + v * cos + cy;

            let pi = dx * 3;
            let x0 = src_x.floor() as i32;
            let y0 = src_y.floor() as i32;

            if x0 < -1 || y0 < -1 || x0 >= w as i32 || y0 >= h as i32 {
                row[pi..pi + 3].copy_from_slice(&ROTATION_BORDER_FILL);
                continue;
            }

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let sample = |sx: i32, sy: i32| -> [f32; 3] {
                if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                    [
                        ROTATION_BORDER_FILL[0] as f32,
                        ROTATION_BORDER_FILL[1] as f32,
                        ROTATION_BORDER_FILL[2] as f32,
                    ]
                } else {
                    let idx = sy as usize * src_stride + sx as usize * 3;
                    [
                        src_raw[idx] as f32,
                        src_raw[idx + 1] as f32,
                        src_raw[idx + 2] as f32,
                    ]
                }
            };

            let tl = sample(x0, y0);
            let tr = sample(x0 + 1, y0);
            let bl = sample(x0, y0 + 1);
            let br = sample(x0 + 1, y0 + 1);

            for c in 0..3 {
                let top = tl[c] + (tr[c] - tl[c]) * fx;
                let bot = bl[c] + (br[c] - bl[c]) * fx;
                row[pi + c] = (top + (bot - top) * fy).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Slice out a normalized crop region of the current buffer.
/// A degenerate rect returns the image unchanged.
pub fn apply_crop(img: &RgbImage, rect: &CropRect) -> RgbImage {
    match rect.to_pixel_rect(img.width(), img.height()) {
        Some((x, y, w, h)) => imageops::crop_imm(img, x, y, w, h).to_image(),
        None => img.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_rect_clamps_negative_origin() {
        let r = CropRect::new(-0.2, 0.1, 0.9, 0.9);
        assert_eq!(r, CropRect { x: 0.0, y: 0.1, w: 0.9, h: 0.9 });
    }

    #[test]
    fn crop_rect_trims_overhang() {
        let r = CropRect::new(0.5, 0.5, 0.9, 0.9);
        assert!((r.x + r.w - 1.0).abs() < 1e-6);
        assert!((r.y + r.h - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_rect_maps_to_none() {
        let r = CropRect::new(0.4, 0.4, 0.0, 0.5);
        assert_eq!(r.to_pixel_rect(100, 100), None);
        // Sub-pixel extents on a tiny buffer also collapse
        let r = CropRect::new(0.0, 0.0, 0.2, 0.2);
        assert_eq!(r.to_pixel_rect(2, 2), None);
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = RgbImage::new(6, 4);
        assert_eq!(rotate_quarter(&img, 1).dimensions(), (4, 6));
        assert_eq!(rotate_quarter(&img, 2).dimensions(), (6, 4));
        assert_eq!(rotate_quarter(&img, 3).dimensions(), (4, 6));
        assert_eq!(rotate_quarter(&img, 4).dimensions(), (6, 4));
    }

    #[test]
    fn zero_angle_rotation_is_noop() {
        let img = RgbImage::from_fn(5, 5, |x, y| image::Rgb([(x + y) as u8, 0, 0]));
        assert_eq!(rotate_free(&img, 0.0), img);
    }

    #[test]
    fn crop_slices_exact_pixels() {
        let img = RgbImage::from_fn(10, 10, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let out = apply_crop(&img, &CropRect::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!(out.dimensions(), (5, 5));
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(out.get_pixel(x, y), img.get_pixel(x, y));
            }
        }
    }
}
