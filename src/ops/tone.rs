// ============================================================================
// TONE STAGE — brightness/contrast LUT, highlight/shadow curve, hue/sat, sharpen
// ============================================================================

use image::RgbImage;
use rayon::prelude::*;

use crate::ops::color::{hsv_to_rgb, rgb_to_hsv};
use crate::ops::filters;

/// Unsharp-mask gain applied at sharpness = 100.
pub const SHARPEN_GAIN: f32 = 1.6;
/// Blur radius (sigma) of the unsharp mask.
pub const SHARPEN_SIGMA: f32 = 1.0;

/// Build the combined brightness + contrast lookup table.
///
/// `brightness`: -100..100 (additive offset)
/// `contrast`: -100..100 (multiplier around the 128 midpoint)
///
/// With both at 0 the table is the identity function.
pub fn build_bc_lut(brightness: i32, contrast: i32) -> [u8; 256] {
    let b = brightness as f32;
    let c = contrast as f32;
    let factor = (259.0 * (c + 255.0)) / (255.0 * (259.0 - c));

    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let mut x = i as f32 + b;
        if contrast != 0 {
            x = factor * (x - 128.0) + 128.0;
        }
        *v = x.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Build the highlight/shadow shaping curve.
///
/// `highlights`, `shadows`: -100..100. Works on normalized values:
/// shadows are lifted/crushed through a `1 - sqrt(x)` weight (strong in the
/// dark end), highlights through an `x^2` weight (strong in the bright end).
pub fn build_tone_curve_lut(highlights: i32, shadows: i32) -> [u8; 256] {
    let hi = highlights as f32 / 100.0;
    let sh = shadows as f32 / 100.0;

    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let mut x = i as f32 / 255.0;
        if shadows != 0 {
            x += (1.0 - x.sqrt()) * sh * 0.5;
        }
        if highlights != 0 {
            let xc = x.clamp(0.0, 1.0);
            x += xc * xc * hi * 0.5;
        }
        *v = (x * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Tuple-keyed memo for the two tone LUTs.  A table is rebuilt only when its
/// own parameter pair changes, so e.g. dragging the hue slider never touches
/// the brightness/contrast table.
#[derive(Default)]
pub struct ToneLutCache {
    bc: Option<((i32, i32), [u8; 256])>,
    curve: Option<((i32, i32), [u8; 256])>,
}

impl ToneLutCache {
    pub fn bc_lut(&mut self, brightness: i32, contrast: i32) -> &[u8; 256] {
        let key = (brightness, contrast);
        if self.bc.as_ref().map(|(k, _)| *k) != Some(key) {
            self.bc = Some((key, build_bc_lut(brightness, contrast)));
        }
        &self.bc.as_ref().unwrap().1
    }

    pub fn curve_lut(&mut self, highlights: i32, shadows: i32) -> &[u8; 256] {
        let key = (highlights, shadows);
        if self.curve.as_ref().map(|(k, _)| *k) != Some(key) {
            self.curve = Some((key, build_tone_curve_lut(highlights, shadows)));
        }
        &self.curve.as_ref().unwrap().1
    }
}

/// Apply a single LUT to all three channels, parallel by row.
pub fn apply_lut(img: &RgbImage, lut: &[u8; 256]) -> RgbImage {
    let w = img.width() as usize;
    let h = img.height() as usize;
    let src_raw = img.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (out, &v) in row_out.iter_mut().zip(row_in.iter()) {
            *out = lut[v as usize];
        }
    });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Hue rotation + saturation scaling in one HSV pass.
///
/// `hue`: -180..180 degrees. Computed in f32 so repeated rotations do not
/// quantize into color banding.
/// `saturation`: -100..100 (0 = no change).
pub fn apply_hue_saturation(img: &RgbImage, hue: i32, saturation: i32) -> RgbImage {
    if hue == 0 && saturation == 0 {
        return img.clone();
    }
    let shift = hue as f32;
    let sat_factor = 1.0 + saturation as f32 / 100.0;

    filters::map_pixels(img, move |r, g, b| {
        let (h, s, v) = rgb_to_hsv(r / 255.0, g / 255.0, b / 255.0);
        let nh = (h + shift).rem_euclid(360.0);
        let ns = (s * sat_factor).clamp(0.0, 1.0);
        let (nr, ng, nb) = hsv_to_rgb(nh, ns, v);
        (nr * 255.0, ng * 255.0, nb * 255.0)
    })
}

/// Unsharp-mask sharpen: `out = src + amount * (src - blurred)`.
/// `sharpness`: 0..100; 0 is a no-op.
pub fn sharpen(img: &RgbImage, sharpness: i32) -> RgbImage {
    if sharpness <= 0 {
        return img.clone();
    }
    let amount = (sharpness as f32 / 100.0) * SHARPEN_GAIN;
    let blurred = filters::gaussian_blur(img, SHARPEN_SIGMA);

    let w = img.width() as usize;
    let stride = w * 3;
    let src_raw = img.as_raw();
    let blur_raw = blurred.as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let off = y * stride;
        for i in 0..stride {
            let s = src_raw[off + i] as f32;
            let b = blur_raw[off + i] as f32;
            row_out[i] = (s + amount * (s - b)).round().clamp(0.0, 255.0) as u8;
        }
    });

    RgbImage::from_raw(img.width(), img.height(), dst_raw).unwrap()
}
