// ============================================================================
// COMPOSITOR — mask blending, color harmonization, light wrap, ROI blur
// ============================================================================
//
// All functions here read their inputs and allocate a fresh output (or, for
// ROI blur, patch the caller's buffer in place).  Masks are never mutated by
// compositing.  Dimension mismatches between foreground, mask, and
// background are resolved by resampling — the mask's native resolution is
// the compositing frame.
// ============================================================================

use image::{GrayImage, RgbImage, imageops};
use rayon::prelude::*;

use crate::ops::color::{lab_to_rgb, rgb_to_lab};
use crate::ops::filters::{gaussian_blur, gaussian_blur_gray};

/// Share of the color-transferred foreground blended back over the original.
/// Tuned for plausible skin tones; full transfer reads as a color cast.
pub const HARMONIZE_STRENGTH: f32 = 0.5;
/// Share of the luminance statistics transferred (chroma transfers fully).
pub const HARMONIZE_LUMA_TRANSFER: f32 = 0.5;

/// Default additive strength of the light wrap.
pub const LIGHT_WRAP_STRENGTH: f32 = 0.7;
/// Blur applied to the background before it bleeds into the edge band.
pub const LIGHT_WRAP_BG_SIGMA: f32 = 8.0;
/// Width of the edge band (blur of the inverted mask).
pub const EDGE_BAND_SIGMA: f32 = 3.5;

/// Blur strength for manual background-blur regions.
pub const ROI_BLUR_SIGMA: f32 = 12.0;

/// A rectangle in display coordinates (used for manual blur regions).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoiRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Resample a mask with nearest-neighbor sampling, preserving binary class
/// boundaries (a bilinear resize would invent soft values at hard edges).
pub fn resample_mask(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }
    imageops::resize(mask, width, height, imageops::FilterType::Nearest)
}

/// Clean up a raw segmentation mask: erode one pixel to kill halo fringes,
/// then smooth the edge with a light blur.  Returns a new mask.
pub fn refine_mask(mask: &GrayImage) -> GrayImage {
    gaussian_blur_gray(&erode(mask), 0.8)
}

/// 3×3 minimum filter (single iteration).
fn erode(mask: &GrayImage) -> GrayImage {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    let src = mask.as_raw();
    let mut dst = vec![0u8; w * h];

    dst.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let mut min = 255u8;
            for yy in y0..=y1 {
                for xx in x0..=x1 {
                    min = min.min(src[yy * w + xx]);
                }
            }
            row_out[x] = min;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst).unwrap()
}

/// Alpha-composite `fg` over `bg` through `mask`:
/// `out = fg*α + bg*(1-α)`, `α = mask/255`.
///
/// The mask's dimensions define the output; foreground and background are
/// resampled (bilinear) to match when they disagree.
pub fn blend(fg: &RgbImage, mask: &GrayImage, bg: &RgbImage) -> RgbImage {
    let (w, h) = mask.dimensions();
    let fg = fit_to(fg, w, h);
    let bg = fit_to(bg, w, h);

    let w = w as usize;
    let stride = w * 3;
    let fg_raw = fg.as_raw();
    let bg_raw = bg.as_raw();
    let mask_raw = mask.as_raw();
    let mut out_raw = vec![0u8; fg_raw.len()];

    out_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let off = y * stride;
        let mask_row = &mask_raw[y * w..(y + 1) * w];
        for x in 0..w {
            let alpha = mask_row[x] as f32 / 255.0;
            let pi = x * 3;
            for c in 0..3 {
                let f = fg_raw[off + pi + c] as f32;
                let b = bg_raw[off + pi + c] as f32;
                row_out[pi + c] = (f * alpha + b * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbImage::from_raw(fg.width(), fg.height(), out_raw).unwrap()
}

fn fit_to(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        img.clone()
    } else {
        imageops::resize(img, width, height, imageops::FilterType::Triangle)
    }
}

// ---------------------------------------------------------------------------
//  Color harmonization — Reinhard statistics transfer in CIELab
// ---------------------------------------------------------------------------

struct LabStats {
    mean: [f32; 3],
    std: [f32; 3],
}

fn lab_stats(img: &RgbImage) -> LabStats {
    let n = (img.width() as u64 * img.height() as u64).max(1) as f64;
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];

    for p in img.pixels() {
        let (l, a, b) = rgb_to_lab(p[0], p[1], p[2]);
        for (i, v) in [l, a, b].into_iter().enumerate() {
            sum[i] += v as f64;
            sum_sq[i] += (v as f64) * (v as f64);
        }
    }

    let mut mean = [0.0f32; 3];
    let mut std = [0.0f32; 3];
    for i in 0..3 {
        let m = sum[i] / n;
        mean[i] = m as f32;
        std[i] = ((sum_sq[i] / n - m * m).max(0.0)).sqrt() as f32;
    }
    LabStats { mean, std }
}

/// Nudge the foreground's color statistics toward the background's so a
/// composite reads as lit by the same environment.
///
/// Luminance statistics are transferred at [`HARMONIZE_LUMA_TRANSFER`];
/// a/b transfer fully; the result is then blended with the original
/// foreground at `strength` (use [`HARMONIZE_STRENGTH`] for the stock look).
pub fn harmonize(fg: &RgbImage, bg: &RgbImage, strength: f32) -> RgbImage {
    let src = lab_stats(bg);
    let tgt = lab_stats(fg);

    // Degenerate (flat) channels get a floor so the scale stays finite.
    let scale = |i: usize| src.std[i] / tgt.std[i].max(1e-5);
    let (sl, sa, sb) = (scale(0), scale(1), scale(2));

    let k = strength.clamp(0.0, 1.0);
    let lt = HARMONIZE_LUMA_TRANSFER;

    let w = fg.width() as usize;
    let stride = w * 3;
    let fg_raw = fg.as_raw();
    let mut out_raw = vec![0u8; fg_raw.len()];

    out_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let off = y * stride;
        for x in 0..w {
            let pi = x * 3;
            let (r, g, b) = (fg_raw[off + pi], fg_raw[off + pi + 1], fg_raw[off + pi + 2]);
            let (l, a, bb) = rgb_to_lab(r, g, b);

            // L transfers partially, chroma fully.
            let nl = (l - tgt.mean[0]) * sl * lt + src.mean[0] * lt + tgt.mean[0] * (1.0 - lt);
            let na = (a - tgt.mean[1]) * sa + src.mean[1];
            let nb = (bb - tgt.mean[2]) * sb + src.mean[2];

            let (tr, tg, tb) = lab_to_rgb(nl, na, nb);
            row_out[pi] = (tr as f32 * k + r as f32 * (1.0 - k)).round() as u8;
            row_out[pi + 1] = (tg as f32 * k + g as f32 * (1.0 - k)).round() as u8;
            row_out[pi + 2] = (tb as f32 * k + b as f32 * (1.0 - k)).round() as u8;
        }
    });

    RgbImage::from_raw(fg.width(), fg.height(), out_raw).unwrap()
}

// ---------------------------------------------------------------------------
//  Light wrap — bleed blurred background light into the foreground edge
// ---------------------------------------------------------------------------

/// Additively blend a heavily blurred background into a ring just inside the
/// mask boundary, removing the cardboard-cutout look of a hard edge.
///
/// The ring is `blur(inverted mask) ∩ mask`: zero deep inside the
/// foreground, zero outside it, strongest right at the boundary.
pub fn light_wrap(
    composite: &RgbImage,
    mask: &GrayImage,
    bg: &RgbImage,
    strength: f32,
) -> RgbImage {
    let (w, h) = composite.dimensions();
    let mask = resample_mask(mask, w, h);
    let bg = fit_to(bg, w, h);

    let bg_blur = gaussian_blur(&bg, LIGHT_WRAP_BG_SIGMA);

    // Edge band: invert, blur, intersect with the original mask.
    let mut inv = mask.clone();
    for p in inv.pixels_mut() {
        p[0] = 255 - p[0];
    }
    let band = gaussian_blur_gray(&inv, EDGE_BAND_SIGMA);

    let w = w as usize;
    let stride = w * 3;
    let comp_raw = composite.as_raw();
    let blur_raw = bg_blur.as_raw();
    let mask_raw = mask.as_raw();
    let band_raw = band.as_raw();
    let mut out_raw = vec![0u8; comp_raw.len()];

    out_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let off = y * stride;
        let row = y * w;
        for x in 0..w {
            let ring = (band_raw[row + x] as f32 / 255.0) * (mask_raw[row + x] as f32 / 255.0);
            let gain = ring * strength;
            let pi = x * 3;
            for c in 0..3 {
                let base = comp_raw[off + pi + c] as f32;
                let light = blur_raw[off + pi + c] as f32 * gain;
                row_out[pi + c] = (base + light).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    RgbImage::from_raw(composite.width(), composite.height(), out_raw).unwrap()
}

// ---------------------------------------------------------------------------
//  Manual blur regions
// ---------------------------------------------------------------------------

/// Blur each display-space rectangle of `img` in place.
///
/// `scale` maps display coordinates to buffer pixels (buffer = display ×
/// scale).  Rects that collapse below one pixel after clamping are skipped.
pub fn blur_regions(img: &mut RgbImage, rects: &[RoiRect], scale: (f32, f32)) {
    let (w, h) = img.dimensions();
    for rect in rects {
        let x = (rect.x * scale.0).round().max(0.0) as u32;
        let y = (rect.y * scale.1).round().max(0.0) as u32;
        let x2 = ((rect.x + rect.w) * scale.0).round().clamp(0.0, w as f32) as u32;
        let y2 = ((rect.y + rect.h) * scale.1).round().clamp(0.0, h as f32) as u32;
        if x2 <= x + 1 || y2 <= y + 1 || x >= w || y >= h {
            continue;
        }

        let sub = imageops::crop_imm(img, x, y, x2 - x, y2 - y).to_image();
        let blurred = gaussian_blur(&sub, ROI_BLUR_SIGMA);
        imageops::replace(img, &blurred, x as i64, y as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb(rgb))
    }

    #[test]
    fn full_mask_returns_foreground() {
        let fg = solid(8, 8, [200, 10, 30]);
        let bg = solid(8, 8, [0, 255, 0]);
        let mask = GrayImage::from_pixel(8, 8, image::Luma([255]));
        assert_eq!(blend(&fg, &mask, &bg), fg);
    }

    #[test]
    fn empty_mask_returns_background() {
        let fg = solid(8, 8, [200, 10, 30]);
        let bg = solid(8, 8, [0, 255, 0]);
        let mask = GrayImage::from_pixel(8, 8, image::Luma([0]));
        assert_eq!(blend(&fg, &mask, &bg), bg);
    }

    #[test]
    fn blend_is_monotonic_in_mask() {
        let fg = solid(4, 4, [250, 250, 250]);
        let bg = solid(4, 4, [5, 5, 5]);
        let mut prev = 0u8;
        for m in [0u8, 32, 64, 128, 192, 255] {
            let mask = GrayImage::from_pixel(4, 4, image::Luma([m]));
            let out = blend(&fg, &mask, &bg).get_pixel(0, 0)[0];
            assert!(out >= prev, "mask {} produced {} < {}", m, out, prev);
            prev = out;
        }
    }

    #[test]
    fn mask_resolution_is_the_compositing_frame() {
        let fg = solid(16, 16, [255, 0, 0]);
        let bg = solid(4, 4, [0, 0, 255]);
        let mask = GrayImage::from_pixel(8, 8, image::Luma([255]));
        let out = blend(&fg, &mask, &bg);
        assert_eq!(out.dimensions(), (8, 8));
    }

    #[test]
    fn nearest_resampling_keeps_mask_binary() {
        let mask = GrayImage::from_fn(4, 4, |x, _| {
            image::Luma([if x < 2 { 255 } else { 0 }])
        });
        let up = resample_mask(&mask, 9, 9);
        for p in up.pixels() {
            assert!(p[0] == 0 || p[0] == 255);
        }
    }

    #[test]
    fn light_wrap_never_darkens() {
        let comp = solid(16, 16, [100, 100, 100]);
        let bg = solid(16, 16, [255, 255, 255]);
        let mask = GrayImage::from_fn(16, 16, |x, _| {
            image::Luma([if x >= 8 { 255 } else { 0 }])
        });
        let out = light_wrap(&comp, &mask, &bg, LIGHT_WRAP_STRENGTH);
        for (p, q) in comp.pixels().zip(out.pixels()) {
            assert!(q[0] >= p[0]);
        }
    }

    #[test]
    fn harmonize_at_zero_strength_is_identity() {
        let fg = RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 20) as u8, 80, (y * 20) as u8]));
        let bg = solid(8, 8, [10, 200, 90]);
        assert_eq!(harmonize(&fg, &bg, 0.0), fg);
    }

    #[test]
    fn blur_regions_only_touches_the_rect() {
        let mut img = RgbImage::from_fn(40, 40, |x, y| {
            image::Rgb([if (x / 2 + y / 2) % 2 == 0 { 255 } else { 0 }, 0, 0])
        });
        let before = img.clone();
        blur_regions(&mut img, &[RoiRect { x: 0.0, y: 0.0, w: 10.0, h: 10.0 }], (2.0, 2.0));
        // Outside the 20×20 blurred block nothing changed
        for y in 0..40 {
            for x in 0..40 {
                if x >= 20 || y >= 20 {
                    assert_eq!(img.get_pixel(x, y), before.get_pixel(x, y));
                }
            }
        }
        // Inside, the checker contrast collapsed
        assert_ne!(img.get_pixel(5, 5), before.get_pixel(5, 5));
    }
}
