// ============================================================================
// LOOK FILTERS — named, stateless color transforms + shared blur kernels
// ============================================================================
//
// Every filter is a pure function (RgbImage → RgbImage): output dimensions
// equal input dimensions and no filter holds state between invocations.
// Unknown filter ids resolve to the identity transform.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::ops::color::{hsv_to_rgb, rgb_to_hsv};

/// The closed set of look filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterId {
    #[default]
    None,
    Classic,
    Dawn,
    Pure,
    Mono,
    Metallic,
    Cool,
    Neutral,
    Blossom,
    Fair,
    Caramel,
    Soft,
    Impact,
    Moody,
    Valencia,
    Memory,
    Vintage,
    Childhood,
    Halo,
    Sweet,
    Sentimental,
    Negative,
    Demist,
}

impl FilterId {
    /// Stable string id, used in recipes and on the CLI.
    pub fn id(&self) -> &'static str {
        match self {
            FilterId::None => "none",
            FilterId::Classic => "classic",
            FilterId::Dawn => "dawn",
            FilterId::Pure => "pure",
            FilterId::Mono => "mono",
            FilterId::Metallic => "metallic",
            FilterId::Cool => "cool",
            FilterId::Neutral => "neutral",
            FilterId::Blossom => "blossom",
            FilterId::Fair => "fair",
            FilterId::Caramel => "caramel",
            FilterId::Soft => "soft",
            FilterId::Impact => "impact",
            FilterId::Moody => "moody",
            FilterId::Valencia => "valencia",
            FilterId::Memory => "memory",
            FilterId::Vintage => "vintage",
            FilterId::Childhood => "childhood",
            FilterId::Halo => "halo",
            FilterId::Sweet => "sweet",
            FilterId::Sentimental => "sentimental",
            FilterId::Negative => "negative",
            FilterId::Demist => "demist",
        }
    }

    /// Resolve a string id.  Unknown ids map to `FilterId::None` (identity)
    /// rather than failing, so stale recipes stay loadable.
    pub fn parse(id: &str) -> FilterId {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.id() == id)
            .unwrap_or(FilterId::None)
    }

    pub fn all() -> &'static [FilterId] {
        &[
            FilterId::None,
            FilterId::Classic,
            FilterId::Dawn,
            FilterId::Pure,
            FilterId::Mono,
            FilterId::Metallic,
            FilterId::Cool,
            FilterId::Neutral,
            FilterId::Blossom,
            FilterId::Fair,
            FilterId::Caramel,
            FilterId::Soft,
            FilterId::Impact,
            FilterId::Moody,
            FilterId::Valencia,
            FilterId::Memory,
            FilterId::Vintage,
            FilterId::Childhood,
            FilterId::Halo,
            FilterId::Sweet,
            FilterId::Sentimental,
            FilterId::Negative,
            FilterId::Demist,
        ]
    }
}

/// Apply a look filter.  Identity for `FilterId::None`.
pub fn apply(id: FilterId, img: &RgbImage) -> RgbImage {
    match id {
        FilterId::None => img.clone(),
        // Slightly warm, gentle contrast lift
        FilterId::Classic => channel_scale(img, 1.05, 1.0, 0.95),
        // Purple-tinted shadows
        FilterId::Dawn => color_overlay(img, [100, 80, 120], 0.15),
        // Desaturate a touch, brighten
        FilterId::Pure => hsv_scale(img, 0.8, 1.1),
        FilterId::Mono => desaturate(img),
        // High-contrast black & white
        FilterId::Metallic => equalize_luma(&desaturate(img)),
        FilterId::Cool => channel_scale(img, 0.9, 1.05, 1.1),
        // Low contrast around the midpoint
        FilterId::Neutral => midtone_contrast(img, 0.8),
        FilterId::Blossom => color_overlay(img, [255, 180, 200], 0.15),
        // Simple skin brightening: gain + lift
        FilterId::Fair => map_pixels(img, |r, g, b| (r * 1.1 + 10.0, g * 1.1 + 10.0, b * 1.1 + 10.0)),
        FilterId::Caramel => sepia(img),
        FilterId::Soft => soften(img),
        FilterId::Impact => midtone_contrast(&hsv_scale(img, 1.3, 1.0), 1.3),
        FilterId::Moody => hsv_scale(img, 0.6, 0.8),
        FilterId::Valencia => {
            let warmed = channel_scale(img, 1.1, 1.0, 0.9);
            map_pixels(&warmed, |r, g, b| (r + 20.0, g + 20.0, b + 20.0))
        }
        FilterId::Memory => color_overlay(img, [100, 120, 80], 0.2),
        FilterId::Vintage => color_overlay(img, [240, 230, 140], 0.2),
        FilterId::Childhood => color_overlay(img, [255, 220, 180], 0.15),
        FilterId::Halo => map_pixels(img, |r, g, b| (r * 1.1, g * 1.1, b * 1.1)),
        FilterId::Sweet => color_overlay(img, [255, 200, 255], 0.15),
        FilterId::Sentimental => hsv_scale(img, 0.3, 1.0),
        FilterId::Negative => map_pixels(img, |r, g, b| (255.0 - r, 255.0 - g, 255.0 - b)),
        FilterId::Demist => midtone_contrast(&hsv_scale(img, 1.2, 1.0), 1.2),
    }
}

// ============================================================================
// HELPERS — the building blocks the filters are composed from
// ============================================================================

/// Apply a per-pixel transform in parallel by row.
/// `transform` receives and returns (r, g, b) as f32; output saturates at [0,255].
pub fn map_pixels<F>(img: &RgbImage, transform: F) -> RgbImage
where
    F: Fn(f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    let w = img.width() as usize;
    let h = img.height() as usize;
    let src_raw = img.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 3;
            let (nr, ng, nb) = transform(
                row_in[pi] as f32,
                row_in[pi + 1] as f32,
                row_in[pi + 2] as f32,
            );
            row_out[pi] = nr.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 1] = ng.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 2] = nb.round().clamp(0.0, 255.0) as u8;
        }
    });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Per-channel gain via three 256-entry LUTs.
fn channel_scale(img: &RgbImage, r_gain: f32, g_gain: f32, b_gain: f32) -> RgbImage {
    let lut_r = build_gain_lut(r_gain);
    let lut_g = build_gain_lut(g_gain);
    let lut_b = build_gain_lut(b_gain);
    map_pixels(img, move |r, g, b| {
        (
            lut_r[r as usize] as f32,
            lut_g[g as usize] as f32,
            lut_b[b as usize] as f32,
        )
    })
}

fn build_gain_lut(gain: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i as f32 * gain).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Blend a flat color plate over the image: `img*(1-k) + color*k`.
fn color_overlay(img: &RgbImage, color: [u8; 3], intensity: f32) -> RgbImage {
    let k = intensity.clamp(0.0, 1.0);
    let inv = 1.0 - k;
    let [cr, cg, cb] = color.map(|c| c as f32 * k);
    map_pixels(img, move |r, g, b| (r * inv + cr, g * inv + cg, b * inv + cb))
}

/// Contrast about the 128 midpoint: `(v - 128)*factor + 128`.
fn midtone_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    map_pixels(img, move |r, g, b| {
        (
            (r - 128.0) * factor + 128.0,
            (g - 128.0) * factor + 128.0,
            (b - 128.0) * factor + 128.0,
        )
    })
}

/// Scale saturation and value in HSV space.
fn hsv_scale(img: &RgbImage, s_mul: f32, v_mul: f32) -> RgbImage {
    map_pixels(img, move |r, g, b| {
        let (h, s, v) = rgb_to_hsv(r / 255.0, g / 255.0, b / 255.0);
        let ns = (s * s_mul).clamp(0.0, 1.0);
        let nv = (v * v_mul).clamp(0.0, 1.0);
        let (nr, ng, nb) = hsv_to_rgb(h, ns, nv);
        (nr * 255.0, ng * 255.0, nb * 255.0)
    })
}

/// BT.709 luminance desaturation.
fn desaturate(img: &RgbImage) -> RgbImage {
    map_pixels(img, |r, g, b| {
        let lum = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        (lum, lum, lum)
    })
}

/// Classic sepia matrix.
fn sepia(img: &RgbImage) -> RgbImage {
    map_pixels(img, |r, g, b| {
        (
            0.393 * r + 0.769 * g + 0.189 * b,
            0.349 * r + 0.686 * g + 0.168 * b,
            0.272 * r + 0.534 * g + 0.131 * b,
        )
    })
}

/// Histogram-equalize luminance (applied on an already-desaturated image,
/// so all three channels carry the same value).
fn equalize_luma(img: &RgbImage) -> RgbImage {
    let mut hist = [0u32; 256];
    for p in img.pixels() {
        hist[p[0] as usize] += 1;
    }
    let total: u32 = hist.iter().sum();
    if total == 0 {
        return img.clone();
    }

    // Cumulative distribution → LUT
    let mut lut = [0u8; 256];
    let mut cum = 0u32;
    for i in 0..256 {
        cum += hist[i];
        lut[i] = ((cum as f32 / total as f32) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    map_pixels(img, move |r, _, _| {
        let v = lut[r as usize] as f32;
        (v, v, v)
    })
}

/// Blur-and-blend softening: `img*0.7 + blur(img)*0.3`.
fn soften(img: &RgbImage) -> RgbImage {
    let blurred = gaussian_blur(img, 2.5);
    let src_raw = img.as_raw();
    let blur_raw = blurred.as_raw();
    let stride = img.width() as usize * 3;
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let off = y * stride;
        for i in 0..stride {
            let v = src_raw[off + i] as f32 * 0.7 + blur_raw[off + i] as f32 * 0.3;
            row_out[i] = v.round().clamp(0.0, 255.0) as u8;
        }
    });

    RgbImage::from_raw(img.width(), img.height(), dst_raw).unwrap()
}

// ============================================================================
// PARALLEL SEPARABLE GAUSSIAN BLUR — shared by filters, sharpen, compositor
// ============================================================================

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *k = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Rayon-parallelized separable Gaussian blur for RGB buffers.
/// Edge pixels are clamped (replicated), so borders never darken.
pub fn gaussian_blur(src: &RgbImage, sigma: f32) -> RgbImage {
    let data = blur_channels(src.as_raw(), src.width() as usize, src.height() as usize, 3, sigma);
    RgbImage::from_raw(src.width(), src.height(), data).unwrap()
}

/// Gaussian blur for single-channel (mask) buffers.
pub fn gaussian_blur_gray(src: &GrayImage, sigma: f32) -> GrayImage {
    let data = blur_channels(src.as_raw(), src.width() as usize, src.height() as usize, 1, sigma);
    GrayImage::from_raw(src.width(), src.height(), data).unwrap()
}

fn blur_channels(src_raw: &[u8], w: usize, h: usize, channels: usize, sigma: f32) -> Vec<u8> {
    if w == 0 || h == 0 || sigma <= 0.0 {
        return src_raw.to_vec();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let stride = w * channels;

    let buf_in: Vec<f32> = src_raw.iter().map(|&b| b as f32).collect();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; buf_in.len()];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius as isize)
                        .max(0)
                        .min(w as isize - 1) as usize;
                    acc += row_in[sx * channels + c] * kv;
                }
                row_out[x * channels + c] = acc;
            }
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut buf_v = vec![0.0f32; buf_in.len()];
    buf_v.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius as isize)
                        .max(0)
                        .min(h as isize - 1) as usize;
                    acc += buf_h[sy * stride + x * channels + c] * kv;
                }
                row_out[x * channels + c] = acc;
            }
        }
    });

    buf_v.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect()
}
