// ============================================================================
// IMAGE I/O — decode to RgbImage, encode with per-format encoders
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbImage};

use crate::error::EngineError;

/// Supported save formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl SaveFormat {
    /// Resolve a format from a file extension; `None` for unknown ones.
    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Webp => "webp",
            SaveFormat::Bmp => "bmp",
        }
    }
}

/// Decode an image file to an RGB buffer.  A failure propagates as a typed
/// error and creates no partial state.
pub fn decode(path: &Path) -> Result<RgbImage, EngineError> {
    let img = image::open(path).map_err(|source| EngineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Decode a single-channel mask (e.g. a segmentation output saved as an
/// image).  Multi-channel inputs collapse to luma.
pub fn decode_mask(path: &Path) -> Result<image::GrayImage, EngineError> {
    let img = image::open(path).map_err(|source| EngineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Encode and write an image to a file.  `quality` applies to JPEG (1-100).
pub fn encode(
    img: &RgbImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let encode_err = |source: image::ImageError| EngineError::Encode {
        path: path.to_path_buf(),
        source,
    };

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder
                .encode(img.as_raw(), img.width(), img.height(), image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
        SaveFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder
                .encode(img.as_raw(), img.width(), img.height(), image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
        SaveFormat::Webp => {
            let dyn_img = DynamicImage::ImageRgb8(img.clone());
            dyn_img.save(path).map_err(encode_err)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder
                .encode(img.as_raw(), img.width(), img.height(), image::ColorType::Rgb8)
                .map_err(encode_err)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failure_is_typed() {
        let err = decode(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = RgbImage::from_fn(20, 15, |x, y| image::Rgb([x as u8, y as u8, 200]));
        encode(&img, &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(decode(&path).unwrap(), img);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SaveFormat::from_extension("JPG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_extension("png"), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::from_extension("tiff"), None);
    }
}
