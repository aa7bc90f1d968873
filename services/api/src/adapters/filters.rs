//! services/api/src/adapters/filters.rs
//!
//! The placeholder restoration filters, built on the `image` and `imageproc` crates.
//! It implements the `ImageRestorationService` port from the `core` crate.

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use restoration_core::domain::{Operation, RestoredImage};
use restoration_core::ports::{ImageRestorationService, PortError, PortResult};
use std::io::Cursor;

/// Formats accepted for uploads.
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Largest upscale result, in pixels. As RGBA8 it stays well inside the
/// decoder's default 512 MiB allocation limit, so results can be decoded again.
pub const MAX_OUTPUT_PIXELS: u64 = 32 * 1024 * 1024;

//=========================================================================================
// Filter Parameters
//=========================================================================================

/// Tuning knobs for the three filters.
#[derive(Debug, Clone, Copy)]
pub struct FilterSettings {
    pub upscale_factor: u32,
    pub median_radius: u32,
    pub blur_sigma: f32,
    pub max_output_pixels: u64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            upscale_factor: 2,
            median_radius: 1,
            blur_sigma: 0.6,
            max_output_pixels: MAX_OUTPUT_PIXELS,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Deterministic stand-ins for the "AI" restoration models.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderFilters {
    settings: FilterSettings,
}

impl PlaceholderFilters {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings }
    }

    fn decode(image: &[u8]) -> PortResult<DynamicImage> {
        let format = image::guess_format(image)
            .map_err(|_| PortError::InvalidInput("unrecognised image format".to_string()))?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(PortError::InvalidInput(format!(
                "unsupported image format {:?}; expected PNG, JPEG, BMP or TIFF",
                format
            )));
        }
        image::load_from_memory_with_format(image, format)
            .map_err(|e| PortError::InvalidInput(format!("failed to decode image: {}", e)))
    }

    fn encode_png(image: &DynamicImage) -> PortResult<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| PortError::Unexpected(format!("failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }

    /// Grayscale, then a warm sepia tint.
    fn colorize(&self, image: &DynamicImage) -> DynamicImage {
        let luma = image.to_luma8();
        let tinted = ImageBuffer::from_fn(luma.width(), luma.height(), |x, y| {
            let l = f32::from(luma.get_pixel(x, y)[0]);
            Rgb([
                tint_channel(l, 1.07, 8.0),
                tint_channel(l, 0.74, 20.0),
                tint_channel(l, 0.43, 10.0),
            ])
        });
        DynamicImage::ImageRgb8(tinted)
    }

    fn upscale(&self, image: &DynamicImage) -> PortResult<DynamicImage> {
        let factor = u64::from(self.settings.upscale_factor);
        let (width, height) = (
            u64::from(image.width()).saturating_mul(factor),
            u64::from(image.height()).saturating_mul(factor),
        );
        let too_large = || {
            PortError::InvalidInput(format!(
                "upscaling to {}x{} exceeds the {} pixel limit",
                width, height, self.settings.max_output_pixels
            ))
        };
        if width.saturating_mul(height) > self.settings.max_output_pixels {
            return Err(too_large());
        }
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(too_large());
        };
        Ok(image.resize_exact(w, h, FilterType::Lanczos3))
    }

    /// Median filter followed by a light Gaussian blur.
    fn denoise(&self, image: &DynamicImage) -> DynamicImage {
        let radius = self.settings.median_radius;
        let rgba = image.to_rgba8();
        let median = median_filter(&rgba, radius, radius);
        DynamicImage::ImageRgba8(gaussian_blur_f32(&median, self.settings.blur_sigma))
    }

    fn note_for(&self, operation: Operation) -> String {
        match operation {
            Operation::Colorize => "grayscale + sepia tint".to_string(),
            Operation::Upscale => format!("lanczos3 x{}", self.settings.upscale_factor),
            Operation::Denoise => format!(
                "median {0}x{0} + gaussian sigma {1}",
                self.settings.median_radius * 2 + 1,
                self.settings.blur_sigma
            ),
            Operation::Story => String::new(),
        }
    }
}

fn tint_channel(luma: f32, gain: f32, offset: f32) -> u8 {
    (luma * gain + offset).round().clamp(0.0, 255.0) as u8
}

//=========================================================================================
// `ImageRestorationService` Trait Implementation
//=========================================================================================

impl ImageRestorationService for PlaceholderFilters {
    fn apply(&self, operation: Operation, image: &[u8]) -> PortResult<RestoredImage> {
        let decoded = Self::decode(image)?;
        let result = match operation {
            Operation::Colorize => self.colorize(&decoded),
            Operation::Upscale => self.upscale(&decoded)?,
            Operation::Denoise => self.denoise(&decoded),
            Operation::Story => {
                return Err(PortError::InvalidInput(
                    "story is not an image operation".to_string(),
                ))
            }
        };

        Ok(RestoredImage {
            bytes: Self::encode_png(&result)?,
            width: result.width(),
            height: result.height(),
            note: self.note_for(operation),
        })
    }

    fn inspect(&self, image: &[u8]) -> PortResult<(u32, u32)> {
        let decoded = Self::decode(image)?;
        Ok((decoded.width(), decoded.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 20) as u8, (y * 20) as u8, ((x + y) * 10) as u8])
        });
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn test_upscale_doubles_dimensions() {
        let filters = PlaceholderFilters::default();
        let result = filters.apply(Operation::Upscale, &gradient_png(7, 5)).unwrap();

        assert_eq!((result.width, result.height), (14, 10));
        let decoded = decode(&result.bytes);
        assert_eq!((decoded.width(), decoded.height()), (14, 10));
    }

    #[test]
    fn test_colorize_produces_tinted_rgb() {
        let filters = PlaceholderFilters::default();
        let gray = GrayImage::from_pixel(4, 4, Luma([128]));
        let input = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let result = filters.apply(Operation::Colorize, &input).unwrap();
        let rgb = decode(&result.bytes).to_rgb8();
        let px = rgb.get_pixel(0, 0);

        assert_eq!((result.width, result.height), (4, 4));
        assert!(px[0] > px[1] && px[1] > px[2], "expected warm tint, got {:?}", px);
    }

    #[test]
    fn test_denoise_keeps_dimensions_and_smooths_outlier() {
        let filters = PlaceholderFilters::default();
        let mut noisy = GrayImage::from_pixel(9, 9, Luma([50]));
        noisy.put_pixel(4, 4, Luma([255]));
        let input = encode(DynamicImage::ImageLuma8(noisy), ImageFormat::Png);

        let result = filters.apply(Operation::Denoise, &input).unwrap();
        let out = decode(&result.bytes).to_luma8();

        assert_eq!((result.width, result.height), (9, 9));
        assert!(out.get_pixel(4, 4)[0] < 100);
        assert!(result.note.starts_with("median 3x3"));
    }

    #[test]
    fn test_output_is_png() {
        let filters = PlaceholderFilters::default();
        let jpeg = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 6, Rgb([10, 200, 30]))),
            ImageFormat::Jpeg,
        );

        let result = filters.apply(Operation::Colorize, &jpeg).unwrap();
        assert_eq!(image::guess_format(&result.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_bmp_is_accepted() {
        let filters = PlaceholderFilters::default();
        let bmp = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]))),
            ImageFormat::Bmp,
        );

        assert_eq!(filters.inspect(&bmp).unwrap(), (3, 2));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let filters = PlaceholderFilters::default();
        let err = filters.apply(Operation::Denoise, b"definitely not an image").unwrap_err();

        assert!(matches!(err, PortError::InvalidInput(_)));
    }

    #[test]
    fn test_gif_is_rejected() {
        let filters = PlaceholderFilters::default();
        let gif = encode(
            DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]))),
            ImageFormat::Gif,
        );

        assert!(matches!(filters.inspect(&gif), Err(PortError::InvalidInput(_))));
    }

    #[test]
    fn test_story_is_not_a_filter() {
        let filters = PlaceholderFilters::default();
        let err = filters.apply(Operation::Story, &gradient_png(2, 2)).unwrap_err();

        assert!(matches!(err, PortError::InvalidInput(_)));
    }

    #[test]
    fn test_upscale_past_pixel_limit_is_rejected() {
        let filters = PlaceholderFilters::new(FilterSettings {
            max_output_pixels: 100,
            ..FilterSettings::default()
        });

        let err = filters.apply(Operation::Upscale, &gradient_png(7, 5)).unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(msg) if msg.contains("14x10")));
        assert!(filters.apply(Operation::Upscale, &gradient_png(5, 5)).is_ok());
    }

    #[test]
    fn test_pixel_limit_fits_default_decode_allocation() {
        let max_alloc = image::Limits::default().max_alloc.unwrap();
        assert!(MAX_OUTPUT_PIXELS * 4 <= max_alloc);
    }
}
