//! Image preprocessing ahead of OCR: grayscale + hard contrast threshold.
//!
//! The transform is deliberately crude — prescriptions are high-contrast
//! documents, and a fixed-cutoff binarization measurably improves engine
//! accuracy on phone photos without any per-image tuning.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, Rgba, RgbaImage};

use super::OcrError;

/// Luminance cutoff: channel average below this becomes pure black,
/// everything else pure white.
const THRESHOLD: u16 = 120;

/// Maximum input size before rejecting. Guards against corrupt or
/// adversarial files blowing up the decoder.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Binarize an image: grayscale by channel average, then hard-threshold into
/// black/white. Returns PNG bytes. Pure transform; only decode/encode
/// failures error.
pub fn binarize(image_bytes: &[u8]) -> Result<Vec<u8>, OcrError> {
    if image_bytes.len() > MAX_IMAGE_BYTES {
        return Err(OcrError::ImageProcessing(format!(
            "Image too large: {} bytes (max {})",
            image_bytes.len(),
            MAX_IMAGE_BYTES
        )));
    }

    let decoded = ImageReader::new(Cursor::new(image_bytes))
        .with_guessed_format()
        .map_err(|e| OcrError::ImageProcessing(format!("Format detection failed: {e}")))?
        .decode()
        .map_err(|e| OcrError::ImageProcessing(format!("Image decode failed: {e}")))?;

    let mut rgba: RgbaImage = decoded.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        let value = if avg < THRESHOLD { 0 } else { 255 };
        *pixel = Rgba([value, value, value, a]);
    }

    let mut out = Cursor::new(Vec::new());
    rgba.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| OcrError::ImageProcessing(format!("PNG encode failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn output_is_pure_black_and_white() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(0, 0, Rgba([10, 10, 10, 255])); // dark -> black
        img.put_pixel(1, 0, Rgba([200, 200, 200, 255])); // light -> white
        img.put_pixel(2, 0, Rgba([119, 119, 119, 255])); // just below cutoff
        img.put_pixel(3, 0, Rgba([120, 120, 120, 255])); // at cutoff

        let out = binarize(&png_bytes(&img)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0[..3], [0, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0[..3], [255, 255, 255]);
        assert_eq!(decoded.get_pixel(2, 0).0[..3], [0, 0, 0]);
        assert_eq!(decoded.get_pixel(3, 0).0[..3], [255, 255, 255]);
    }

    #[test]
    fn grayscale_uses_channel_average() {
        // (240 + 0 + 120) / 3 = 120 -> white despite the dark green channel
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([240, 0, 120, 255]));

        let out = binarize(&png_bytes(&img)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0[..3], [255, 255, 255]);
    }

    #[test]
    fn preserves_dimensions() {
        let img = RgbaImage::new(17, 9);
        let out = binarize(&png_bytes(&img)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 9);
    }

    #[test]
    fn idempotent_on_binarized_input() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([30, 60, 90, 255]));
        img.put_pixel(1, 1, Rgba([250, 250, 250, 255]));

        let once = binarize(&png_bytes(&img)).unwrap();
        let twice = binarize(&once).unwrap();
        let a = image::load_from_memory(&once).unwrap().to_rgba8();
        let b = image::load_from_memory(&twice).unwrap().to_rgba8();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result = binarize(b"not an image at all");
        assert!(matches!(result, Err(OcrError::ImageProcessing(_))));
    }
}
