//! Image encoding: `DynamicImage` → PNG bytes, or a base64 PNG data URI for
//! Markdown with embedded images.
//!
//! PNG is lossless, so cropped tables keep crisp text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an element image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// `data:image/png;base64,...` for inline embedding.
pub fn png_data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let png = encode_png(&red()).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn data_uri_is_valid_base64() {
        let uri = png_data_uri(&red()).unwrap();
        let payload = uri.strip_prefix("data:image/png;base64,").expect("prefix");
        let decoded = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
