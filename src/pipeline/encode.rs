//! Image encoding for the recognisers.
//!
//! Tesseract reads a PNG file; vision LLM APIs take a base64 data URI.
//! PNG is lossless, and JPEG artefacts around glyph edges hurt recognition
//! far more than the extra bytes cost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded page image → {} bytes PNG", buf.len());
    Ok(buf)
}

/// Encode a rasterised page as a base64 PNG ready for a vision API.
///
/// `detail: "high"` lets GPT-4-class models tile the image at full
/// resolution; the low-detail overview loses small print.
pub fn encode_image_data(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
