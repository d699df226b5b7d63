use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

pub fn decode_frame(bytes: &[u8]) -> Result<RgbImage, String> {
    if bytes.is_empty() {
        return Err("Image payload is empty".to_string());
    }
    image::load_from_memory(bytes)
        .map(|image| image.to_rgb8())
        .map_err(|err| format!("Image payload cannot be decoded: {err}"))
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)
        .map_err(|err| format!("JPEG encoding failed: {err}"))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn jpeg_output_decodes_to_the_same_size() {
        let image = RgbImage::from_pixel(64, 32, Rgb([10, 200, 30]));
        let bytes = encode_jpeg(&image, 90).unwrap();
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn rejects_empty_and_garbage_payloads() {
        assert!(decode_frame(&[]).is_err());
        assert!(decode_frame(b"definitely not an image").is_err());
    }
}
