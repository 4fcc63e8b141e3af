use base64::{engine::general_purpose::STANDARD, Engine};
use image::RgbImage;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame is not a data URL: expected `<header>,<base64 payload>`")]
    MissingSeparator,
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame payload is not a decodable image: {0}")]
    Image(#[from] image::ImageError),
}

/// Extracts the raw bytes of a data URL such as `data:image/jpeg;base64,/9j/...`.
/// Everything up to the first comma is discarded.
pub fn decode_data_url(frame: &str) -> Result<Vec<u8>, FrameError> {
    let (_header, payload) = frame
        .split_once(',')
        .ok_or(FrameError::MissingSeparator)?;

    Ok(STANDARD.decode(payload)?)
}

pub fn decode_image(image_data: &[u8]) -> Result<RgbImage, FrameError> {
    let image = image::ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;

    Ok(image.to_rgb8())
}

pub fn decode_frame(frame: &str) -> Result<RgbImage, FrameError> {
    let image_data = decode_data_url(frame)?;
    decode_image(&image_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{encode_image, png_data_url};
    use image::ImageFormat;

    #[test]
    fn test_decode_png_frame() {
        let frame = png_data_url(32, 24);

        let image = decode_frame(&frame).unwrap();

        assert_eq!(image.dimensions(), (32, 24));
    }

    #[test]
    fn test_decode_jpeg_frame() {
        let jpeg = encode_image(16, 16, ImageFormat::Jpeg);
        let frame = format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg));

        let image = decode_frame(&frame).unwrap();

        assert_eq!(image.dimensions(), (16, 16));
    }

    #[test]
    fn test_only_first_comma_splits_header() {
        let frame = "data:text/plain;base64,aGVsbG8sd29ybGQ=";

        assert_eq!(decode_data_url(frame).unwrap(), b"hello,world");
        assert!(matches!(
            decode_data_url("data:x,aGk=,aGk="),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            decode_frame("not-a-data-url"),
            Err(FrameError::MissingSeparator)
        ));
        assert!(matches!(decode_frame(""), Err(FrameError::MissingSeparator)));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            decode_frame("data:image/png;base64,@@not base64@@"),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn test_bytes_that_are_not_an_image() {
        let frame = format!("data:image/png;base64,{}", STANDARD.encode(b"definitely not a png"));

        assert!(matches!(decode_frame(&frame), Err(FrameError::Image(_))));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(
            decode_frame("data:image/png;base64,"),
            Err(FrameError::Image(_))
        ));
    }
}
