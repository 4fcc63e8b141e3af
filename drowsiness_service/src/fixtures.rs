use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(width, height, |x, y| {
        Rgb([(x * 7) as u8, (y * 5) as u8, 128])
    });
    let mut image_data: Vec<u8> = Vec::new();
    img.write_to(&mut Cursor::new(&mut image_data), format)
        .unwrap();
    image_data
}

/// A frame as the browser sends it: `canvas.toDataURL()` output.
pub fn png_data_url(width: u32, height: u32) -> String {
    let png = encode_image(width, height, ImageFormat::Png);
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
