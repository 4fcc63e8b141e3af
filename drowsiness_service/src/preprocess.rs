use crate::{config::ResizeMode, detection::BoundingBox};
use image::{imageops::FilterType, Rgb, RgbImage};
use ndarray::{Array, Ix4};

/// Gray used by YOLOv5 to pad letterboxed inputs.
const LETTERBOX_FILL: u8 = 114;

/// Maps coordinates of the model input back onto the original frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl InputTransform {
    pub fn new(img_width: u32, img_height: u32, input_size: u32, mode: ResizeMode) -> Self {
        let size = input_size as f32;
        let (width, height) = (img_width.max(1) as f32, img_height.max(1) as f32);

        match mode {
            ResizeMode::Stretch => Self {
                scale_x: size / width,
                scale_y: size / height,
                pad_x: 0.,
                pad_y: 0.,
            },
            ResizeMode::Letterbox => {
                let scale = (size / width).min(size / height);
                let (resized_width, resized_height) = scaled_dimensions(img_width, img_height, scale);
                Self {
                    scale_x: scale,
                    scale_y: scale,
                    pad_x: (input_size.saturating_sub(resized_width) / 2) as f32,
                    pad_y: (input_size.saturating_sub(resized_height) / 2) as f32,
                }
            }
        }
    }

    pub fn box_to_original(&self, xc: f32, yc: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox::from_center(
            (xc - self.pad_x) / self.scale_x,
            (yc - self.pad_y) / self.scale_y,
            w / self.scale_x,
            h / self.scale_y,
        )
    }
}

fn scaled_dimensions(img_width: u32, img_height: u32, scale: f32) -> (u32, u32) {
    (
        ((img_width as f32 * scale).round() as u32).max(1),
        ((img_height as f32 * scale).round() as u32).max(1),
    )
}

/// Builds the NCHW `[1, 3, size, size]` tensor fed to the detector, scaled to [0, 1].
pub fn transform_image(
    image: &RgbImage,
    input_size: u32,
    mode: ResizeMode,
) -> (Array<f32, Ix4>, InputTransform) {
    let (img_width, img_height) = image.dimensions();
    let transform = InputTransform::new(img_width, img_height, input_size, mode);

    let canvas = match mode {
        ResizeMode::Stretch => {
            image::imageops::resize(image, input_size, input_size, FilterType::CatmullRom)
        }
        ResizeMode::Letterbox => {
            let (width, height) = scaled_dimensions(img_width, img_height, transform.scale_x);
            let resized = image::imageops::resize(image, width, height, FilterType::CatmullRom);
            let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([LETTERBOX_FILL; 3]));
            image::imageops::replace(
                &mut canvas,
                &resized,
                transform.pad_x as i64,
                transform.pad_y as i64,
            );
            canvas
        }
    };

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, transform)
}
