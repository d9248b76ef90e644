use crate::error::{Result, SegmentationError};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};

pub const INPUT_SIZE: u32 = 512;

// ImageNet statistics the SegFormer encoder was trained with
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub fn transform_image(image: &DynamicImage) -> Result<Array<f32, Ix4>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentationError::Decode(format!(
            "image has empty dimensions {}x{}",
            width, height
        )));
    }

    let resized = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let size = INPUT_SIZE as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            input[[0, c, y, x]] = ((*value as f32) / 255. - MEAN[c]) / STD[c];
        }
    }

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    #[test]
    fn test_transform_image_shape_and_normalization() {
        let img: RgbImage = ImageBuffer::from_pixel(100, 60, Rgb([255, 0, 128]));
        let tensor = transform_image(&DynamicImage::ImageRgb8(img)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 512, 512]);

        let red = (1.0 - MEAN[0]) / STD[0];
        let green = (0.0 - MEAN[1]) / STD[1];
        assert!((tensor[[0, 0, 10, 10]] - red).abs() < 1e-5);
        assert!((tensor[[0, 1, 300, 500]] - green).abs() < 1e-5);
    }

    #[test]
    fn test_transform_image_converts_rgba() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 0]));
        let tensor = transform_image(&DynamicImage::ImageRgba8(img)).unwrap();

        let black = (0.0 - MEAN[2]) / STD[2];
        assert!((tensor[[0, 2, 0, 0]] - black).abs() < 1e-5);
    }

    #[test]
    fn test_transform_image_rejects_empty_image() {
        let img: RgbImage = ImageBuffer::new(0, 10);
        let result = transform_image(&DynamicImage::ImageRgb8(img));

        assert!(matches!(result, Err(SegmentationError::Decode(_))));
    }
}
