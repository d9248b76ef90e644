use crate::{
    colormap::class_palette,
    error::{Result, SegmentationError},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageFormat, Luma, RgbImage};
use ndarray::{ArrayView4, Axis};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMap {
    width: u32,
    height: u32,
    classes: Vec<u32>,
}

impl ClassMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.classes[(y * self.width + x) as usize]
    }

    pub fn max_class(&self) -> u32 {
        self.classes.iter().copied().max().unwrap_or(0)
    }

    /// Class indices as 8-bit gray levels, saturating above 255.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([self.get(x, y).min(u8::MAX as u32) as u8])
        })
    }
}

struct AxisSample {
    lo: usize,
    hi: usize,
    weight: f32,
}

// Half-pixel source coordinates, i.e. bilinear with align_corners=false.
fn axis_samples(in_size: usize, out_size: usize) -> Vec<AxisSample> {
    let scale = in_size as f32 / out_size as f32;
    (0..out_size)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (src as usize).min(in_size - 1);
            let hi = if lo < in_size - 1 { lo + 1 } else { lo };
            AxisSample {
                lo,
                hi,
                weight: src - lo as f32,
            }
        })
        .collect()
}

/// Upsamples (1, C, h, w) logits to `width` x `height` and takes the arg-max class per pixel.
///
/// Ties resolve to the lowest class index.
pub fn upsample_argmax(logits: ArrayView4<f32>, width: u32, height: u32) -> Result<ClassMap> {
    let (batch, num_classes, in_h, in_w) = logits.dim();
    if batch != 1 || num_classes == 0 || in_h == 0 || in_w == 0 {
        return Err(SegmentationError::Inference(format!(
            "unexpected logits shape {:?}",
            logits.shape()
        )));
    }
    if width == 0 || height == 0 {
        return Err(SegmentationError::Decode(format!(
            "image has empty dimensions {}x{}",
            width, height
        )));
    }

    let logits = logits.index_axis(Axis(0), 0);
    let rows = axis_samples(in_h, height as usize);
    let cols = axis_samples(in_w, width as usize);

    let mut classes = Vec::with_capacity(width as usize * height as usize);
    for row in &rows {
        for col in &cols {
            let mut best_class = 0;
            let mut best_value = f32::NEG_INFINITY;
            for (class, plane) in logits.outer_iter().enumerate() {
                let top = (1.0 - col.weight) * plane[[row.lo, col.lo]]
                    + col.weight * plane[[row.lo, col.hi]];
                let bottom = (1.0 - col.weight) * plane[[row.hi, col.lo]]
                    + col.weight * plane[[row.hi, col.hi]];
                let value = (1.0 - row.weight) * top + row.weight * bottom;
                if value > best_value {
                    best_value = value;
                    best_class = class as u32;
                }
            }
            classes.push(best_class);
        }
    }

    Ok(ClassMap {
        width,
        height,
        classes,
    })
}

pub fn colorize(class_map: &ClassMap) -> RgbImage {
    let palette = class_palette(class_map.max_class() as usize);
    RgbImage::from_fn(class_map.width, class_map.height, |x, y| {
        let class = class_map.get(x, y) as usize;
        palette[class.min(palette.len() - 1)]
    })
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| SegmentationError::io("Failed to encode PNG", std::io::Error::other(e)))?;
    Ok(buffer)
}

pub fn encode_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}
