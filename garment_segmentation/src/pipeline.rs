use crate::{
    config::DebugArtifactsConfig,
    error::{Result, SegmentationError},
    model_service::SegmentationModel,
    postprocess::{colorize, encode_base64, encode_png, upsample_argmax, ClassMap},
    preprocess::transform_image,
};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;
use std::{sync::Arc, time::Instant};
use tracing::instrument;

pub struct SegmentedImage {
    pub class_map: ClassMap,
    pub colorized: RgbImage,
    pub png: Vec<u8>,
}

impl SegmentedImage {
    pub fn to_base64(&self) -> String {
        encode_base64(&self.png)
    }
}

pub struct SegmentationPipeline<M: SegmentationModel> {
    model: Arc<M>,
    debug_artifacts: DebugArtifactsConfig,
}

impl<M: SegmentationModel> SegmentationPipeline<M> {
    pub fn new(model: M, debug_artifacts: DebugArtifactsConfig) -> Self {
        Self {
            model: Arc::new(model),
            debug_artifacts,
        }
    }

    #[instrument(skip_all)]
    pub fn segment(&self, image: &DynamicImage) -> Result<SegmentedImage> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let input = transform_image(image)?;
        let logits = self.model.infer(input.view())?;
        self.check_logits(&logits)?;

        let class_map = upsample_argmax(logits.view(), width, height)?;
        let colorized = colorize(&class_map);
        let png = encode_png(&colorized)?;

        if self.debug_artifacts.enabled {
            self.write_debug_artifacts(&class_map, &colorized);
        }

        tracing::debug!(
            "Segmented {}x{} image, max class {}, in {} ms",
            width,
            height,
            class_map.max_class(),
            start.elapsed().as_millis()
        );

        Ok(SegmentedImage {
            class_map,
            colorized,
            png,
        })
    }

    fn check_logits(&self, logits: &Array4<f32>) -> Result<()> {
        let (batch, num_classes, _, _) = logits.dim();
        if batch != 1 || num_classes != self.model.num_classes() {
            return Err(SegmentationError::Inference(format!(
                "expected logits of shape (1, {}, h, w), got {:?}",
                self.model.num_classes(),
                logits.shape()
            )));
        }
        Ok(())
    }

    fn write_debug_artifacts(&self, class_map: &ClassMap, colorized: &RgbImage) {
        if let Err(e) = class_map
            .to_gray_image()
            .save(&self.debug_artifacts.segmented_path)
        {
            tracing::warn!(
                "Failed to write {:?}: {}",
                self.debug_artifacts.segmented_path,
                e
            );
        }
        if let Err(e) = colorized.save(&self.debug_artifacts.colormap_path) {
            tracing::warn!(
                "Failed to write {:?}: {}",
                self.debug_artifacts.colormap_path,
                e
            );
        }
    }
}
