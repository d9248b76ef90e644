use crate::error::Result;
use ndarray::{Array4, ArrayView4};

pub trait SegmentationModel: Send + Sync + 'static {
    /// Maps a (1, 3, H, W) normalized tensor to (1, num_classes, H', W') logits.
    fn infer(&self, input: ArrayView4<f32>) -> Result<Array4<f32>>;

    fn num_classes(&self) -> usize;
}
