use crate::{
    config::{ModelConfig, Validatable},
    error::{Result, SegmentationError},
    model_service::SegmentationModel,
};
use ndarray::{Array4, ArrayView4, Ix4};
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::{
    execution_providers::ExecutionProviderDispatch,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[allow(unused_mut)]
fn execution_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    #[cfg(feature = "tensorrt")]
    providers.push(
        TensorRTExecutionProvider::default()
            .with_engine_cache(true)
            .build(),
    );
    #[cfg(feature = "cuda")]
    providers.push(CUDAExecutionProvider::default().build());
    providers
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    input_name: String,
    output_name: String,
    num_classes: usize,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self> {
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_execution_providers(execution_providers())?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<std::result::Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            input_name: model_config.input_name.clone(),
            output_name: model_config.output_name.clone(),
            num_classes: model_config.num_classes,
        })
    }
}

impl SegmentationModel for OrtModelService {
    fn infer(&self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| SegmentationError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let input = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input.view())?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor_ref])?;
        let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        let logits = ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())?
            .into_dimensionality::<Ix4>()?;

        Ok(logits)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
