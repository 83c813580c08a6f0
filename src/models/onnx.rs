//! ONNX Runtime backed churn classifier (xgboost / lightgbm exports)

use crate::error::{ServingError, ServingResult};
use crate::models::model::{ChurnModel, ModelCapabilities};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

static RUNTIME: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize ONNX Runtime once per process. Later calls return the outcome
/// of the first one.
pub fn init_runtime() -> Result<()> {
    RUNTIME
        .get_or_init(|| {
            let committed = commit_environment().map_err(|e| e.to_string());
            if committed.is_ok() {
                debug!("ONNX Runtime initialized");
            }
            committed
        })
        .clone()
        .map_err(|e| anyhow::anyhow!("ONNX Runtime initialization failed: {e}"))
}

fn commit_environment() -> Result<()> {
    ort::init().commit()?;
    Ok(())
}

/// Loaded ONNX session with resolved input/output names
pub struct OnnxModel {
    name: String,
    /// Runs need exclusive access to the session
    session: Mutex<Session>,
    input_name: String,
    output_name: Option<String>,
}

impl OnnxModel {
    /// Load a model from file
    pub fn load<P: AsRef<Path>>(path: P, name: &str, onnx_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        init_runtime()?;

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // Classifier exports carry a probability output next to the label;
        // regressors only have the label/variable output.
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        info!(
            model = %name,
            input = %input_name,
            output = ?output_name,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn run(&self, features: &[f64]) -> Result<f64> {
        let output_name = self
            .output_name
            .as_deref()
            .context("model has no probability output")?;

        let shape = vec![1_i64, features.len() as i64];
        let values: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, values)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        self.extract_probability(&outputs, output_name)
    }

    /// Churn probability from either a `[batch, classes]` tensor or a
    /// `seq(map(int64, float))` output.
    fn extract_probability(&self, outputs: &SessionOutputs, output_name: &str) -> Result<f64> {
        let output = outputs
            .get(output_name)
            .with_context(|| format!("output {output_name} missing from run"))?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_class_from_tensor(&dims, data)?;
            debug!(model = %self.name, prob = prob, "Extracted from tensor");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.extract_from_sequence_map(output);
        }

        anyhow::bail!("unsupported probability output type for {}", self.name)
    }

    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<f64> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps.first().context("Empty sequence")?;
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
            debug!(model = %self.name, prob = *prob, "Extracted from seq(map)");
            return Ok(f64::from(*prob));
        }
        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
            return Ok(1.0 - f64::from(*prob));
        }

        anyhow::bail!("No probability found in map")
    }
}

/// Index 1 of a two-class output, or the single value of a one-column output.
fn positive_class_from_tensor(dims: &[i64], data: &[f32]) -> Result<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    let value = match classes {
        c if c >= 2 => data.get(1),
        1 => data.first(),
        _ => None,
    };
    value
        .map(|v| f64::from(*v))
        .context("probability tensor has no class columns")
}

impl ChurnModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            probability: self.output_name.is_some(),
            ..Default::default()
        }
    }

    fn predict_proba(&self, features: &[f64]) -> ServingResult<f64> {
        self.run(features)
            .map_err(|e| ServingError::Inference(format!("{}: {e:#}", self.name)))
    }
}
