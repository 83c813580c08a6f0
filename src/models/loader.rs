//! Artifact loading and model selection

use crate::config::ArtifactsConfig;
use crate::encoding::CategoricalEncoders;
use crate::error::{ServingError, ServingResult};
use crate::models::model::ChurnModel;
use crate::models::scaler::StandardScaler;
use crate::models::tree::TreeEnsemble;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Serialization format of a model candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// ONNX export, scored through ONNX Runtime
    Onnx,
    /// Native JSON tree ensemble
    TreeEnsemble,
}

impl ModelKind {
    /// Runtime a candidate of this kind needs beyond the crate itself.
    pub fn requires_capability(&self) -> Option<&'static str> {
        match self {
            ModelKind::Onnx => Some("onnxruntime"),
            ModelKind::TreeEnsemble => None,
        }
    }

    /// Whether that runtime was compiled into this build.
    pub fn runtime_available(&self) -> bool {
        match self {
            ModelKind::Onnx => cfg!(feature = "onnx"),
            ModelKind::TreeEnsemble => true,
        }
    }
}

/// One entry of the ordered fallback list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub name: String,
    pub kind: ModelKind,
    pub path: PathBuf,
}

impl ModelCandidate {
    pub fn new(name: impl Into<String>, kind: ModelKind, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }
}

/// Everything needed to score: fitted scaler, encoders and the selected model.
///
/// Immutable once built and shared across callers behind an `Arc`.
pub struct ServingContext {
    scaler: StandardScaler,
    encoders: Arc<CategoricalEncoders>,
    model: Box<dyn ChurnModel>,
}

impl ServingContext {
    pub fn new(
        scaler: StandardScaler,
        encoders: CategoricalEncoders,
        model: Box<dyn ChurnModel>,
    ) -> Self {
        Self {
            scaler,
            encoders: Arc::new(encoders),
            model,
        }
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoders(&self) -> &Arc<CategoricalEncoders> {
        &self.encoders
    }

    pub fn model(&self) -> &dyn ChurnModel {
        self.model.as_ref()
    }
}

impl fmt::Debug for ServingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServingContext")
            .field("model", &self.model.name())
            .field("n_features", &self.scaler.n_features())
            .field("encoders", &self.encoders.len())
            .finish()
    }
}

/// Loads the scaler, the encoder bundle and the first usable model candidate.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    scaler_path: PathBuf,
    encoders_path: PathBuf,
    candidates: Vec<ModelCandidate>,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ArtifactLoader {
    pub fn new(
        scaler_path: impl Into<PathBuf>,
        encoders_path: impl Into<PathBuf>,
        candidates: Vec<ModelCandidate>,
    ) -> Self {
        Self {
            scaler_path: scaler_path.into(),
            encoders_path: encoders_path.into(),
            candidates,
            onnx_threads: 1,
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self::new(
            &config.scaler_path,
            &config.encoders_path,
            config.models.clone(),
        )
        .with_onnx_threads(config.onnx_threads)
    }

    pub fn with_onnx_threads(mut self, onnx_threads: usize) -> Self {
        self.onnx_threads = onnx_threads.max(1);
        self
    }

    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    /// Build a serving context. Scaler and encoders are mandatory; the model
    /// is the first candidate that loads and exposes class probabilities.
    pub fn load(&self) -> ServingResult<ServingContext> {
        let scaler = self.load_scaler()?;
        let encoders = self.load_encoders()?;
        let model = self.select_model()?;

        info!(
            model = %model.name(),
            n_features = scaler.n_features(),
            encoders = encoders.len(),
            "Serving context ready"
        );

        Ok(ServingContext::new(scaler, encoders, model))
    }

    pub fn load_scaler(&self) -> ServingResult<StandardScaler> {
        let raw = read_artifact("Scaler", &self.scaler_path)?;
        StandardScaler::from_json(&raw).map_err(|reason| ServingError::InvalidArtifact {
            artifact: "Scaler",
            path: self.scaler_path.clone(),
            reason,
        })
    }

    pub fn load_encoders(&self) -> ServingResult<CategoricalEncoders> {
        let raw = read_artifact("Label encoders", &self.encoders_path)?;
        CategoricalEncoders::from_json(&raw).map_err(|e| ServingError::InvalidArtifact {
            artifact: "Label encoders",
            path: self.encoders_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Walk the candidates in order and return the first usable model.
    pub fn select_model(&self) -> ServingResult<Box<dyn ChurnModel>> {
        let mut last_error = None;

        for candidate in &self.candidates {
            if !candidate.path.exists() {
                debug!(
                    model = %candidate.name,
                    path = %candidate.path.display(),
                    "Model file not found, skipping"
                );
                continue;
            }

            if !candidate.kind.runtime_available() {
                warn!(
                    model = %candidate.name,
                    runtime = candidate.kind.requires_capability().unwrap_or("unknown"),
                    "Model runtime not available in this build, skipping"
                );
                continue;
            }

            match self.load_candidate(candidate) {
                Ok(model) if model.capabilities().probability => {
                    info!(
                        model = %candidate.name,
                        kind = ?candidate.kind,
                        path = %candidate.path.display(),
                        "Model selected"
                    );
                    return Ok(model);
                }
                Ok(_) => {
                    warn!(model = %candidate.name, "Model has no probability output, skipping");
                    last_error = Some(format!(
                        "{} does not expose class probabilities",
                        candidate.name
                    ));
                }
                Err(e) => {
                    warn!(model = %candidate.name, error = %e, "Failed to load model, skipping");
                    last_error = Some(format!("{}: {e:#}", candidate.name));
                }
            }
        }

        Err(ServingError::ModelUnavailable {
            tried: self.candidates.iter().map(|c| c.name.clone()).collect(),
            last_error,
        })
    }

    fn load_candidate(&self, candidate: &ModelCandidate) -> Result<Box<dyn ChurnModel>> {
        match candidate.kind {
            ModelKind::TreeEnsemble => {
                let model = TreeEnsemble::load(&candidate.name, &candidate.path)
                    .map_err(anyhow::Error::msg)?;
                Ok(Box::new(model))
            }
            #[cfg(feature = "onnx")]
            ModelKind::Onnx => {
                let model = crate::models::onnx::OnnxModel::load(
                    &candidate.path,
                    &candidate.name,
                    self.onnx_threads,
                )?;
                Ok(Box::new(model))
            }
            #[cfg(not(feature = "onnx"))]
            ModelKind::Onnx => anyhow::bail!("built without ONNX support"),
        }
    }
}

fn read_artifact(artifact: &'static str, path: &Path) -> ServingResult<String> {
    if !path.exists() {
        return Err(ServingError::MissingArtifact {
            artifact,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| ServingError::InvalidArtifact {
        artifact,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Process-wide memo of the serving context.
///
/// The first caller runs the cascade while holding the lock, so concurrent
/// first callers load once. Failures are not cached.
#[derive(Debug, Default)]
pub struct ContextCache {
    slot: Mutex<Option<Arc<ServingContext>>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, loader: &ArtifactLoader) -> ServingResult<Arc<ServingContext>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(context) = slot.as_ref() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(loader.load()?);
        *slot = Some(Arc::clone(&context));
        Ok(context)
    }

    /// Cached context, if one has been loaded.
    pub fn get(&self) -> Option<Arc<ServingContext>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
