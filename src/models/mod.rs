//! Model backends, artifact loading and inference

pub mod explain;
pub mod inference;
pub mod loader;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod scaler;
pub mod tree;

pub use explain::{ExplainError, ExplainabilityRanker};
pub use inference::Predictor;
pub use loader::{ArtifactLoader, ContextCache, ModelCandidate, ModelKind, ServingContext};
pub use model::{Attribution, ChurnModel, ModelCapabilities};
pub use scaler::StandardScaler;
pub use tree::TreeEnsemble;
