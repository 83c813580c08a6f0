//! Churn Scoring Library
//!
//! Reconciles arbitrarily shaped bank customer records with the feature
//! schema the churn models were trained on, and serves predictions with
//! optional per-feature explanations.

pub mod config;
pub mod encoding;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod rules;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use error::{ServingError, ServingResult};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::{ArtifactLoader, ContextCache, Predictor, ServingContext};
pub use types::{BatchEntry, CustomerRecord, PredictionResult, RiskLevel, ScoringRequest};
