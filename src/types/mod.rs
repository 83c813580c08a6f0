//! Type definitions for the churn scoring layer

pub mod customer;
pub mod prediction;

pub use customer::{CustomerRecord, ScoringRequest};
pub use prediction::{
    BatchEntry, Direction, FeatureAttribution, PredictionResult, RiskLevel, RiskLevelThresholds,
};
