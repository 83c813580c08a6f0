//! Configuration management for the churn scoring service

use crate::models::loader::{ModelCandidate, ModelKind};
use crate::types::prediction::RiskLevelThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix of environment overrides, e.g. `CHURN__SCORING__RISK_LEVELS__HIGH=0.8`
pub const ENV_PREFIX: &str = "CHURN";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub scoring: ScoringConfig,
    pub explain: ExplainConfig,
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
}

/// Trained artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Fitted standard scaler (JSON)
    pub scaler_path: PathBuf,
    /// Fitted label encoder bundle (JSON)
    pub encoders_path: PathBuf,
    /// Model candidates, tried in order
    pub models: Vec<ModelCandidate>,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        let dir = Path::new("data/models");
        Self {
            scaler_path: dir.join("scaler.json"),
            encoders_path: dir.join("label_encoders.json"),
            models: vec![
                ModelCandidate::new("xgboost", ModelKind::Onnx, dir.join("xgboost_best.onnx")),
                ModelCandidate::new("lightgbm", ModelKind::Onnx, dir.join("lightgbm_best.onnx")),
                ModelCandidate::new(
                    "gradient_boosting",
                    ModelKind::TreeEnsemble,
                    dir.join("gradient_boosting_best.json"),
                ),
                ModelCandidate::new(
                    "random_forest",
                    ModelKind::TreeEnsemble,
                    dir.join("random_forest_best.json"),
                ),
            ],
            onnx_threads: 1,
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Risk level classification thresholds
    pub risk_levels: RiskLevelThresholds,
}

/// Explanation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Number of attributions returned
    pub top_k: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// Business rule overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub enabled: bool,
    /// Account types that always score 0
    pub non_churnable_account_types: Vec<String>,
    /// Account types that are considered churned once dormant
    pub dormant_account_types: Vec<String>,
    /// Days without a transaction after which an account is dormant
    pub dormant_days: u32,
    /// Probability reported for dormant accounts
    pub dormant_probability: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            non_churnable_account_types: vec!["Savings".to_string(), "Fixed Deposit".to_string()],
            dormant_account_types: vec!["Current".to_string()],
            dormant_days: 365,
            dormant_probability: 0.95,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file, if present
    pub fn load() -> Result<Self> {
        Self::build(File::with_name(DEFAULT_CONFIG_PATH).required(false))
    }

    /// Load configuration from a specific path, which must exist
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::build(File::from(path).required(true))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Explicit path when given, otherwise the optional default file
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scoring.risk_levels.high, 0.7);
        assert_eq!(config.scoring.risk_levels.medium, 0.4);
        assert_eq!(config.explain.top_k, 10);
        assert!(config.rules.enabled);

        let names: Vec<_> = config.artifacts.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            ["xgboost", "lightgbm", "gradient_boosting", "random_forest"]
        );
        assert_eq!(config.artifacts.models[0].kind, ModelKind::Onnx);
        assert_eq!(config.artifacts.models[3].kind, ModelKind::TreeEnsemble);
    }

    #[test]
    fn test_load_from_path_merges_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[artifacts]
scaler_path = "/srv/models/scaler.json"

[[artifacts.models]]
name = "forest"
kind = "tree_ensemble"
path = "/srv/models/forest.json"

[scoring.risk_levels]
medium = 0.3
high = 0.8

[rules]
enabled = false
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.artifacts.scaler_path, PathBuf::from("/srv/models/scaler.json"));
        assert_eq!(
            config.artifacts.encoders_path,
            PathBuf::from("data/models/label_encoders.json")
        );
        assert_eq!(config.artifacts.models.len(), 1);
        assert_eq!(config.artifacts.models[0].kind, ModelKind::TreeEnsemble);
        assert_eq!(config.scoring.risk_levels.high, 0.8);
        assert!(!config.rules.enabled);
        assert_eq!(config.rules.dormant_days, 365);
        assert_eq!(config.explain.top_k, 10);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        assert!(AppConfig::load_from_path("/nonexistent/churn.toml").is_err());
    }
}
