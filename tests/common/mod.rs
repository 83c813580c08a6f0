use churn_scoring::models::{ArtifactLoader, ModelCandidate, ModelKind};
use churn_scoring::schema::{FEATURE_COUNT, FEATURE_NAMES};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

pub const DAYS_SLOT: usize = 17;
pub const COMPLAINTS_SLOT: usize = 15;

/// Artifact directory that lives as long as the test.
pub struct Fixture {
    dir: TempDir,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Scaler, encoders and a random forest, all valid.
    pub fn with_standard_artifacts() -> Self {
        let fixture = Self::new();
        fixture.write("scaler.json", &scaler_json());
        fixture.write("label_encoders.json", &encoders_json());
        fixture.write("random_forest.json", &forest_json());
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    pub fn candidate(&self, name: &str, kind: ModelKind, file: &str) -> ModelCandidate {
        ModelCandidate::new(name, kind, self.path(file))
    }

    /// `config.toml` pointing at this directory's artifacts and forest.
    pub fn config(&self) -> PathBuf {
        self.write(
            "config.toml",
            &format!(
                "[artifacts]\nscaler_path = {scaler:?}\nencoders_path = {encoders:?}\n\n\
                 [[artifacts.models]]\nname = \"random_forest\"\nkind = \"tree_ensemble\"\npath = {forest:?}\n",
                scaler = self.path("scaler.json").display().to_string(),
                encoders = self.path("label_encoders.json").display().to_string(),
                forest = self.path("random_forest.json").display().to_string(),
            ),
        )
    }

    pub fn loader(&self, candidates: Vec<ModelCandidate>) -> ArtifactLoader {
        ArtifactLoader::new(
            self.path("scaler.json"),
            self.path("label_encoders.json"),
            candidates,
        )
    }
}

/// Identity scaler over the full schema.
pub fn scaler_json() -> String {
    json!({
        "feature_names": FEATURE_NAMES,
        "mean": vec![0.0; FEATURE_COUNT],
        "scale": vec![1.0; FEATURE_COUNT],
    })
    .to_string()
}

pub fn encoders_json() -> String {
    json!({
        "Customer_Segment": ["Corporate", "Retail", "SME"],
        "Gender": ["Female", "Male"],
        "Nationality": ["Kenyan", "Rwandan", "Ugandan"],
        "Account_Type": ["Current", "Fixed Deposit", "Savings"],
        "Branch": ["Huye", "Kigali", "Musanze"],
        "Currency": ["EUR", "RWF", "USD"],
        "Account_Status": ["Active", "Dormant", "Inactive"],
    })
    .to_string()
}

/// Two stumps: inactivity over 90 days and more than one complaint.
pub fn forest_json() -> String {
    json!({
        "n_features": FEATURE_COUNT,
        "output": "probability_mean",
        "trees": [
            {"nodes": [
                {"feature": DAYS_SLOT, "threshold": 90.0, "left": 1, "right": 2, "value": 0.5},
                {"value": 0.2},
                {"value": 0.85},
            ]},
            {"nodes": [
                {"feature": COMPLAINTS_SLOT, "threshold": 1.5, "left": 1, "right": 2, "value": 0.3},
                {"value": 0.1},
                {"value": 0.7},
            ]},
        ],
    })
    .to_string()
}

/// A regressor export: loads fine but has no probability output.
#[allow(dead_code)]
pub fn raw_score_json() -> String {
    forest_json().replace("probability_mean", "raw_score")
}
