//! Churn scoring on top of a loaded serving context

use crate::config::AppConfig;
use crate::error::{ServingError, ServingResult};
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ScoringMetrics;
use crate::models::explain::ExplainabilityRanker;
use crate::models::loader::ServingContext;
use crate::rules::BusinessRules;
use crate::types::customer::CustomerRecord;
use crate::types::prediction::{BatchEntry, PredictionResult, RiskLevelThresholds};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Scores customer records with the active model
pub struct Predictor {
    context: Arc<ServingContext>,
    extractor: FeatureExtractor,
    thresholds: RiskLevelThresholds,
    ranker: ExplainabilityRanker,
    rules: BusinessRules,
    metrics: Arc<ScoringMetrics>,
}

impl Predictor {
    /// Predictor with default thresholds, top-10 explanations and rules enabled
    pub fn new(context: Arc<ServingContext>) -> Self {
        let extractor = FeatureExtractor::new(Arc::clone(context.encoders()));
        Self {
            context,
            extractor,
            thresholds: RiskLevelThresholds::default(),
            ranker: ExplainabilityRanker::default(),
            rules: BusinessRules::default(),
            metrics: Arc::new(ScoringMetrics::new()),
        }
    }

    pub fn from_config(context: Arc<ServingContext>, config: &AppConfig) -> Self {
        Self::new(context)
            .with_thresholds(config.scoring.risk_levels.clone())
            .with_ranker(ExplainabilityRanker::new(config.explain.top_k))
            .with_rules(BusinessRules::new(config.rules.clone()))
    }

    pub fn with_thresholds(mut self, thresholds: RiskLevelThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_ranker(mut self, ranker: ExplainabilityRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_rules(mut self, rules: BusinessRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    pub fn metrics(&self) -> &ScoringMetrics {
        &self.metrics
    }

    /// Score one record.
    ///
    /// Only artifact disagreement and model failure are errors. When `explain`
    /// is set and no explanation can be produced, the result simply carries
    /// no `shap_values`.
    pub fn predict(&self, record: &CustomerRecord, explain: bool) -> ServingResult<PredictionResult> {
        let start_time = Instant::now();
        let result = self.score(record, explain);
        match &result {
            Ok(prediction) => self.metrics.record_prediction(start_time.elapsed(), prediction),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    fn score(&self, record: &CustomerRecord, explain: bool) -> ServingResult<PredictionResult> {
        if let Some(result) = self.rules.evaluate(record, &self.thresholds) {
            return Ok(result);
        }

        let features = self.extractor.extract(record);
        let scaler = self.context.scaler();
        scaler.check_features(&features)?;
        let scaled = scaler.transform(features.values())?;

        let model = self.context.model();
        let probability = model.predict_proba(&scaled)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ServingError::Inference(format!(
                "model {} returned probability {probability}",
                model.name()
            )));
        }
        let prediction = model.predict(&scaled)?;

        let mut result =
            PredictionResult::from_probability(probability, prediction, &self.thresholds);

        if explain {
            match self.ranker.explain(model, features.names(), &scaled) {
                Ok(attributions) => result = result.with_shap_values(attributions),
                Err(e) => {
                    warn!(model = %model.name(), error = %e, "Explanation unavailable, omitting");
                }
            }
        }

        debug!(
            model = %model.name(),
            churn_probability = result.churn_probability,
            risk_level = %result.risk_level,
            "Record scored"
        );

        Ok(result)
    }

    /// Score records independently; one entry per input, in input order.
    pub fn predict_batch(&self, records: &[CustomerRecord], explain: bool) -> Vec<BatchEntry> {
        records
            .iter()
            .map(|record| {
                let customer_id = record.customer_id();
                match self.predict(record, explain) {
                    Ok(prediction) => BatchEntry::Scored {
                        customer_id,
                        prediction,
                    },
                    Err(e) => {
                        warn!(customer_id = %customer_id, error = %e, "Record failed to score");
                        BatchEntry::Failed {
                            customer_id,
                            error: e.to_string(),
                        }
                    }
                }
            })
            .collect()
    }
}
