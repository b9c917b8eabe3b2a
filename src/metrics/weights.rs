//! Indicator weight tables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::IndicatorInputs;
use crate::error::{AppError, LinkographError, LinkographResult};

/// Normalised quantity an indicator formula can draw on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricInput {
    /// Link density divided by the saturation constant.
    LinkDensity,
    /// One minus the normalised link density.
    Sparsity,
    /// Critical moves over total moves.
    CriticalMoveRatio,
    /// Forward and bidirectional critical moves over total moves.
    OpeningRatio,
    /// Backward and bidirectional critical moves over total moves.
    ClosingRatio,
    /// Bidirectional critical moves over total moves.
    BidirectionalRatio,
    /// Orphan moves over total moves.
    OrphanRatio,
    /// Link occupancy entropy.
    Entropy,
    /// Normalised phase entropy.
    PhaseBalance,
    /// Fraction of moves inside a chunk.
    ChunkCoverage,
    /// Fraction of moves inside a web.
    WebCoverage,
    /// Fraction of moves inside a sawtooth.
    SawtoothCoverage,
    /// One minus the fraction of moves inside a struggle run.
    Steadiness,
    /// Fraction of moves inside a post-breakthrough window.
    BreakthroughCoverage,
    /// Reflection and evaluation moves over total moves.
    ReflectiveShare,
}

/// One indicator: a weighted sum of inputs, clamped to [0, 1].
///
/// With `inverted` set the indicator is one minus the weighted sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFormula {
    /// Input weights.
    pub terms: BTreeMap<MetricInput, f64>,
    /// Report `1 - sum` instead of `sum`.
    #[serde(default)]
    pub inverted: bool,
}

impl IndicatorFormula {
    fn new(terms: &[(MetricInput, f64)]) -> Self {
        Self {
            terms: terms.iter().copied().collect(),
            inverted: false,
        }
    }

    fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Evaluate against a set of inputs.
    pub fn evaluate(&self, inputs: &IndicatorInputs) -> f64 {
        let sum: f64 = self
            .terms
            .iter()
            .map(|(input, weight)| weight * inputs.get(*input))
            .sum();
        let value = if self.inverted { 1.0 - sum } else { sum };
        value.clamp(0.0, 1.0)
    }
}

fn default_density_saturation() -> f64 {
    3.0
}

/// Weight tables for the six cognitive indicators.
///
/// The defaults are uncalibrated; deployments are expected to supply
/// their own via `LINKOGRAPHY_WEIGHTS_PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    /// Links per move at which the normalised density reaches 1.
    #[serde(default = "default_density_saturation")]
    pub density_saturation: f64,
    /// Formula for `deep_thinking_engagement`.
    pub deep_thinking_engagement: IndicatorFormula,
    /// Formula for `cognitive_offloading_prevention`.
    pub cognitive_offloading_prevention: IndicatorFormula,
    /// Formula for `scaffolding_effectiveness`.
    pub scaffolding_effectiveness: IndicatorFormula,
    /// Formula for `knowledge_integration`.
    pub knowledge_integration: IndicatorFormula,
    /// Formula for `learning_progression`.
    pub learning_progression: IndicatorFormula,
    /// Formula for `metacognitive_awareness`.
    pub metacognitive_awareness: IndicatorFormula,
}

impl Default for MetricWeights {
    fn default() -> Self {
        use MetricInput::*;

        Self {
            density_saturation: default_density_saturation(),
            deep_thinking_engagement: IndicatorFormula::new(&[
                (LinkDensity, 0.4),
                (WebCoverage, 0.3),
                (CriticalMoveRatio, 0.3),
            ]),
            cognitive_offloading_prevention: IndicatorFormula::new(&[
                (OrphanRatio, 0.6),
                (Sparsity, 0.4),
            ])
            .inverted(),
            scaffolding_effectiveness: IndicatorFormula::new(&[
                (SawtoothCoverage, 0.5),
                (ChunkCoverage, 0.3),
                (Steadiness, 0.2),
            ]),
            knowledge_integration: IndicatorFormula::new(&[
                (WebCoverage, 0.35),
                (Entropy, 0.35),
                (ClosingRatio, 0.3),
            ]),
            learning_progression: IndicatorFormula::new(&[
                (BreakthroughCoverage, 0.4),
                (PhaseBalance, 0.3),
                (OpeningRatio, 0.3),
            ]),
            metacognitive_awareness: IndicatorFormula::new(&[
                (ReflectiveShare, 0.5),
                (BidirectionalRatio, 0.25),
                (ChunkCoverage, 0.25),
            ]),
        }
    }
}

impl MetricWeights {
    /// Load a full weight table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read weights file {}: {}", path.display(), e),
        })?;
        let weights: MetricWeights = serde_json::from_str(&raw).map_err(|e| AppError::Config {
            message: format!("invalid weights file {}: {}", path.display(), e),
        })?;
        weights.validate().map_err(|e| AppError::Config {
            message: e.to_string(),
        })?;
        Ok(weights)
    }

    /// Reject non-finite or negative weights and a non-positive saturation.
    pub fn validate(&self) -> LinkographResult<()> {
        if !(self.density_saturation.is_finite() && self.density_saturation > 0.0) {
            return Err(LinkographError::config(
                "density_saturation",
                "must be a positive number",
            ));
        }

        for (name, formula) in self.formulas() {
            if let Some((input, weight)) = formula
                .terms
                .iter()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(LinkographError::config(
                    name,
                    format!("weight for {:?} must be finite and non-negative, got {}", input, weight),
                ));
            }
        }
        Ok(())
    }

    fn formulas(&self) -> [(&'static str, &IndicatorFormula); 6] {
        [
            ("deep_thinking_engagement", &self.deep_thinking_engagement),
            (
                "cognitive_offloading_prevention",
                &self.cognitive_offloading_prevention,
            ),
            ("scaffolding_effectiveness", &self.scaffolding_effectiveness),
            ("knowledge_integration", &self.knowledge_integration),
            ("learning_progression", &self.learning_progression),
            ("metacognitive_awareness", &self.metacognitive_awareness),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_weights_are_valid() {
        let weights = MetricWeights::default();
        assert!(weights.validate().is_ok());
        for (_, formula) in weights.formulas() {
            let total: f64 = formula.terms.values().sum();
            assert!(total <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_formula_clamps() {
        let mut inputs = IndicatorInputs::default();
        inputs.set(MetricInput::Entropy, 1.0);
        let formula = IndicatorFormula::new(&[(MetricInput::Entropy, 2.0)]);
        assert_eq!(formula.evaluate(&inputs), 1.0);
        assert_eq!(formula.clone().inverted().evaluate(&inputs), 0.0);
    }

    #[test]
    fn test_round_trip_through_json_file() {
        let mut weights = MetricWeights::default();
        weights.density_saturation = 5.0;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&weights).unwrap()).unwrap();

        let loaded = MetricWeights::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, weights);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut weights = MetricWeights::default();
        weights
            .knowledge_integration
            .terms
            .insert(MetricInput::Entropy, -0.1);
        let err = weights.validate().unwrap_err();
        assert!(err.to_string().contains("knowledge_integration"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = MetricWeights::from_json_file(Path::new("/nonexistent/weights.json")).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn test_partial_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"density_saturation": 2.0}}"#).unwrap();
        let err = MetricWeights::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid weights file"));
    }
}
