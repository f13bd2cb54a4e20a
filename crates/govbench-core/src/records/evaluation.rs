//! Evaluation records produced by the judge model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::schema::validate_evaluation_schema;
use super::RecordError;
use crate::framework::Framework;

/// Detection quality of one framework for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_positive_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_coverage_rate: Option<f64>,

    #[serde(default)]
    pub violations_detected: Vec<String>,

    #[serde(default)]
    pub violations_missed: Vec<String>,

    #[serde(default)]
    pub false_positives: Vec<String>,
}

/// How actionable a framework's log was for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionableIntelligence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causal_chain_clarity_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictive_alerting_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proactive_intervention_rate: Option<f64>,
}

/// The judge's verdict on one framework.
///
/// Every scalar is explicitly present or absent; nothing is defaulted to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance_maturity_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_metrics: Option<DetectionMetrics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actionable_intelligence: Option<ActionableIntelligence>,
}

impl FrameworkAssessment {
    /// An assessment with no sub-objects at all carries no information.
    pub fn is_empty(&self) -> bool {
        self.governance_maturity_score.is_none()
            && self.detection_metrics.is_none()
            && self.actionable_intelligence.is_none()
    }

    /// Look up one scalar metric.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let detection = self.detection_metrics.as_ref();
        let intelligence = self.actionable_intelligence.as_ref();
        match metric {
            Metric::GovernanceMaturityScore => self.governance_maturity_score,
            Metric::DetectionRate => detection.and_then(|d| d.detection_rate),
            Metric::FalsePositiveRate => detection.and_then(|d| d.false_positive_rate),
            Metric::RiskCoverageRate => detection.and_then(|d| d.risk_coverage_rate),
            Metric::CausalChainClarityScore => intelligence.and_then(|i| i.causal_chain_clarity_score),
            Metric::PredictiveAlertingScore => intelligence.and_then(|i| i.predictive_alerting_score),
            Metric::ProactiveInterventionRate => {
                intelligence.and_then(|i| i.proactive_intervention_rate)
            }
        }
    }
}

/// Ground truth the judge derived from the scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default)]
    pub emergent_risks_identified: Vec<String>,
}

/// A judge verdict comparing the frameworks for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Keyed by framework report key. May contain keys beyond the three
    /// recognized frameworks.
    pub performance_comparison: BTreeMap<String, FrameworkAssessment>,

    #[serde(default)]
    pub scenario_details: BTreeMap<String, Value>,

    #[serde(default)]
    pub ground_truth: GroundTruth,
}

impl EvaluationRecord {
    /// Validate against the evaluation schema, then deserialize.
    ///
    /// Empty assessments are dropped, so a framework is either present with
    /// content or absent from the record.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        validate_evaluation_schema(&value).map_err(RecordError::Schema)?;
        let mut record: EvaluationRecord = serde_json::from_value(value)?;
        record
            .performance_comparison
            .retain(|_, assessment| !assessment.is_empty());
        Ok(record)
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Assessment for a recognized framework.
    pub fn assessment(&self, framework: Framework) -> Option<&FrameworkAssessment> {
        self.performance_comparison.get(framework.key())
    }
}

/// The scalar metrics compared across frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    GovernanceMaturityScore,
    DetectionRate,
    FalsePositiveRate,
    RiskCoverageRate,
    CausalChainClarityScore,
    PredictiveAlertingScore,
    ProactiveInterventionRate,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::GovernanceMaturityScore,
        Metric::DetectionRate,
        Metric::FalsePositiveRate,
        Metric::RiskCoverageRate,
        Metric::CausalChainClarityScore,
        Metric::PredictiveAlertingScore,
        Metric::ProactiveInterventionRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::GovernanceMaturityScore => "governance_maturity_score",
            Metric::DetectionRate => "detection_rate",
            Metric::FalsePositiveRate => "false_positive_rate",
            Metric::RiskCoverageRate => "risk_coverage_rate",
            Metric::CausalChainClarityScore => "causal_chain_clarity_score",
            Metric::PredictiveAlertingScore => "predictive_alerting_score",
            Metric::ProactiveInterventionRate => "proactive_intervention_rate",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
