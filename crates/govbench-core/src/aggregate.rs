//! Result aggregation: folds evaluation records into a comparative summary.
//!
//! Means are taken per metric over the records where that metric is
//! present. A framework that never appears is left out of the summary
//! entirely rather than reported with zero means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::framework::Framework;
use crate::records::{EvaluationRecord, FrameworkAssessment, Metric};

/// Scenario attributes tallied into the appendix breakdown.
pub const TRACKED_SCENARIO_ATTRIBUTES: [&str; 6] = [
    "agent_type",
    "agent_architecture",
    "industry",
    "region",
    "attack_type",
    "safety_criticality",
];

/// Category used when a record does not name its scenario category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// The aggregate report written to `evaluation_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub metadata: SummaryMetadata,
    pub performance_summary: BTreeMap<Framework, FrameworkSummary>,
    pub appendix_statistics: AppendixStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub report_generated_at: DateTime<Utc>,
    pub total_scenarios_evaluated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSummary {
    /// Records in which this framework was assessed
    pub records: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance_maturity_score_avg: Option<f64>,

    pub detection_metrics_avg: DetectionSummary,

    pub actionable_intelligence_avg: IntelligenceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_rate_avg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_positive_rate_avg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_coverage_rate_avg: Option<f64>,

    pub total_violations_detected: BTreeSet<String>,
    pub total_violations_missed: BTreeSet<String>,
    pub total_false_positives: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causal_chain_clarity_score_avg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictive_alerting_score_avg: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proactive_intervention_rate_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendixStatistics {
    pub scenario_category_distribution: BTreeMap<String, usize>,
    pub emergent_risk_distribution: BTreeMap<String, usize>,
    pub scenario_attribute_breakdown: BTreeMap<String, BTreeMap<String, usize>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct FrameworkAccumulator {
    records: usize,
    metrics: BTreeMap<Metric, RunningMean>,
    detected: BTreeSet<String>,
    missed: BTreeSet<String>,
    false_positives: BTreeSet<String>,
}

impl FrameworkAccumulator {
    fn add(&mut self, assessment: &FrameworkAssessment) {
        self.records += 1;

        for metric in Metric::ALL {
            if let Some(value) = assessment.metric(metric) {
                self.metrics.entry(metric).or_default().push(value);
            }
        }

        if let Some(detection) = &assessment.detection_metrics {
            self.detected.extend(detection.violations_detected.iter().cloned());
            self.missed.extend(detection.violations_missed.iter().cloned());
            self.false_positives.extend(detection.false_positives.iter().cloned());
        }
    }

    fn mean(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).and_then(RunningMean::mean)
    }

    fn finish(mut self) -> FrameworkSummary {
        FrameworkSummary {
            records: self.records,
            governance_maturity_score_avg: self.mean(Metric::GovernanceMaturityScore),
            detection_metrics_avg: DetectionSummary {
                detection_rate_avg: self.mean(Metric::DetectionRate),
                false_positive_rate_avg: self.mean(Metric::FalsePositiveRate),
                risk_coverage_rate_avg: self.mean(Metric::RiskCoverageRate),
                total_violations_detected: std::mem::take(&mut self.detected),
                total_violations_missed: std::mem::take(&mut self.missed),
                total_false_positives: std::mem::take(&mut self.false_positives),
            },
            actionable_intelligence_avg: IntelligenceSummary {
                causal_chain_clarity_score_avg: self.mean(Metric::CausalChainClarityScore),
                predictive_alerting_score_avg: self.mean(Metric::PredictiveAlertingScore),
                proactive_intervention_rate_avg: self.mean(Metric::ProactiveInterventionRate),
            },
        }
    }
}

/// Incrementally folds evaluation records into an [`AggregateSummary`].
#[derive(Debug)]
pub struct Aggregator {
    total: usize,
    frameworks: BTreeMap<Framework, FrameworkAccumulator>,
    categories: BTreeMap<String, usize>,
    emergent_risks: BTreeMap<String, usize>,
    breakdown: BTreeMap<String, BTreeMap<String, usize>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            total: 0,
            frameworks: BTreeMap::new(),
            categories: BTreeMap::new(),
            emergent_risks: BTreeMap::new(),
            breakdown: TRACKED_SCENARIO_ATTRIBUTES
                .iter()
                .map(|key| (key.to_string(), BTreeMap::new()))
                .collect(),
        }
    }

    /// Summarize a full set of records in one call.
    pub fn summarize(records: &[EvaluationRecord]) -> AggregateSummary {
        let mut aggregator = Self::new();
        for record in records {
            aggregator.add(record);
        }
        aggregator.finish()
    }

    pub fn add(&mut self, record: &EvaluationRecord) {
        self.total += 1;

        for framework in Framework::ALL {
            if let Some(assessment) = record.assessment(framework) {
                self.frameworks.entry(framework).or_default().add(assessment);
            }
        }

        let category = match record.scenario_details.get("scenario_category") {
            None | Some(Value::Null) => UNKNOWN_CATEGORY.to_string(),
            Some(value) => category_label(value),
        };
        *self.categories.entry(category).or_default() += 1;

        for risk in &record.ground_truth.emergent_risks_identified {
            *self.emergent_risks.entry(risk.clone()).or_default() += 1;
        }

        for (key, counts) in self.breakdown.iter_mut() {
            if let Some(value) = record.scenario_details.get(key) {
                *counts.entry(category_label(value)).or_default() += 1;
            }
        }
    }

    /// Records folded in so far.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn finish(self) -> AggregateSummary {
        self.finish_at(Utc::now())
    }

    pub fn finish_at(self, generated_at: DateTime<Utc>) -> AggregateSummary {
        AggregateSummary {
            metadata: SummaryMetadata {
                report_generated_at: generated_at,
                total_scenarios_evaluated: self.total,
            },
            performance_summary: self
                .frameworks
                .into_iter()
                .map(|(framework, acc)| (framework, acc.finish()))
                .collect(),
            appendix_statistics: AppendixStatistics {
                scenario_category_distribution: self.categories,
                emergent_risk_distribution: self.emergent_risks,
                scenario_attribute_breakdown: self.breakdown,
            },
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn category_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> EvaluationRecord {
        EvaluationRecord::from_value(json).unwrap()
    }

    fn sample_records() -> Vec<EvaluationRecord> {
        vec![
            record(serde_json::json!({
                "scenario_details": {"scenario_category": "Goal Drift", "industry": "Finance", "region": "EU"},
                "ground_truth": {"emergent_risks_identified": ["goal_drift", "data_leak"]},
                "performance_comparison": {
                    "mi9_governance": {
                        "governance_maturity_score": 4.0,
                        "detection_metrics": {
                            "detection_rate": 1.0,
                            "false_positive_rate": 0.0,
                            "violations_detected": ["V2", "V1"],
                            "false_positives": []
                        },
                        "actionable_intelligence": {"causal_chain_clarity_score": 5.0}
                    },
                    "opentelemetry": {
                        "governance_maturity_score": 2.0,
                        "detection_metrics": {"detection_rate": 0.5, "violations_missed": ["V1"]}
                    }
                }
            })),
            record(serde_json::json!({
                "scenario_details": {"industry": "Finance", "safety_criticality": 3},
                "ground_truth": {"emergent_risks_identified": ["goal_drift"]},
                "performance_comparison": {
                    "mi9_governance": {
                        "governance_maturity_score": 5.0,
                        "detection_metrics": {"violations_detected": ["V3", "V1"]}
                    }
                }
            })),
        ]
    }

    #[test]
    fn test_absent_framework_is_omitted() {
        let summary = Aggregator::summarize(&sample_records());
        assert!(summary.performance_summary.contains_key(&Framework::Mi9Governance));
        assert!(summary.performance_summary.contains_key(&Framework::OpenTelemetry));
        assert!(!summary.performance_summary.contains_key(&Framework::LangChain));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["performance_summary"].get("langchain").is_none());
    }

    #[test]
    fn test_means_use_present_values_only() {
        let summary = Aggregator::summarize(&sample_records());
        let mi9 = &summary.performance_summary[&Framework::Mi9Governance];

        assert_eq!(mi9.records, 2);
        assert_eq!(mi9.governance_maturity_score_avg, Some(4.5));
        // Only the first record reports a detection rate.
        assert_eq!(mi9.detection_metrics_avg.detection_rate_avg, Some(1.0));
        assert_eq!(mi9.detection_metrics_avg.risk_coverage_rate_avg, None);
        assert_eq!(mi9.actionable_intelligence_avg.causal_chain_clarity_score_avg, Some(5.0));
    }

    #[test]
    fn test_violation_labels_are_sorted_unions() {
        let summary = Aggregator::summarize(&sample_records());
        let mi9 = &summary.performance_summary[&Framework::Mi9Governance];
        let detected: Vec<_> = mi9.detection_metrics_avg.total_violations_detected.iter().collect();
        assert_eq!(detected, vec!["V1", "V2", "V3"]);

        let otel = &summary.performance_summary[&Framework::OpenTelemetry];
        assert_eq!(otel.records, 1);
        assert!(otel.detection_metrics_avg.total_violations_missed.contains("V1"));
    }

    #[test]
    fn test_frequency_tables() {
        let summary = Aggregator::summarize(&sample_records());
        let appendix = &summary.appendix_statistics;

        assert_eq!(appendix.scenario_category_distribution["Goal Drift"], 1);
        assert_eq!(appendix.scenario_category_distribution[UNKNOWN_CATEGORY], 1);
        assert_eq!(appendix.emergent_risk_distribution["goal_drift"], 2);
        assert_eq!(appendix.emergent_risk_distribution["data_leak"], 1);
        assert_eq!(appendix.scenario_attribute_breakdown["industry"]["Finance"], 2);
        assert_eq!(appendix.scenario_attribute_breakdown["safety_criticality"]["3"], 1);
        assert!(appendix.scenario_attribute_breakdown["agent_type"].is_empty());
        assert_eq!(appendix.scenario_attribute_breakdown.len(), TRACKED_SCENARIO_ATTRIBUTES.len());
    }

    #[test]
    fn test_metadata_counts_all_records() {
        let summary = Aggregator::summarize(&sample_records());
        assert_eq!(summary.metadata.total_scenarios_evaluated, 2);

        let empty = Aggregator::summarize(&[]);
        assert_eq!(empty.metadata.total_scenarios_evaluated, 0);
        assert!(empty.performance_summary.is_empty());
    }
}
