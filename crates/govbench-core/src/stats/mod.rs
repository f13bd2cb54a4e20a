//! Statistical comparison of framework scores against the baseline.

pub mod wilcoxon;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::framework::Framework;
use crate::records::{EvaluationRecord, Metric};

pub use wilcoxon::{signed_rank, PValueMethod, WilcoxonError, WilcoxonResult};

/// Scores per metric and framework key, in record order.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    scores: BTreeMap<Metric, BTreeMap<String, Vec<f64>>>,
}

impl ScoreTable {
    /// Collect every present scalar for every framework key in the records.
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let mut scores: BTreeMap<Metric, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
        for record in records {
            for (key, assessment) in &record.performance_comparison {
                for metric in Metric::ALL {
                    if let Some(value) = assessment.metric(metric) {
                        scores
                            .entry(metric)
                            .or_default()
                            .entry(key.clone())
                            .or_default()
                            .push(value);
                    }
                }
            }
        }
        Self { scores }
    }

    pub fn scores(&self, metric: Metric, framework: &str) -> &[f64] {
        self.scores
            .get(&metric)
            .and_then(|by_framework| by_framework.get(framework))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Metrics with at least one score, ordered by name.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = self.scores.keys().copied().collect();
        metrics.sort_by_key(|m| m.name());
        metrics
    }

    /// Framework keys scored on `metric`: recognized frameworks first, then
    /// any other keys alphabetically.
    pub fn frameworks(&self, metric: Metric) -> Vec<&str> {
        let Some(by_framework) = self.scores.get(&metric) else {
            return Vec::new();
        };
        let mut keys: Vec<&str> = by_framework.keys().map(String::as_str).collect();
        keys.sort_by_key(|key| {
            let position = Framework::from_key(key).map_or(usize::MAX, |f| f as usize);
            (position, key.to_string())
        });
        keys
    }
}

/// Mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Descriptive {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

pub fn describe(scores: &[f64]) -> Option<Descriptive> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(Descriptive {
        n: scores.len(),
        mean,
        std_dev: variance.sqrt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignificanceTier {
    #[serde(rename = "***")]
    VeryHigh,
    #[serde(rename = "**")]
    High,
    #[serde(rename = "*")]
    Significant,
    #[serde(rename = "ns")]
    NotSignificant,
}

impl SignificanceTier {
    pub fn from_p_value(p: f64) -> Self {
        if p < 0.001 {
            SignificanceTier::VeryHigh
        } else if p < 0.01 {
            SignificanceTier::High
        } else if p < 0.05 {
            SignificanceTier::Significant
        } else {
            SignificanceTier::NotSignificant
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            SignificanceTier::VeryHigh => "***",
            SignificanceTier::High => "**",
            SignificanceTier::Significant => "*",
            SignificanceTier::NotSignificant => "ns",
        }
    }
}

impl fmt::Display for SignificanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Outcome of comparing one framework with the baseline on one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Comparison {
    Tested {
        statistic: f64,
        p_value: f64,
        tier: SignificanceTier,
    },
    NoDifference,
    /// Sample sizes differ, so the scores cannot be paired.
    Skipped { baseline: usize, other: usize },
}

pub fn compare(baseline: &[f64], other: &[f64]) -> Comparison {
    match signed_rank(baseline, other) {
        Ok(result) => Comparison::Tested {
            statistic: result.statistic,
            p_value: result.p_value,
            tier: SignificanceTier::from_p_value(result.p_value),
        },
        Err(WilcoxonError::NoNonZeroDifferences) => Comparison::NoDifference,
        Err(WilcoxonError::LengthMismatch { left, right }) => Comparison::Skipped {
            baseline: left,
            other: right,
        },
        Err(e @ WilcoxonError::Distribution(_)) => {
            tracing::warn!(error = %e, "Significance test failed");
            Comparison::Skipped {
                baseline: baseline.len(),
                other: other.len(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReport {
    pub metric: String,
    pub descriptives: BTreeMap<String, Descriptive>,
    /// Every non-baseline framework, keyed by framework key. Empty when the
    /// baseline has no scores for this metric.
    pub comparisons: BTreeMap<String, Comparison>,
    #[serde(skip)]
    order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub baseline: String,
    pub records: usize,
    /// Baseline maturity scores, which is how many samples the report is
    /// based on.
    pub sample_count: usize,
    pub metrics: Vec<MetricReport>,
}

impl StatsReport {
    pub fn compute(records: &[EvaluationRecord]) -> Self {
        let table = ScoreTable::from_records(records);
        let baseline = Framework::BASELINE.key();

        let metrics = table
            .metrics()
            .into_iter()
            .map(|metric| {
                let order: Vec<String> = table.frameworks(metric).into_iter().map(String::from).collect();
                let descriptives = order
                    .iter()
                    .filter_map(|key| describe(table.scores(metric, key)).map(|d| (key.clone(), d)))
                    .collect();

                let baseline_scores = table.scores(metric, baseline);
                let comparisons = if baseline_scores.is_empty() {
                    BTreeMap::new()
                } else {
                    order
                        .iter()
                        .filter(|key| key.as_str() != baseline)
                        .map(|key| (key.clone(), compare(baseline_scores, table.scores(metric, key))))
                        .collect()
                };

                MetricReport {
                    metric: metric.name().to_string(),
                    descriptives,
                    comparisons,
                    order,
                }
            })
            .collect();

        Self {
            baseline: baseline.to_string(),
            records: records.len(),
            sample_count: table.scores(Metric::GovernanceMaturityScore, baseline).len(),
            metrics,
        }
    }

    /// Plain-text console report.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Statistical Performance Analysis ---")?;
        writeln!(f, "Based on {} valid evaluation samples.", self.sample_count)?;

        for metric in &self.metrics {
            writeln!(f)?;
            writeln!(f, "--- Metric: {} ---", metric.metric)?;
            let header = format!("{:<20} | {:<10} | {:<10}", "Framework", "Mean", "Std Dev");
            writeln!(f, "{header}")?;
            writeln!(f, "{}", "-".repeat(header.len()))?;
            for key in &metric.order {
                if let Some(d) = metric.descriptives.get(key) {
                    writeln!(f, "{:<20} | {:<10.4} | {:<10.4}", key, d.mean, d.std_dev)?;
                }
            }

            writeln!(f)?;
            writeln!(f, "  Significance Tests (Wilcoxon signed-rank vs. {}):", self.baseline)?;
            for key in metric.order.iter().filter(|k| metric.comparisons.contains_key(*k)) {
                match &metric.comparisons[key] {
                    Comparison::Tested { p_value, tier, .. } => {
                        writeln!(f, "    - vs. {key:<15}: p-value = {p_value:.4e} ({tier})")?
                    }
                    Comparison::NoDifference => {
                        writeln!(f, "    - vs. {key:<15}: No difference in scores.")?
                    }
                    Comparison::Skipped { baseline, other } => writeln!(
                        f,
                        "    - vs. {key:<15}: skipped, unequal sample sizes ({baseline} vs {other})."
                    )?,
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "--- End of Report ---")?;
        write!(
            f,
            "Significance levels: *** p < 0.001, ** p < 0.01, * p < 0.05, ns (not significant)"
        )
    }
}
