//! Judge evaluation of every run, followed by the aggregate summary.
//!
//! Workers send each valid record over a channel to a single collector task
//! that owns the [`Aggregator`]; nothing else touches the running totals.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use govbench_core::{AggregateSummary, Aggregator, EvaluationRecord, Framework, RunDir, RunStore, StoreError};

use super::{request_json, ItemError, StageError};
use crate::dispatch::{run_pull_queue, BatchReport, ItemOutcome};
use crate::prompts::PromptTemplate;
use crate::providers::{GenerationConfig, TextGenerator};
use crate::resilience::{AttemptError, RetryPolicy};

/// Result of an evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub report: BatchReport,
    /// `None` when there was nothing to aggregate.
    pub summary: Option<AggregateSummary>,
}

pub struct EvaluationStage {
    generator: Arc<dyn TextGenerator>,
    template: PromptTemplate,
    generation: GenerationConfig,
    overwrite: bool,
}

impl EvaluationStage {
    /// `template` must be a format template over
    /// [`EVALUATION_FIELDS`](crate::prompts::EVALUATION_FIELDS).
    pub fn new(generator: Arc<dyn TextGenerator>, template: PromptTemplate, generation: GenerationConfig) -> Self {
        Self {
            generator,
            template,
            generation,
            overwrite: false,
        }
    }

    /// Re-evaluate runs that already have an `evaluation.json`.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Evaluate every run with a pool of `workers`, then write the summary.
    pub async fn run(self, store: &RunStore, workers: usize) -> Result<EvaluationOutcome, StageError> {
        let runs = store.run_dirs()?;
        if runs.is_empty() {
            tracing::info!(base_dir = %store.base().display(), "No run directories found to evaluate");
            return Ok(EvaluationOutcome {
                report: BatchReport::default(),
                summary: None,
            });
        }

        tracing::info!(runs = runs.len(), workers, base_dir = %store.base().display(), "Evaluating runs");

        let (tx, mut rx) = mpsc::unbounded_channel::<EvaluationRecord>();
        let collector = tokio::spawn(async move {
            let mut aggregator = Aggregator::new();
            while let Some(record) = rx.recv().await {
                aggregator.add(&record);
            }
            aggregator
        });

        let stage = Arc::new(self);
        let report = run_pull_queue(runs, workers, move |run| {
            let stage = Arc::clone(&stage);
            let tx = tx.clone();
            async move { stage.process(run, &tx).await }
        })
        .await;

        // Every sender has been dropped with the worker pool, so the
        // collector sees the end of the stream.
        let aggregator = collector
            .await
            .map_err(|e| StageError::Collector(e.to_string()))?;

        if aggregator.total() == 0 {
            tracing::warn!("No evaluation results to aggregate");
            return Ok(EvaluationOutcome { report, summary: None });
        }

        let summary = aggregator.finish();
        match store.write_summary(&summary) {
            Ok(()) => tracing::info!(
                path = %store.summary_path().display(),
                records = summary.metadata.total_scenarios_evaluated,
                "Saved evaluation summary"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to save evaluation summary"),
        }

        Ok(EvaluationOutcome {
            report,
            summary: Some(summary),
        })
    }

    async fn process(&self, run: RunDir, results: &mpsc::UnboundedSender<EvaluationRecord>) -> ItemOutcome {
        if run.has_evaluation() && !self.overwrite {
            match run.load_evaluation() {
                Ok(record) => {
                    tracing::info!(run_dir = %run.name(), "Reusing existing evaluation (use --overwrite to re-evaluate)");
                    send(results, record);
                }
                Err(e) => tracing::warn!(
                    run_dir = %run.name(),
                    error = %e,
                    "Existing evaluation is invalid and left out of the summary"
                ),
            }
            return ItemOutcome::Skipped;
        }

        match self.evaluate(&run).await {
            Ok(record) => {
                tracing::info!(run_dir = %run.name(), "Saved evaluation");
                send(results, record);
                ItemOutcome::Succeeded
            }
            Err(e) => {
                tracing::error!(run_dir = %run.name(), error = %e, "Failed to evaluate run");
                ItemOutcome::Failed
            }
        }
    }

    /// Evaluate one run and persist the judge's verdict.
    ///
    /// Evaluation makes exactly one attempt.
    pub async fn evaluate(&self, run: &RunDir) -> Result<EvaluationRecord, ItemError> {
        let scenario = run.load_scenario().map_err(ItemError::from_load)?;
        let log = run.load_governance().map_err(ItemError::from_load)?;

        let scenario_json = scenario
            .to_pretty_json()
            .map_err(serialize_error(run.scenario_path()))?;
        let mi9 = log
            .partition_json(Framework::Mi9Governance)
            .map_err(serialize_error(run.governance_path()))?;
        let otel = log
            .partition_json(Framework::OpenTelemetry)
            .map_err(serialize_error(run.governance_path()))?;
        let langchain = log
            .partition_json(Framework::LangChain)
            .map_err(serialize_error(run.governance_path()))?;

        let prompt = self.template.render(&[
            ("scenario_json", scenario_json.as_str()),
            ("mi9_logs_json", mi9.as_str()),
            ("opentelemetry_logs_json", otel.as_str()),
            ("langchain_logs_json", langchain.as_str()),
        ])?;

        tracing::debug!(run_dir = %run.name(), scenario = scenario.display_name(), "Requesting evaluation");

        let (raw, record) = request_json(
            self.generator.as_ref(),
            &prompt,
            &self.generation,
            &RetryPolicy::single_attempt(),
            &run.name(),
            |value| {
                EvaluationRecord::from_value(value.clone())
                    .map(|record| (value, record))
                    .map_err(|e| AttemptError::Malformed(e.to_string()))
            },
        )
        .await
        .map_err(ItemError::Evaluation)?;

        // The verdict is stored as the judge wrote it, extra fields included.
        run.write_evaluation(&raw).map_err(ItemError::Persistence)?;
        Ok(record)
    }
}

fn serialize_error(path: PathBuf) -> impl FnOnce(serde_json::Error) -> ItemError {
    move |source| ItemError::MalformedInput(StoreError::Serialize { path, source })
}

fn send(results: &mpsc::UnboundedSender<EvaluationRecord>, record: EvaluationRecord) {
    if results.send(record).is_err() {
        tracing::warn!("Result collector closed early; record dropped from summary");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::EVALUATION_FIELDS;
    use crate::providers::ScriptedGenerator;
    use std::fs;
    use tempfile::TempDir;

    const VERDICT: &str = r#"Here is my verdict:
```json
{
  "scenario_details": {"scenario_category": "Goal Drift"},
  "performance_comparison": {
    "mi9_governance": {"governance_maturity_score": 5},
    "opentelemetry": {"governance_maturity_score": 2}
  },
  "judge_notes": "kept verbatim"
}
```"#;

    fn stage(generator: Arc<dyn TextGenerator>) -> EvaluationStage {
        let template = PromptTemplate::format(
            "S={scenario_json}\nM={mi9_logs_json}\nO={opentelemetry_logs_json}\nL={langchain_logs_json}",
            &EVALUATION_FIELDS,
        )
        .unwrap();
        EvaluationStage::new(generator, template, GenerationConfig::default())
    }

    fn seed_run(dir: &TempDir, name: &str) {
        let run = dir.path().join(name);
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("scenario.json"), r#"{"scenario_name": "s"}"#).unwrap();
        fs::write(
            run.join("governance.json"),
            r#"[{"type": "MI9_GOVERNANCE", "n": 1}, {"type": "OPENTELEMETRY", "n": 2}, {"type": "AUDIT"}]"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_evaluates_and_writes_summary() {
        let dir = TempDir::new().unwrap();
        seed_run(&dir, "1");
        seed_run(&dir, "2");

        let generator = Arc::new(ScriptedGenerator::always(VERDICT));
        let store = RunStore::open(dir.path()).unwrap();
        let outcome = stage(generator.clone()).run(&store, 2).await.unwrap();

        assert_eq!(outcome.report.succeeded, 2);
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.metadata.total_scenarios_evaluated, 2);
        assert!(!summary.performance_summary.contains_key(&Framework::LangChain));
        assert!(store.summary_path().is_file());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("1").join("evaluation.json")).unwrap()).unwrap();
        assert_eq!(written["judge_notes"], "kept verbatim");

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("L=[]"));
        assert!(prompt.contains("\"n\": 2"));
        assert!(!prompt.contains("AUDIT"));
    }

    #[tokio::test]
    async fn test_single_attempt_and_existing_records_reused() {
        let dir = TempDir::new().unwrap();
        seed_run(&dir, "1");
        seed_run(&dir, "2");
        fs::write(
            dir.path().join("2").join("evaluation.json"),
            r#"{"performance_comparison": {"langchain": {"governance_maturity_score": 1}}}"#,
        )
        .unwrap();

        let generator = Arc::new(ScriptedGenerator::always("no json here"));
        let store = RunStore::open(dir.path()).unwrap();
        let outcome = stage(generator.clone()).run(&store, 1).await.unwrap();

        assert_eq!(outcome.report.failed, 1);
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(generator.calls(), 1);

        let summary = outcome.summary.unwrap();
        assert_eq!(summary.metadata.total_scenarios_evaluated, 1);
        assert!(summary.performance_summary.contains_key(&Framework::LangChain));
    }

    #[tokio::test]
    async fn test_nothing_to_aggregate() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("1")).unwrap();

        let store = RunStore::open(dir.path()).unwrap();
        let outcome = stage(Arc::new(ScriptedGenerator::always(VERDICT)))
            .run(&store, 4)
            .await
            .unwrap();

        assert_eq!(outcome.report.failed, 1);
        assert!(outcome.summary.is_none());
        assert!(!store.summary_path().exists());
    }
}
