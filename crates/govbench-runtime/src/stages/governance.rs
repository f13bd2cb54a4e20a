//! Governance log generation for every run directory that has a scenario.

use std::sync::Arc;

use govbench_core::{GovernanceLog, RunDir, RunStore, StoreError};

use super::{request_json, ItemError, StageError};
use crate::dispatch::{run_bounded, BatchReport, ItemOutcome};
use crate::prompts::{PromptTemplate, SCENARIO_JSON_FIELD};
use crate::providers::{GenerationConfig, TextGenerator};
use crate::resilience::{AttemptError, RetryPolicy};

pub struct GovernanceStage {
    generator: Arc<dyn TextGenerator>,
    template: PromptTemplate,
    generation: GenerationConfig,
    retry: RetryPolicy,
    overwrite: bool,
}

impl GovernanceStage {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        template: PromptTemplate,
        generation: GenerationConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            template,
            generation,
            retry,
            overwrite: false,
        }
    }

    /// Regenerate logs that already exist.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Process every run directory under the store, at most `concurrency`
    /// at a time.
    pub async fn run(self, store: &RunStore, concurrency: usize) -> Result<BatchReport, StageError> {
        let runs = store.run_dirs()?;
        tracing::info!(
            runs = runs.len(),
            concurrency,
            base_dir = %store.base().display(),
            "Generating governance logs"
        );

        let stage = Arc::new(self);
        let report = run_bounded(runs, concurrency, move |run| {
            let stage = Arc::clone(&stage);
            async move {
                if run.has_governance() && !stage.overwrite {
                    tracing::info!(
                        run_dir = %run.name(),
                        "Skipping, governance.json already exists (use --overwrite to regenerate)"
                    );
                    return ItemOutcome::Skipped;
                }
                match stage.generate(&run).await {
                    Ok(log) => {
                        tracing::info!(run_dir = %run.name(), entries = log.len(), "Saved governance log");
                        ItemOutcome::Succeeded
                    }
                    Err(e) => {
                        tracing::error!(run_dir = %run.name(), error = %e, "Failed to generate governance log");
                        ItemOutcome::Failed
                    }
                }
            }
        })
        .await;

        Ok(report)
    }

    /// Generate and persist the governance log for one run.
    pub async fn generate(&self, run: &RunDir) -> Result<GovernanceLog, ItemError> {
        let scenario = run.load_scenario().map_err(ItemError::from_load)?;
        let scenario_json = scenario.to_pretty_json().map_err(|source| {
            ItemError::MalformedInput(StoreError::Serialize {
                path: run.scenario_path(),
                source,
            })
        })?;
        let prompt = self.template.render(&[(SCENARIO_JSON_FIELD, scenario_json.as_str())])?;

        tracing::debug!(run_dir = %run.name(), scenario = scenario.display_name(), "Requesting governance log");

        let log = request_json(
            self.generator.as_ref(),
            &prompt,
            &self.generation,
            &self.retry,
            &run.name(),
            |value| GovernanceLog::from_value(value).map_err(|e| AttemptError::Malformed(e.to_string())),
        )
        .await
        .map_err(ItemError::Generation)?;

        let unrecognized = log.unrecognized();
        if unrecognized > 0 {
            tracing::debug!(run_dir = %run.name(), unrecognized, "Log entries with unrecognized type tags");
        }

        run.write_governance(&log).map_err(ItemError::Persistence)?;
        Ok(log)
    }
}
