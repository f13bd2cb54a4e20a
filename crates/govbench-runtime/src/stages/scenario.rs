//! Scenario generation: one model call per job, one new run directory per
//! generated scenario.

use std::sync::Arc;

use govbench_core::{RunAllocator, RunDir, ScenarioClass, ScenarioRecord};

use super::{request_json, ItemError};
use crate::dispatch::{run_pull_queue, BatchReport, ItemOutcome};
use crate::prompts::{PromptTemplate, SCENARIO_CLASS_FIELD};
use crate::providers::{GenerationConfig, TextGenerator};
use crate::resilience::{AttemptError, RetryPolicy};

/// One scenario to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioJob {
    pub class: &'static ScenarioClass,
    /// 1-based index within the class
    pub index: usize,
}

impl ScenarioJob {
    /// `count` jobs per class, grouped by class.
    pub fn batch(classes: &[&'static ScenarioClass], count: usize) -> Vec<Self> {
        classes
            .iter()
            .flat_map(|&class| (1..=count).map(move |index| ScenarioJob { class, index }))
            .collect()
    }

    fn label(&self) -> String {
        format!("{} #{}", self.class.name, self.index)
    }
}

pub struct ScenarioStage {
    generator: Arc<dyn TextGenerator>,
    template: PromptTemplate,
    allocator: RunAllocator,
    generation: GenerationConfig,
    retry: RetryPolicy,
}

impl ScenarioStage {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        template: PromptTemplate,
        allocator: RunAllocator,
        generation: GenerationConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            template,
            allocator,
            generation,
            retry,
        }
    }

    /// Generate every job with a pool of `workers` pulling from one queue.
    pub async fn run(self, jobs: Vec<ScenarioJob>, workers: usize) -> BatchReport {
        tracing::info!(
            jobs = jobs.len(),
            workers,
            output_dir = %self.allocator.base().display(),
            "Generating scenarios"
        );

        let stage = Arc::new(self);
        run_pull_queue(jobs, workers, move |job| {
            let stage = Arc::clone(&stage);
            async move {
                match stage.generate(job).await {
                    Ok(run) => {
                        tracing::info!(class = job.class.name, run_dir = %run.path().display(), "Saved scenario");
                        ItemOutcome::Succeeded
                    }
                    Err(e) => {
                        tracing::error!(class = job.class.name, error = %e, "Failed to generate scenario");
                        ItemOutcome::Failed
                    }
                }
            }
        })
        .await
    }

    /// Generate one scenario and persist it into a freshly allocated run.
    pub async fn generate(&self, job: ScenarioJob) -> Result<RunDir, ItemError> {
        let prompt = self.template.render(&[(SCENARIO_CLASS_FIELD, job.class.name)])?;

        let scenario = request_json(
            self.generator.as_ref(),
            &prompt,
            &self.generation,
            &self.retry,
            &job.label(),
            |value| ScenarioRecord::from_value(value).map_err(|e| AttemptError::Malformed(e.to_string())),
        )
        .await
        .map_err(ItemError::Generation)?;

        tracing::debug!(class = job.class.name, scenario = scenario.display_name(), "Scenario generated");

        // Allocation and the write share one critical section, so a run
        // directory never exists without its scenario.
        let (run, ()) = self
            .allocator
            .allocate_with(|run| run.write_scenario(&scenario))
            .map_err(ItemError::Persistence)?;
        Ok(run)
    }
}
