//! The three pipeline stages.
//!
//! Each stage builds a batch of work items, runs them through one of the
//! dispatch shapes, and returns a [`BatchReport`](crate::dispatch::BatchReport).
//! Only configuration problems surface as a [`StageError`]; anything that
//! goes wrong with a single item is logged and counted as a failure.

mod evaluation;
mod governance;
mod scenario;

pub use evaluation::{EvaluationOutcome, EvaluationStage};
pub use governance::GovernanceStage;
pub use scenario::{ScenarioJob, ScenarioStage};

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use govbench_core::{parse_json, StoreError};

use crate::prompts::TemplateError;
use crate::providers::{GenerationConfig, TextGenerator};
use crate::resilience::{AttemptError, RetryError, RetryPolicy};

/// Fatal errors raised before any work starts.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Result collector failed: {0}")]
    Collector(String),
}

/// Why a single work item did not succeed.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("{} not found", .0.display())]
    MissingInput(PathBuf),

    #[error("Malformed input: {0}")]
    MalformedInput(StoreError),

    #[error("Failed to render prompt: {0}")]
    Prompt(#[from] TemplateError),

    #[error("Generation failed: {0}")]
    Generation(RetryError),

    #[error("Evaluation failed: {0}")]
    Evaluation(RetryError),

    #[error("Failed to persist output: {0}")]
    Persistence(StoreError),
}

impl ItemError {
    /// Classify a failure to load an input artifact.
    fn from_load(e: StoreError) -> Self {
        match e {
            StoreError::MissingInput(path) => ItemError::MissingInput(path),
            other => ItemError::MalformedInput(other),
        }
    }
}

/// Ask the model for one JSON document and validate it with `parse`.
///
/// An empty response, a response without JSON, unparseable JSON and a
/// document rejected by `parse` all count as a failed attempt.
async fn request_json<T, P>(
    generator: &dyn TextGenerator,
    prompt: &str,
    config: &GenerationConfig,
    policy: &RetryPolicy,
    label: &str,
    parse: P,
) -> Result<T, RetryError>
where
    P: Fn(Value) -> Result<T, AttemptError>,
{
    policy
        .run(label, || async {
            let generation = generator.generate(prompt, config).await?;
            tracing::debug!(
                item = label,
                provider = generator.name(),
                tokens = generation.usage.total(),
                "Model responded"
            );
            if generation.text.trim().is_empty() {
                return Err(AttemptError::EmptyResponse);
            }
            let value: Value = parse_json(&generation.text)?;
            parse(value)
        })
        .await
}
