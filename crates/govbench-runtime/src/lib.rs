//! # govbench-runtime
//!
//! Model-driven half of the governance benchmark.
//!
//! Three stages, each a batch of independent work items:
//!
//! 1. **Scenarios**: generate synthetic agent scenarios, one new run
//!    directory each.
//! 2. **Governance**: generate a governance log for every scenario, with
//!    entries tagged by the framework that produced them.
//! 3. **Evaluation**: have a judge model compare the frameworks for every
//!    run, then aggregate the verdicts.
//!
//! Records, storage and statistics live in `govbench-core`; this crate adds
//! the provider abstraction, retries, concurrency and prompt templates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use govbench_runtime::{GovernanceStage, PipelineConfig, PromptTemplate};
//!
//! let config = PipelineConfig::default();
//! let template = PromptTemplate::load_literal(&config.prompts.governance)?;
//! let stage = GovernanceStage::new(
//!     generator,
//!     template,
//!     config.governance.generation_config(&config.model),
//!     config.governance.retry.policy(),
//! );
//! let report = stage.run(&RunStore::open(&config.data_dir)?, config.governance.concurrency).await?;
//! println!("{report}");
//! ```

pub mod config;
pub mod dispatch;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod stages;

pub use config::{ConfigError, PipelineConfig};
pub use dispatch::{run_bounded, run_pull_queue, BatchReport, ItemOutcome, WorkQueue};
pub use prompts::{PromptTemplate, TemplateError};
pub use providers::{
    ApiCredential, Generation, GenerationConfig, ProviderError, ScriptedGenerator, TextGenerator,
};
pub use resilience::{AttemptError, RetryError, RetryPolicy};
pub use stages::{EvaluationOutcome, EvaluationStage, GovernanceStage, ScenarioJob, ScenarioStage, StageError};

#[cfg(feature = "gemini")]
pub use providers::GeminiProvider;
