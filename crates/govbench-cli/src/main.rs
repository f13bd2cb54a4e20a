//! govbench CLI
//!
//! Scenario generation, governance log generation, judge evaluation and
//! statistical comparison for the governance benchmark.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use govbench_core::{select_classes, RunAllocator, RunStore, StatsReport};
use govbench_runtime::prompts::EVALUATION_FIELDS;
use govbench_runtime::providers::GOOGLE_API_KEY_ENV;
use govbench_runtime::{
    ApiCredential, EvaluationStage, GeminiProvider, GovernanceStage, PipelineConfig, PromptTemplate, ScenarioJob,
    ScenarioStage, TextGenerator,
};

#[derive(Parser)]
#[command(name = "govbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration file (YAML); flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic agent scenarios, one run directory each
    Scenarios {
        /// Base directory for run directories [default: data]
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Scenarios per selected class [default: 1]
        #[arg(long)]
        count: Option<usize>,

        /// Model name [default: gemini-1.5-flash-latest]
        #[arg(long)]
        model: Option<String>,

        /// Google API key (falls back to GOOGLE_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Restrict generation to these scenario classes
        #[arg(long, num_args = 1..)]
        classes: Vec<String>,

        /// Scenario prompt template [default: prompts/scenario_prompt.txt]
        #[arg(long)]
        scenario_prompt: Option<PathBuf>,

        /// Worker pool size [default: 4]
        #[arg(long)]
        num_workers: Option<usize>,
    },

    /// Generate a governance log for every scenario
    Governance {
        /// Base directory holding the run directories [default: data]
        base_dir: Option<PathBuf>,

        /// Model name [default: gemini-1.5-flash-latest]
        #[arg(long)]
        model: Option<String>,

        /// Google API key (falls back to GOOGLE_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Governance prompt template [default: prompts/governance_prompt.txt]
        #[arg(long)]
        governance_prompt: Option<PathBuf>,

        /// Runs processed at the same time [default: 5]
        #[arg(long)]
        concurrency: Option<usize>,

        /// Regenerate existing governance.json files
        #[arg(long)]
        overwrite: bool,
    },

    /// Judge every run and write the aggregate summary
    Evaluate {
        /// Base directory holding the run directories [default: data]
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Worker pool size [default: 4]
        #[arg(long)]
        num_workers: Option<usize>,

        /// Model name [default: gemini-1.5-flash-latest]
        #[arg(long)]
        model: Option<String>,

        /// Google API key (falls back to GOOGLE_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Evaluation prompt template [default: prompts/evaluation.txt]
        #[arg(long)]
        evaluation_prompt: Option<PathBuf>,

        /// Re-evaluate runs that already have an evaluation.json
        #[arg(long)]
        overwrite: bool,
    },

    /// Compare frameworks against the baseline with Wilcoxon tests
    Stats {
        /// Directory searched recursively for evaluation.json files [default: data]
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Scenarios {
            output_dir,
            count,
            model,
            api_key,
            classes,
            scenario_prompt,
            num_workers,
        } => {
            apply(&mut config.data_dir, output_dir);
            apply(&mut config.scenario.count, count);
            apply(&mut config.model, model);
            apply(&mut config.prompts.scenario, scenario_prompt);
            apply(&mut config.scenario.workers, num_workers);

            let generator = gemini(api_key).await?;
            let template = PromptTemplate::load_literal(&config.prompts.scenario)
                .context("Failed to load scenario prompt")?;

            let classes = select_classes(Some(&classes));
            let jobs = ScenarioJob::batch(&classes, config.scenario.count);
            tracing::info!(
                classes = classes.len(),
                count = config.scenario.count,
                model = %config.model,
                "Starting scenario generation"
            );

            let stage = ScenarioStage::new(
                generator,
                template,
                RunAllocator::new(&config.data_dir),
                config.scenario.generation_config(&config.model),
                config.scenario.retry.policy(),
            );
            let report = stage.run(jobs, config.scenario.workers).await;
            println!("Scenario generation finished: {report}");
        }

        Commands::Governance {
            base_dir,
            model,
            api_key,
            governance_prompt,
            concurrency,
            overwrite,
        } => {
            apply(&mut config.data_dir, base_dir);
            apply(&mut config.model, model);
            apply(&mut config.prompts.governance, governance_prompt);
            apply(&mut config.governance.concurrency, concurrency);

            let generator = gemini(api_key).await?;
            let template = PromptTemplate::load_literal(&config.prompts.governance)
                .context("Failed to load governance prompt")?;
            let store = RunStore::open(&config.data_dir)?;

            let stage = GovernanceStage::new(
                generator,
                template,
                config.governance.generation_config(&config.model),
                config.governance.retry.policy(),
            )
            .with_overwrite(overwrite);
            let report = stage.run(&store, config.governance.concurrency).await?;
            println!("Governance generation finished: {report}");
        }

        Commands::Evaluate {
            input_dir,
            num_workers,
            model,
            api_key,
            evaluation_prompt,
            overwrite,
        } => {
            apply(&mut config.data_dir, input_dir);
            apply(&mut config.evaluation.workers, num_workers);
            apply(&mut config.model, model);
            apply(&mut config.prompts.evaluation, evaluation_prompt);

            let generator = gemini(api_key).await?;
            let template = PromptTemplate::load_format(&config.prompts.evaluation, &EVALUATION_FIELDS)
                .context("Failed to load evaluation prompt")?;
            let store = RunStore::open(&config.data_dir)?;

            let stage = EvaluationStage::new(generator, template, config.evaluation.generation_config(&config.model))
                .with_overwrite(overwrite);
            let outcome = stage.run(&store, config.evaluation.workers).await?;
            println!("Evaluation finished: {}", outcome.report);
            if let Some(summary) = &outcome.summary {
                println!(
                    "Summary of {} evaluated scenarios written to {}",
                    summary.metadata.total_scenarios_evaluated,
                    store.summary_path().display()
                );
            }
        }

        Commands::Stats { input_dir, json } => {
            apply(&mut config.data_dir, input_dir);

            let store = RunStore::open(&config.data_dir)?;
            let records = store.load_evaluations()?;
            if records.is_empty() {
                tracing::error!(input_dir = %config.data_dir.display(), "No evaluation files found");
                return Ok(());
            }

            let report = StatsReport::compute(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render_text());
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins unless `--verbose` asks for debug output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn gemini(api_key: Option<String>) -> Result<Arc<dyn TextGenerator>> {
    let credential = ApiCredential::resolve(api_key, GOOGLE_API_KEY_ENV)?;
    tracing::debug!(source = %credential.source(), "Using API credential");

    let provider = GeminiProvider::new(credential)?;
    if !provider.health_check().await {
        bail!("API key is blank");
    }
    Ok(Arc::new(provider))
}

fn apply<T>(slot: &mut T, flag: Option<T>) {
    if let Some(value) = flag {
        *slot = value;
    }
}
