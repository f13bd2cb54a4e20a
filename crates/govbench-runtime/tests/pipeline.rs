//! End-to-end run of all three stages against a scripted model, followed by
//! the statistical comparison over what they wrote.

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use govbench_core::{select_classes, Comparison, Framework, RunAllocator, RunStore, StatsReport};
use govbench_runtime::prompts::EVALUATION_FIELDS;
use govbench_runtime::{
    EvaluationStage, GenerationConfig, GovernanceStage, PromptTemplate, RetryPolicy, ScenarioJob, ScenarioStage,
    ScriptedGenerator,
};

const SCENARIO_PREFIX: &str = "SCENARIO REQUEST: ";

fn scenario_model() -> ScriptedGenerator {
    ScriptedGenerator::from_fn(|prompt, _| {
        let class = prompt.trim_start_matches(SCENARIO_PREFIX);
        Ok(format!(
            "Sure.\n```json\n{{\"scenario_name\": \"{class} case\", \"scenario_class\": \"{class}\"}}\n```"
        ))
    })
}

fn governance_model() -> ScriptedGenerator {
    // The very first reply has no JSON at all; the retry absorbs it.
    ScriptedGenerator::from_fn(|_, index| {
        if index == 0 {
            return Ok("I could not produce logs this time.".to_string());
        }
        Ok(r#"[
  {"type": "MI9_GOVERNANCE", "event": "goal_drift_detected"},
  {"type": "OPENTELEMETRY", "span": "tool_call"},
  {"type": "LANGCHAIN", "callback": "on_tool_end"},
  {"type": "AUDIT", "note": "ignored by partitions"}
]"#
        .to_string())
    })
}

fn judge_model() -> ScriptedGenerator {
    ScriptedGenerator::from_fn(|_, index| {
        let mi9 = 4.0 + (index % 3) as f64 * 0.5;
        Ok(format!(
            r#"{{
  "scenario_details": {{"scenario_category": "Goal Drift"}},
  "performance_comparison": {{
    "mi9_governance": {{
      "governance_maturity_score": {mi9},
      "detection_metrics": {{"detection_rate": 0.9, "violations_detected": ["drift"]}}
    }},
    "opentelemetry": {{
      "governance_maturity_score": 2,
      "detection_metrics": {{"detection_rate": 0.4, "violations_missed": ["drift"]}}
    }},
    "langchain": {{"governance_maturity_score": 3}}
  }}
}}"#
        ))
    })
}

#[tokio::test]
async fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("data");

    // Stage 1: one scenario per class.
    let scenarios = ScenarioStage::new(
        Arc::new(scenario_model()),
        PromptTemplate::literal(format!("{SCENARIO_PREFIX}{{scenario_class}}")),
        RunAllocator::new(&base),
        GenerationConfig::default(),
        RetryPolicy::new(3, Duration::from_millis(1)),
    );
    let classes = select_classes(None);
    let report = scenarios.run(ScenarioJob::batch(&classes, 1), 3).await;
    assert_eq!(report.succeeded, classes.len());
    assert_eq!(report.accounted(), report.enqueued);

    // A run directory without a scenario fails in every later stage.
    let orphan = classes.len() + 1;
    fs::create_dir_all(base.join(orphan.to_string())).unwrap();

    let store = RunStore::open(&base).unwrap();
    assert_eq!(store.run_dirs().unwrap().len(), classes.len() + 1);

    // Stage 2.
    let governance_generator = Arc::new(governance_model());
    let report = GovernanceStage::new(
        governance_generator.clone(),
        PromptTemplate::literal("GOVERNANCE REQUEST:\n{scenario_json}"),
        GenerationConfig::default(),
        RetryPolicy::new(2, Duration::from_millis(1)),
    )
    .run(&store, 2)
    .await
    .unwrap();
    assert_eq!(report.succeeded, classes.len());
    assert_eq!(report.failed, 1);
    assert_eq!(governance_generator.calls(), classes.len() + 1);
    assert!(governance_generator.prompts()[0].contains("\"scenario_name\""));

    // Stage 3.
    let judge = Arc::new(judge_model());
    let template = PromptTemplate::format(
        "EVALUATION REQUEST\n{scenario_json}\nMI9={mi9_logs_json}\nOTEL={opentelemetry_logs_json}\nLC={langchain_logs_json}\nReply as {{\"performance_comparison\": ...}}",
        &EVALUATION_FIELDS,
    )
    .unwrap();
    let outcome = EvaluationStage::new(judge.clone(), template.clone(), GenerationConfig::default())
        .run(&store, 4)
        .await
        .unwrap();

    assert_eq!(outcome.report.succeeded, classes.len());
    assert_eq!(outcome.report.failed, 1);
    assert_eq!(outcome.report.lost, 0);

    let prompt = &judge.prompts()[0];
    assert!(prompt.contains("goal_drift_detected"));
    assert!(!prompt.contains("ignored by partitions"));
    assert!(prompt.contains("Reply as {\"performance_comparison\": ...}"));

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.metadata.total_scenarios_evaluated, classes.len());
    let otel = &summary.performance_summary[&Framework::OpenTelemetry];
    assert_eq!(otel.governance_maturity_score_avg, Some(2.0));
    assert!(otel.detection_metrics_avg.total_violations_missed.contains("drift"));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.summary_path()).unwrap()).unwrap();
    assert_eq!(
        written["metadata"]["total_scenarios_evaluated"],
        serde_json::json!(classes.len())
    );

    // A second evaluation pass reuses every stored verdict.
    let rerun = EvaluationStage::new(Arc::new(judge_model()), template, GenerationConfig::default())
        .run(&store, 4)
        .await
        .unwrap();
    assert_eq!(rerun.report.skipped, classes.len());
    assert_eq!(rerun.summary.unwrap().metadata.total_scenarios_evaluated, classes.len());

    // Statistics over the persisted records.
    let records = store.load_evaluations().unwrap();
    assert_eq!(records.len(), classes.len());

    let stats = StatsReport::compute(&records);
    assert_eq!(stats.baseline, "mi9_governance");
    assert_eq!(stats.sample_count, classes.len());

    let maturity = stats
        .metrics
        .iter()
        .find(|m| m.metric == "governance_maturity_score")
        .unwrap();
    assert_eq!(maturity.descriptives["opentelemetry"].mean, 2.0);
    match &maturity.comparisons["opentelemetry"] {
        Comparison::Tested { p_value, .. } => assert!(*p_value < 0.05),
        other => panic!("expected a test result, got {other:?}"),
    }

    let text = stats.render_text();
    assert!(text.contains("governance_maturity_score"));
}
