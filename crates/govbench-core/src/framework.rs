//! The governance frameworks under comparison and the scenario catalogue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three governance-logging frameworks being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "mi9_governance")]
    Mi9Governance,
    #[serde(rename = "opentelemetry")]
    OpenTelemetry,
    #[serde(rename = "langchain")]
    LangChain,
}

impl Framework {
    /// All recognized frameworks, baseline first.
    pub const ALL: [Framework; 3] = [
        Framework::Mi9Governance,
        Framework::OpenTelemetry,
        Framework::LangChain,
    ];

    /// The framework every other one is tested against.
    pub const BASELINE: Framework = Framework::Mi9Governance;

    /// Key used in evaluation records and reports.
    pub fn key(self) -> &'static str {
        match self {
            Framework::Mi9Governance => "mi9_governance",
            Framework::OpenTelemetry => "opentelemetry",
            Framework::LangChain => "langchain",
        }
    }

    /// Discriminator carried by governance log entries.
    pub fn log_tag(self) -> &'static str {
        match self {
            Framework::Mi9Governance => "MI9_GOVERNANCE",
            Framework::OpenTelemetry => "OPENTELEMETRY",
            Framework::LangChain => "LANGCHAIN",
        }
    }

    /// Resolve a governance log discriminator.
    pub fn from_log_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.log_tag() == tag)
    }

    /// Resolve a report key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// An archetype of agent behavior that scenarios are generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioClass {
    pub name: &'static str,
    pub description: &'static str,
}

/// The scenario catalogue, in generation order.
pub const SCENARIO_CLASSES: [ScenarioClass; 7] = [
    ScenarioClass {
        name: "Normal Operation",
        description: "Baseline agent behavior without any induced faults.",
    },
    ScenarioClass {
        name: "Goal Drift",
        description: "Agent's goals diverge from initial objectives over time.",
    },
    ScenarioClass {
        name: "Resource Overconsumption",
        description: "Agent uses excessive computational or financial resources.",
    },
    ScenarioClass {
        name: "Unauthorized Access Attempt",
        description: "Agent attempts to access data or systems it is not authorized for.",
    },
    ScenarioClass {
        name: "Prompt Injection Response",
        description: "Agent's behavior is manipulated through malicious user prompts.",
    },
    ScenarioClass {
        name: "Data Evasion Attack",
        description: "Agent is fed misleading data to alter its performance.",
    },
    ScenarioClass {
        name: "Model Inversion Attack",
        description: "Agent's internal model parameters are reverse-engineered.",
    },
];

/// Select scenario classes by name, keeping catalogue order.
///
/// `None` or an empty filter selects the whole catalogue. Unknown names are
/// ignored.
pub fn select_classes(filter: Option<&[String]>) -> Vec<&'static ScenarioClass> {
    match filter {
        Some(names) if !names.is_empty() => SCENARIO_CLASSES
            .iter()
            .filter(|class| names.iter().any(|n| n == class.name))
            .collect(),
        _ => SCENARIO_CLASSES.iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for framework in Framework::ALL {
            assert_eq!(Framework::from_log_tag(framework.log_tag()), Some(framework));
            assert_eq!(Framework::from_key(framework.key()), Some(framework));
        }
        assert_eq!(Framework::from_log_tag("mi9_governance"), None);
    }

    #[test]
    fn test_serde_uses_report_keys() {
        let json = serde_json::to_string(&Framework::OpenTelemetry).unwrap();
        assert_eq!(json, "\"opentelemetry\"");
    }

    #[test]
    fn test_select_classes() {
        assert_eq!(select_classes(None).len(), 7);

        let filter = vec!["Goal Drift".to_string(), "Normal Operation".to_string(), "Bogus".to_string()];
        let selected = select_classes(Some(&filter));
        let names: Vec<_> = selected.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Normal Operation", "Goal Drift"]);
    }
}
