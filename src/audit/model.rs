//! Report types produced by the rule engine.

use serde::{Deserialize, Serialize};

/// Severity class of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Serious,
    Moderate,
    Minor,
    /// Rules that are never reported as failures.
    #[serde(rename = "none")]
    Unrated,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Serious => "serious",
            Self::Moderate => "moderate",
            Self::Minor => "minor",
            Self::Unrated => "none",
        }
    }
}

/// Which of the four report collections a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Violation,
    Pass,
    Incomplete,
    Inapplicable,
}

/// One element referenced by a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// Rule-scoped positional locators, e.g. `img[2]`.
    pub target: Vec<String>,
    /// Markup of the element.
    pub html: String,
    /// Why the element failed. Only set for violations and incomplete results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
}

/// One rule-evaluation outcome for one element or element class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Rule id.
    pub id: String,
    /// Rule severity; `None` for passes and inapplicable results.
    pub impact: Option<Severity>,
    pub tags: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    pub nodes: Vec<NodeResult>,
}

/// The four-way partition of findings for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub violations: Vec<Finding>,
    pub passes: Vec<Finding>,
    pub incomplete: Vec<Finding>,
    pub inapplicable: Vec<Finding>,
}

impl ScanReport {
    /// Append a finding to the collection for `outcome`.
    pub fn push(&mut self, outcome: Outcome, finding: Finding) {
        match outcome {
            Outcome::Violation => self.violations.push(finding),
            Outcome::Pass => self.passes.push(finding),
            Outcome::Incomplete => self.incomplete.push(finding),
            Outcome::Inapplicable => self.inapplicable.push(finding),
        }
    }

    /// Findings in `outcome`'s collection for the given rule id.
    pub fn for_rule<'a>(&'a self, outcome: Outcome, rule_id: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        let collection = match outcome {
            Outcome::Violation => &self.violations,
            Outcome::Pass => &self.passes,
            Outcome::Incomplete => &self.incomplete,
            Outcome::Inapplicable => &self.inapplicable,
        };
        collection.iter().filter(move |f| f.id == rule_id)
    }

    /// Total number of findings across all collections.
    pub fn len(&self) -> usize {
        self.violations.len() + self.passes.len() + self.incomplete.len() + self.inapplicable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
