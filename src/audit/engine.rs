//! Rule evaluation engine.
//!
//! Folds every rule in [`RULES`] over a parsed document and merges the verdicts
//! into a [`ScanReport`]. Pure: no I/O, no shared mutable state, so the same
//! document always yields the same report.

use scraper::Html;
use tracing::debug;

use super::model::ScanReport;
use super::rules::{RULES, Rule, Selectors};
use crate::config::AuditConfig;
use crate::error::EvaluationError;

/// Evaluates documents against the fixed rule set.
pub struct RuleEngine {
    selectors: Selectors,
    config: AuditConfig,
}

impl RuleEngine {
    /// Create an engine with compiled selectors.
    pub fn new(config: AuditConfig) -> Result<Self, EvaluationError> {
        Ok(Self {
            selectors: Selectors::compile()?,
            config,
        })
    }

    /// The rules this engine runs, in evaluation order.
    pub fn rules(&self) -> &'static [Rule] {
        &RULES
    }

    /// Evaluate an already-parsed document.
    pub fn evaluate(&self, document: &Html) -> ScanReport {
        RULES.iter().fold(ScanReport::default(), |mut report, rule| {
            for verdict in rule.check(document, &self.selectors) {
                report.push(verdict.outcome, rule.finding(verdict));
            }
            report
        })
    }

    /// Parse and evaluate raw markup.
    pub fn evaluate_html(&self, markup: &str) -> Result<ScanReport, EvaluationError> {
        if markup.len() > self.config.max_document_bytes {
            return Err(EvaluationError::DocumentTooLarge {
                length: markup.len(),
                max: self.config.max_document_bytes,
            });
        }

        let document = Html::parse_document(markup);
        let report = self.evaluate(&document);
        debug!(
            violations = report.violations.len(),
            passes = report.passes.len(),
            incomplete = report.incomplete.len(),
            inapplicable = report.inapplicable.len(),
            "Document evaluated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::audit::model::Outcome;

    fn engine() -> RuleEngine {
        RuleEngine::new(AuditConfig::default()).unwrap()
    }

    const SAMPLE: &str = r#"
        <html><body>
          <h1>Newsletter</h1>
          <h3>Offers</h3>
          <img src="hero.png">
          <img src="logo.png" alt="Company logo">
          <a href="/more">Read more</a>
          <a href="/privacy">View our privacy policy</a>
          <button></button>
          <form><input type="hidden" name="t"><input type="text" id="q"></form>
          <table><tr><td>1</td></tr></table>
          <video src="promo.mp4"></video>
        </body></html>
    "#;

    #[test]
    fn evaluation_is_deterministic() {
        let engine = engine();
        let first = engine.evaluate_html(SAMPLE).unwrap();
        let second = engine.evaluate_html(SAMPLE).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn attribute_order_is_stable_across_evaluations() {
        let engine = engine();
        let html = r#"<img src="a.png" width="10" height="20" class="hero" id="h">"#;

        let snippets: HashSet<String> = (0..20)
            .map(|_| {
                let report = engine.evaluate_html(html).unwrap();
                report.violations[0].nodes[0].html.clone()
            })
            .collect();

        assert_eq!(snippets.len(), 1);
        assert_eq!(
            snippets.into_iter().next().unwrap(),
            r#"<img src="a.png" width="10" height="20" class="hero" id="h">"#
        );
    }

    #[test]
    fn sample_document_is_classified() {
        let report = engine().evaluate_html(SAMPLE).unwrap();

        let violating: Vec<&str> = report.violations.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            violating,
            [
                "image-alt",
                "button-name",
                "label",
                "heading-order",
                "link-name",
                "table-headers"
            ]
        );
        assert_eq!(report.for_rule(Outcome::Pass, "image-alt").count(), 1);
        assert_eq!(report.for_rule(Outcome::Pass, "link-name").count(), 1);
        assert_eq!(report.for_rule(Outcome::Incomplete, "video-caption").count(), 1);
        assert_eq!(report.for_rule(Outcome::Inapplicable, "label").count(), 1);
        assert_eq!(report.for_rule(Outcome::Inapplicable, "canvas-alternative").count(), 1);
    }

    #[test]
    fn applicable_elements_land_in_exactly_one_collection() {
        let report = engine().evaluate_html(SAMPLE).unwrap();
        let mut targets: Vec<(String, String)> = report
            .violations
            .iter()
            .chain(&report.passes)
            .flat_map(|f| f.nodes.iter().map(move |n| (f.id.clone(), n.target.join(","))))
            .collect();
        let total = targets.len();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), total);
    }

    #[test]
    fn empty_document_is_all_inapplicable() {
        let report = engine().evaluate_html("").unwrap();
        assert!(report.violations.is_empty());
        assert!(report.passes.is_empty());
        assert!(report.incomplete.is_empty());
        // Six element rules plus canvas-alternative; video-caption reports nothing.
        assert_eq!(report.inapplicable.len(), 7);
    }

    #[test]
    fn malformed_markup_still_evaluates() {
        let report = engine().evaluate_html("<div><img src=x <p>unclosed").unwrap();
        assert!(!report.is_empty());
    }

    #[test]
    fn single_image_without_alt() {
        let report = engine().evaluate_html("<img>").unwrap();
        assert_eq!(report.for_rule(Outcome::Violation, "image-alt").count(), 1);
        assert_eq!(report.for_rule(Outcome::Pass, "image-alt").count(), 0);
    }

    #[test]
    fn oversized_document_is_rejected() {
        let engine = RuleEngine::new(AuditConfig {
            max_document_bytes: 16,
        })
        .unwrap();
        let err = engine.evaluate_html("<p>this is far too long</p>").unwrap_err();
        assert!(matches!(err, EvaluationError::DocumentTooLarge { max: 16, .. }));
    }

    #[test]
    fn exposes_rule_list() {
        assert_eq!(engine().rules().len(), 8);
    }
}
