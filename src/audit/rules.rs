//! The fixed accessibility rule set.
//!
//! Each rule is a value (id, severity, tags, check) in [`RULES`]. Checks are
//! independent of each other and only read the document; the engine folds over
//! the list in order and merges the verdicts into one report.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use super::model::{Finding, NodeResult, Outcome, Severity};
use crate::error::EvaluationError;

/// Link texts that say nothing about the link target.
pub const GENERIC_LINK_TEXTS: [&str; 4] = ["Click here", "Read more", "Download", "Learn more"];

/// Longest markup snippet kept per node.
const MAX_SNIPPET_CHARS: usize = 300;

/// Selectors shared by all checks, compiled once per engine.
pub struct Selectors {
    img: Selector,
    button: Selector,
    input: Selector,
    label_for: Selector,
    heading: Selector,
    link: Selector,
    table: Selector,
    th: Selector,
    video: Selector,
    canvas: Selector,
}

impl Selectors {
    pub fn compile() -> Result<Self, EvaluationError> {
        Ok(Self {
            img: parse_selector("img")?,
            button: parse_selector("button")?,
            input: parse_selector("input")?,
            label_for: parse_selector("label[for]")?,
            heading: parse_selector("h1, h2, h3, h4, h5, h6")?,
            link: parse_selector("a[href]")?,
            table: parse_selector("table")?,
            th: parse_selector("th")?,
            video: parse_selector("video")?,
            canvas: parse_selector("canvas")?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, EvaluationError> {
    Selector::parse(selector).map_err(|e| EvaluationError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

/// One classified outcome produced by a rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    pub nodes: Vec<NodeResult>,
}

impl Verdict {
    fn element(outcome: Outcome, node: NodeResult) -> Self {
        Self {
            outcome,
            nodes: vec![node],
        }
    }

    fn no_candidates() -> Self {
        Self {
            outcome: Outcome::Inapplicable,
            nodes: Vec::new(),
        }
    }
}

type Check = fn(&Html, &Selectors) -> Vec<Verdict>;

/// A single accessibility rule.
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub tags: &'static [&'static str],
    pub description: &'static str,
    pub help: &'static str,
    pub help_url: &'static str,
    check: Check,
}

impl Rule {
    /// Run this rule's check against a document.
    pub fn check(&self, document: &Html, selectors: &Selectors) -> Vec<Verdict> {
        (self.check)(document, selectors)
    }

    /// Turn a verdict into a report finding carrying this rule's metadata.
    pub fn finding(&self, verdict: Verdict) -> Finding {
        let impact = match verdict.outcome {
            Outcome::Violation | Outcome::Incomplete => Some(self.severity),
            Outcome::Pass | Outcome::Inapplicable => None,
        };
        Finding {
            id: self.id.to_string(),
            impact,
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
            description: self.description.to_string(),
            help: Some(self.help.to_string()),
            help_url: Some(self.help_url.to_string()),
            nodes: verdict.nodes,
        }
    }
}

/// All rules, in evaluation order.
pub static RULES: [Rule; 8] = [
    Rule {
        id: "image-alt",
        severity: Severity::Critical,
        tags: &["cat.text-alternatives", "wcag2a", "wcag111"],
        description: "Ensures <img> elements have alternate text",
        help: "Images must have alternate text",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/non-text-content.html",
        check: check_image_alt,
    },
    Rule {
        id: "button-name",
        severity: Severity::Critical,
        tags: &["cat.name-role-value", "wcag2a", "wcag412"],
        description: "Ensures buttons have discernible text",
        help: "Buttons must have discernible text",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/name-role-value.html",
        check: check_button_name,
    },
    Rule {
        id: "label",
        severity: Severity::Critical,
        tags: &["cat.forms", "wcag2a", "wcag412"],
        description: "Ensures every form element has a label",
        help: "Form elements must have labels",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/labels-or-instructions.html",
        check: check_label,
    },
    Rule {
        id: "heading-order",
        severity: Severity::Moderate,
        tags: &["cat.semantics", "best-practice"],
        description: "Ensures the order of headings is semantically correct",
        help: "Heading levels should only increase by one",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/info-and-relationships.html",
        check: check_heading_order,
    },
    Rule {
        id: "link-name",
        severity: Severity::Serious,
        tags: &["cat.name-role-value", "wcag2a", "wcag244"],
        description: "Ensures links have discernible, descriptive text",
        help: "Links must have discernible text",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/link-purpose-in-context.html",
        check: check_link_name,
    },
    Rule {
        id: "table-headers",
        severity: Severity::Moderate,
        tags: &["cat.tables", "wcag2a", "wcag131"],
        description: "Ensures data tables have header cells",
        help: "Tables must have header cells",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/info-and-relationships.html",
        check: check_table_headers,
    },
    Rule {
        id: "video-caption",
        severity: Severity::Critical,
        tags: &["cat.time-and-media", "wcag2a", "wcag122"],
        description: "Ensures <video> elements have captions",
        help: "Video elements must have captions",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/captions-prerecorded.html",
        check: check_video_caption,
    },
    Rule {
        id: "canvas-alternative",
        severity: Severity::Unrated,
        tags: &["cat.text-alternatives", "best-practice"],
        description: "Ensures <canvas> content has a text alternative",
        help: "Canvas elements need fallback content",
        help_url: "https://www.w3.org/WAI/WCAG21/Understanding/non-text-content.html",
        check: check_canvas_alternative,
    },
];

// ── Checks ──────────────────────────────────────────────────────────────

fn check_image_alt(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    per_element(document, &selectors.img, |img, node| {
        if has_non_empty_attr(img, "alt") {
            Verdict::element(Outcome::Pass, node)
        } else {
            Verdict::element(
                Outcome::Violation,
                node.failing("Element does not have a non-empty alt attribute"),
            )
        }
    })
}

fn check_button_name(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    per_element(document, &selectors.button, |button, node| {
        if !visible_text(button).is_empty() || has_accessible_name_attr(button) {
            Verdict::element(Outcome::Pass, node)
        } else {
            Verdict::element(
                Outcome::Violation,
                node.failing("Element has no visible text and no aria-label, aria-labelledby or title"),
            )
        }
    })
}

fn check_label(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    let labelled_ids: HashSet<&str> = document
        .select(&selectors.label_for)
        .filter_map(|label| label.value().attr("for"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    per_element(document, &selectors.input, |input, node| {
        let is_hidden = input
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("hidden"));
        if is_hidden {
            return Verdict::element(Outcome::Inapplicable, node);
        }

        let has_label = input
            .value()
            .attr("id")
            .map(str::trim)
            .is_some_and(|id| !id.is_empty() && labelled_ids.contains(id));

        if has_label || has_non_empty_attr(input, "aria-label") || has_non_empty_attr(input, "aria-labelledby") {
            Verdict::element(Outcome::Pass, node)
        } else {
            Verdict::element(
                Outcome::Violation,
                node.failing("Form element has no aria-label, aria-labelledby or associated <label>"),
            )
        }
    })
}

fn check_heading_order(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    let mut previous: Option<u8> = None;
    per_element(document, &selectors.heading, |heading, node| {
        let level = heading_level(heading);
        let verdict = match previous {
            Some(prev) if level > prev + 1 => Verdict::element(
                Outcome::Violation,
                node.failing(&format!("Heading level {level} follows level {prev}")),
            ),
            _ => Verdict::element(Outcome::Pass, node),
        };
        previous = Some(level);
        verdict
    })
}

fn check_link_name(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    per_element(document, &selectors.link, |link, node| {
        let text = visible_text(link);
        if text.is_empty() {
            Verdict::element(Outcome::Violation, node.failing("Link has no visible text"))
        } else if GENERIC_LINK_TEXTS.contains(&text.as_str()) {
            Verdict::element(
                Outcome::Violation,
                node.failing(&format!("Link text \"{text}\" does not describe its target")),
            )
        } else {
            Verdict::element(Outcome::Pass, node)
        }
    })
}

fn check_table_headers(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    per_element(document, &selectors.table, |table, node| {
        if table.select(&selectors.th).any(|th| owned_by(th, table)) {
            Verdict::element(Outcome::Pass, node)
        } else {
            Verdict::element(Outcome::Violation, node.failing("Table has no <th> header cells"))
        }
    })
}

fn check_video_caption(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    let nodes: Vec<NodeResult> = document
        .select(&selectors.video)
        .enumerate()
        .map(|(i, video)| {
            NodeResult::of(video, i).failing("Check that the video has synchronized captions")
        })
        .collect();

    if nodes.is_empty() {
        Vec::new()
    } else {
        vec![Verdict {
            outcome: Outcome::Incomplete,
            nodes,
        }]
    }
}

fn check_canvas_alternative(document: &Html, selectors: &Selectors) -> Vec<Verdict> {
    if document.select(&selectors.canvas).next().is_none() {
        vec![Verdict::no_candidates()]
    } else {
        Vec::new()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Classify every element matching `selector`, or report the rule as
/// inapplicable when there are none.
fn per_element<F>(document: &Html, selector: &Selector, mut classify: F) -> Vec<Verdict>
where
    F: FnMut(ElementRef<'_>, NodeResult) -> Verdict,
{
    let verdicts: Vec<Verdict> = document
        .select(selector)
        .enumerate()
        .map(|(i, element)| classify(element, NodeResult::of(element, i)))
        .collect();

    if verdicts.is_empty() {
        vec![Verdict::no_candidates()]
    } else {
        verdicts
    }
}

impl NodeResult {
    /// Node for the `index`-th (0-based) candidate element of a rule.
    fn of(element: ElementRef<'_>, index: usize) -> Self {
        Self {
            target: vec![format!("{}[{}]", element.value().name(), index + 1)],
            html: snippet(&element.html()),
            failure_summary: None,
        }
    }

    fn failing(mut self, summary: &str) -> Self {
        self.failure_summary = Some(summary.to_string());
        self
    }
}

fn snippet(html: &str) -> String {
    if html.chars().count() <= MAX_SNIPPET_CHARS {
        html.to_string()
    } else {
        let mut cut: String = html.chars().take(MAX_SNIPPET_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

fn has_non_empty_attr(element: ElementRef<'_>, name: &str) -> bool {
    element
        .value()
        .attr(name)
        .is_some_and(|v| !v.trim().is_empty())
}

fn has_accessible_name_attr(element: ElementRef<'_>) -> bool {
    ["aria-label", "aria-labelledby", "title"]
        .iter()
        .any(|name| has_non_empty_attr(element, name))
}

/// Text content with the ends trimmed; inner whitespace is kept as written.
fn visible_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Whether `cell` belongs to `table` itself rather than to a table nested in it.
fn owned_by(cell: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    cell.ancestors()
        .find(|node| node.value().as_element().is_some_and(|e| e.name() == "table"))
        .is_some_and(|nearest| nearest.id() == table.id())
}

fn heading_level(heading: ElementRef<'_>) -> u8 {
    heading
        .value()
        .name()
        .strip_prefix('h')
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}
