//! Formula rewriting: replace inline `$…$` math with a spoken description.
//!
//! Spans are found with the lazy pattern `\$(.*?)\$`, left to right and
//! non-overlapping; `.` does not cross a newline, so an unbalanced `$` at the
//! end of a line never swallows the next one. Each span is handed to
//! [`crate::formula::interpret`]. A span that interprets becomes
//!
//! ```text
//! The expression <display> represents <summary>
//! ```
//!
//! and a span that does not is left exactly as written, delimiters included.
//! Rewriting never fails; every span's fate is recorded in a [`RewriteReport`].

use crate::formula::{interpret, FormulaLimits, Interpretation};
use crate::error::FormulaError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

static RE_FORMULA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(.*?)\$").unwrap());

/// Which occurrences a successful interpretation replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementScope {
    /// Each matched span is replaced where it was found. (default)
    #[default]
    SpanScoped,
    /// Every identical `$formula$` substring in the text is replaced, once per
    /// match, in match order. Overlapping delimiters elsewhere in the text can
    /// then be rewritten too.
    AllOccurrences,
}

impl std::str::FromStr for ReplacementScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "span" | "span-scoped" | "span_scoped" => Ok(ReplacementScope::SpanScoped),
            "all" | "all-occurrences" | "all_occurrences" => Ok(ReplacementScope::AllOccurrences),
            other => Err(format!("unknown replacement scope '{other}' (expected span or all)")),
        }
    }
}

/// Options for [`rewrite_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    pub scope: ReplacementScope,
    pub limits: FormulaLimits,
}

/// What happened to one `$…$` span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FormulaOutcome {
    /// Interpreted and replaced.
    Described {
        formula: String,
        #[serde(flatten)]
        interpretation: Interpretation,
        description: String,
    },
    /// Left verbatim.
    Verbatim { formula: String, reason: FormulaError },
}

impl FormulaOutcome {
    pub fn formula(&self) -> &str {
        match self {
            FormulaOutcome::Described { formula, .. } | FormulaOutcome::Verbatim { formula, .. } => {
                formula
            }
        }
    }

    pub fn is_described(&self) -> bool {
        matches!(self, FormulaOutcome::Described { .. })
    }
}

/// Outcome of every span, in match order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteReport {
    pub spans: Vec<FormulaOutcome>,
    /// Set when rewriting was abandoned and the text passed through as-is.
    #[serde(default)]
    pub skipped: bool,
}

impl RewriteReport {
    pub fn found(&self) -> usize {
        self.spans.len()
    }

    pub fn described(&self) -> usize {
        self.spans.iter().filter(|s| s.is_described()).count()
    }

    pub fn verbatim(&self) -> usize {
        self.found() - self.described()
    }
}

/// Rewritten text plus the per-span report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub text: String,
    pub report: RewriteReport,
}

fn outcome_for(formula: &str, limits: &FormulaLimits) -> FormulaOutcome {
    match interpret(formula, limits) {
        Ok(interpretation) => {
            let description = interpretation.describe();
            debug!(formula, %description, "Formula described");
            FormulaOutcome::Described {
                formula: formula.to_string(),
                interpretation,
                description,
            }
        }
        Err(reason) => {
            debug!(formula, %reason, "Formula left verbatim");
            FormulaOutcome::Verbatim {
                formula: formula.to_string(),
                reason,
            }
        }
    }
}

/// Rewrite every interpretable formula with default options.
pub fn rewrite(text: &str) -> String {
    rewrite_with(text, &RewriteOptions::default()).text
}

/// Rewrite formulas in `text` and report what happened to each span.
pub fn rewrite_with(text: &str, options: &RewriteOptions) -> Rewrite {
    let mut spans = Vec::new();

    let text = match options.scope {
        ReplacementScope::SpanScoped => RE_FORMULA
            .replace_all(text, |caps: &Captures| {
                let outcome = outcome_for(&caps[1], &options.limits);
                let replacement = match &outcome {
                    FormulaOutcome::Described { description, .. } => description.clone(),
                    FormulaOutcome::Verbatim { .. } => caps[0].to_string(),
                };
                spans.push(outcome);
                replacement
            })
            .into_owned(),
        ReplacementScope::AllOccurrences => {
            let formulas: Vec<String> = RE_FORMULA
                .captures_iter(text)
                .map(|caps| caps[1].to_string())
                .collect();
            let mut out = text.to_string();
            for formula in formulas {
                let outcome = outcome_for(&formula, &options.limits);
                if let FormulaOutcome::Described { description, .. } = &outcome {
                    out = out.replace(&format!("${formula}$"), description);
                }
                spans.push(outcome);
            }
            out
        }
    };

    Rewrite {
        text,
        report: RewriteReport {
            spans,
            skipped: false,
        },
    }
}

/// [`rewrite_with`] on the blocking pool, bounded by `budget`.
///
/// If the budget runs out (or the task dies) the input comes back unchanged
/// with an empty report marked `skipped`.
pub async fn rewrite_with_timeout(text: String, options: RewriteOptions, budget: Duration) -> Rewrite {
    let fallback = text.clone();
    bounded(fallback, budget, move || rewrite_with(&text, &options)).await
}

async fn bounded<F>(fallback: String, budget: Duration, work: F) -> Rewrite
where
    F: FnOnce() -> Rewrite + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(rewrite)) => rewrite,
        Ok(Err(e)) => {
            warn!("Formula rewriting task failed ({e}); narrating text unchanged");
            unchanged(fallback)
        }
        Err(_) => {
            warn!(
                "Formula rewriting exceeded {}ms; narrating text unchanged",
                budget.as_millis()
            );
            unchanged(fallback)
        }
    }
}

fn unchanged(text: String) -> Rewrite {
    Rewrite {
        text,
        report: RewriteReport {
            spans: Vec::new(),
            skipped: true,
        },
    }
}
