//! Symbolic interpretation of inline formulas.
//!
//! [`interpret`] parses the text between a pair of `$` delimiters into a
//! canonical sum of terms and renders it twice: a LaTeX display form and a
//! per-term coefficient summary. Interpretation is pure and bounded by
//! [`FormulaLimits`]; nothing in here allocates proportionally to anything
//! but the input.
//!
//! ```
//! use doc2speech::formula::{interpret, FormulaLimits};
//!
//! let i = interpret("x*x + 2*x + 1", &FormulaLimits::default()).unwrap();
//! assert_eq!(i.display, "x^{2} + 2 x + 1");
//! assert_eq!(i.summary, "{x**2: 1, x: 2, 1: 1}");
//! ```

mod expr;
mod number;
mod parse;
mod render;

use crate::error::FormulaError;
use serde::{Deserialize, Serialize};

/// Default upper bound on formula length, in characters.
pub const DEFAULT_MAX_FORMULA_LEN: usize = 256;

/// Default upper bound on nesting (parentheses, unary signs, calls).
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Resource bounds applied to a single formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaLimits {
    pub max_len: usize,
    pub max_depth: usize,
}

impl Default for FormulaLimits {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_FORMULA_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A successfully interpreted formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Canonical display form in LaTeX notation.
    pub display: String,
    /// Plain algebra notation, e.g. `x**2 + 2*x + 1`.
    pub plain: String,
    /// Coefficient per term, e.g. `{x**2: 1, x: 2, 1: 1}`.
    pub summary: String,
}

impl Interpretation {
    /// The sentence that replaces the formula in narrated text.
    pub fn describe(&self) -> String {
        format!("The expression {} represents {}", self.display, self.summary)
    }
}

/// Interpret `src` (the text between the delimiters, without them).
pub fn interpret(src: &str, limits: &FormulaLimits) -> Result<Interpretation, FormulaError> {
    if src.trim().is_empty() {
        return Err(FormulaError::Empty);
    }
    let len = src.chars().count();
    if len > limits.max_len {
        return Err(FormulaError::TooLong {
            len,
            limit: limits.max_len,
        });
    }
    let expr = parse::parse(src, limits.max_depth)?;
    Ok(Interpretation {
        display: render::latex(&expr),
        plain: render::plain(&expr),
        summary: render::coefficient_summary(&expr),
    })
}
