//! Two renderings of a canonical [`Expr`]:
//!
//! * [`latex`]: the display form, e.g. `x^{2} + 2 x + 1`
//! * [`coefficient_summary`]: the per-term breakdown, e.g.
//!   `{x**2: 1, x: 2, 1: 1}`
//!
//! Both share [`TermParts`], which splits a term into sign, numerator and
//! denominator pieces so fractions come out the same way in either notation.

use super::expr::{Expr, Factor, Monomial};
use super::number::{format_float, Number};

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau", "upsilon", "phi", "chi",
    "psi", "omega",
];

/// Functions that have a LaTeX operator name.
const LATEX_FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "sinh", "cosh", "tanh", "log", "ln", "exp", "min",
    "max", "arcsin", "arccos", "arctan",
];

#[derive(Clone, Copy, PartialEq)]
enum Style {
    Latex,
    Plain,
}

struct TermParts {
    negative: bool,
    numerator: Vec<String>,
    denominator: Vec<String>,
}

fn number_plain(n: Number) -> String {
    match n {
        Number::Rational { num, den: 1 } => num.to_string(),
        Number::Rational { num, den } => format!("{num}/{den}"),
        Number::Float(f) => format_float(f),
    }
}

fn number_latex(n: Number) -> String {
    match n {
        Number::Rational { num, den: 1 } => num.to_string(),
        Number::Rational { num, den } if num < 0 => format!("- \\frac{{{}}}{{{den}}}", -num),
        Number::Rational { num, den } => format!("\\frac{{{num}}}{{{den}}}"),
        Number::Float(f) => format_float(f),
    }
}

fn symbol_latex(name: &str) -> String {
    let greek = |s: &str| -> Option<String> {
        let lower = s.to_ascii_lowercase();
        if !s.is_ascii() || !GREEK.contains(&lower.as_str()) {
            return None;
        }
        if s.chars().next().is_some_and(char::is_uppercase) && s[1..] == lower[1..] {
            let mut cap = lower.clone();
            cap[..1].make_ascii_uppercase();
            Some(format!("\\{cap}"))
        } else if s == lower {
            Some(format!("\\{lower}"))
        } else {
            None
        }
    };
    let head_latex = |s: &str| greek(s).unwrap_or_else(|| s.to_string());

    if let Some((head, sub)) = name.split_once('_') {
        if !head.is_empty() && !sub.is_empty() {
            return format!("{}_{{{}}}", head_latex(head), head_latex(sub));
        }
    }
    let split = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if split > 0 && split < name.len() {
        return format!("{}_{{{}}}", head_latex(&name[..split]), &name[split..]);
    }
    head_latex(name)
}

/// Whether a rendered factor base needs parentheses before an exponent.
fn is_compound(expr: &Expr) -> bool {
    if expr.terms.len() > 1 {
        return true;
    }
    match expr.terms.iter().next() {
        None => false,
        Some((m, c)) => {
            let factors = m.0.len();
            let has_coefficient = !c.is_one();
            c.is_negative()
                || factors > 1
                || (factors == 1 && has_coefficient)
                || m.0.values().any(|e| !e.is_one())
                || (m.is_one() && !matches!(c, Number::Rational { den: 1, .. }))
        }
    }
}

fn render_expr(expr: &Expr, style: Style) -> String {
    let terms = expr.ordered_terms();
    if terms.is_empty() {
        return "0".to_string();
    }
    let mut out = String::new();
    for (i, (m, c)) in terms.into_iter().enumerate() {
        let parts = term_parts(c, m, style);
        let body = join_parts(&parts, style);
        match (i, parts.negative) {
            (0, true) => {
                out.push('-');
                if style == Style::Latex {
                    out.push(' ');
                }
                out.push_str(&body);
            }
            (0, false) => out.push_str(&body),
            (_, true) => {
                out.push_str(" - ");
                out.push_str(&body);
            }
            (_, false) => {
                out.push_str(" + ");
                out.push_str(&body);
            }
        }
    }
    out
}

fn term_parts(coefficient: Number, m: &Monomial, style: Style) -> TermParts {
    let negative = coefficient.is_negative();
    let magnitude = coefficient.abs().unwrap_or(coefficient);
    let mut numerator = Vec::new();
    let mut denominator = Vec::new();

    let has_positive = m.0.values().any(|e| !e.is_negative());
    match magnitude {
        Number::Float(f) => numerator.push(format_float(f)),
        Number::Rational { num, den } => {
            if num != 1 || !has_positive {
                numerator.push(num.to_string());
            }
            if den != 1 {
                denominator.push(den.to_string());
            }
        }
    }

    for (factor, exp) in &m.0 {
        if exp.is_negative() {
            let positive = exp.neg().unwrap_or(*exp);
            denominator.push(factor_power(factor, positive, style));
        } else {
            numerator.push(factor_power(factor, *exp, style));
        }
    }

    // "1" is only a placeholder when nothing else sits on top.
    if numerator.len() > 1 {
        numerator.retain(|p| p != "1");
    }

    TermParts {
        negative,
        numerator,
        denominator,
    }
}

fn join_parts(parts: &TermParts, style: Style) -> String {
    let sep = match style {
        Style::Latex => " ",
        Style::Plain => "*",
    };
    let num = if parts.numerator.is_empty() {
        "1".to_string()
    } else {
        parts.numerator.join(sep)
    };
    if parts.denominator.is_empty() {
        return num;
    }
    let den = parts.denominator.join(sep);
    match style {
        Style::Latex => format!("\\frac{{{num}}}{{{den}}}"),
        Style::Plain if parts.denominator.len() > 1 => format!("{num}/({den})"),
        Style::Plain => format!("{num}/{den}"),
    }
}

fn factor_base(factor: &Factor, style: Style) -> String {
    match (factor, style) {
        (Factor::Symbol(name), Style::Latex) => symbol_latex(name),
        (Factor::Symbol(name), Style::Plain) => name.clone(),
        (Factor::Call(name, args), Style::Latex) => {
            let args: Vec<String> = args.iter().map(|a| render_expr(a, style)).collect();
            let head = if LATEX_FUNCTIONS.contains(&name.as_str()) {
                format!("\\{name}")
            } else {
                symbol_latex(name)
            };
            format!("{head}{{\\left({} \\right)}}", args.join(", "))
        }
        (Factor::Call(name, args), Style::Plain) => {
            let args: Vec<String> = args.iter().map(|a| render_expr(a, style)).collect();
            format!("{name}({})", args.join(", "))
        }
        (Factor::Group(inner), Style::Latex) => {
            format!("\\left({}\\right)", render_expr(inner, style))
        }
        (Factor::Group(inner), Style::Plain) => format!("({})", render_expr(inner, style)),
        (Factor::Power(base, exp), _) => {
            let b = wrap(base, style);
            let e = render_expr(exp, style);
            match style {
                Style::Latex => format!("{b}^{{{e}}}"),
                Style::Plain if is_compound(exp) => format!("{b}**({e})"),
                Style::Plain => format!("{b}**{e}"),
            }
        }
    }
}

fn wrap(expr: &Expr, style: Style) -> String {
    let rendered = render_expr(expr, style);
    if !is_compound(expr) {
        return rendered;
    }
    match style {
        Style::Latex => format!("\\left({rendered}\\right)"),
        Style::Plain => format!("({rendered})"),
    }
}

/// Rendering of the bare inner expression, without the group's parentheses.
fn sqrt_inner(factor: &Factor, style: Style) -> String {
    match factor {
        Factor::Group(inner) => render_expr(inner, style),
        other => factor_base(other, style),
    }
}

fn factor_power(factor: &Factor, exp: Number, style: Style) -> String {
    if exp.is_one() {
        return factor_base(factor, style);
    }
    if exp == Number::HALF {
        let inner = sqrt_inner(factor, style);
        return match style {
            Style::Latex => format!("\\sqrt{{{inner}}}"),
            Style::Plain => format!("sqrt({inner})"),
        };
    }
    let mut base = factor_base(factor, style);
    if matches!(factor, Factor::Power(..)) {
        base = match style {
            Style::Latex => format!("\\left({base}\\right)"),
            Style::Plain => format!("({base})"),
        };
    }
    match style {
        Style::Latex => format!("{base}^{{{}}}", number_latex(exp)),
        Style::Plain => match exp {
            Number::Rational { den, .. } if den != 1 => format!("{base}**({})", number_plain(exp)),
            _ => format!("{base}**{}", number_plain(exp)),
        },
    }
}

/// Display form in LaTeX notation.
pub fn latex(expr: &Expr) -> String {
    render_expr(expr, Style::Latex)
}

/// Plain-text algebra notation (`x**2 + 2*x + 1`).
pub fn plain(expr: &Expr) -> String {
    render_expr(expr, Style::Plain)
}

/// Per-term coefficient breakdown: `{monomial: coefficient, ...}`.
pub fn coefficient_summary(expr: &Expr) -> String {
    let entries: Vec<String> = expr
        .ordered_terms()
        .into_iter()
        .map(|(m, c)| {
            let parts = term_parts(Number::ONE, m, Style::Plain);
            format!("{}: {}", join_parts(&parts, Style::Plain), number_plain(c))
        })
        .collect();
    if entries.is_empty() {
        // The zero expression still has a constant slot.
        return "{1: 0}".to_string();
    }
    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse;
    use super::*;

    fn both(src: &str) -> (String, String) {
        let e = parse(src, 64).unwrap();
        (latex(&e), coefficient_summary(&e))
    }

    #[test]
    fn constant() {
        assert_eq!(both("1+1"), ("2".into(), "{1: 2}".into()));
    }

    #[test]
    fn bare_symbol() {
        assert_eq!(both("E"), ("E".into(), "{E: 1}".into()));
    }

    #[test]
    fn quadratic() {
        assert_eq!(
            both("x^2 + 2*x + 1"),
            ("x^{2} + 2 x + 1".into(), "{x**2: 1, x: 2, 1: 1}".into())
        );
    }

    #[test]
    fn negative_leading_term() {
        let (tex, summary) = both("3 - x");
        assert_eq!(tex, "- x + 3");
        assert_eq!(summary, "{x: -1, 1: 3}");
    }

    #[test]
    fn fractions() {
        let (tex, summary) = both("x/2");
        assert_eq!(tex, "\\frac{x}{2}");
        assert_eq!(summary, "{x: 1/2}");
        assert_eq!(both("1/y").0, "\\frac{1}{y}");
    }

    #[test]
    fn square_root() {
        let (tex, summary) = both("sqrt(x)");
        assert_eq!(tex, "\\sqrt{x}");
        assert_eq!(summary, "{sqrt(x): 1}");
    }

    #[test]
    fn functions_and_greek() {
        assert_eq!(both("sin(theta)").0, "\\sin{\\left(\\theta \\right)}");
        assert_eq!(both("Omega").0, "\\Omega");
        assert_eq!(both("x1").0, "x_{1}");
    }

    #[test]
    fn grouped_products() {
        let (tex, summary) = both("2*x*(x+1)");
        assert_eq!(tex, "2 x \\left(x + 1\\right)");
        assert_eq!(summary, "{x*(x + 1): 2}");
    }

    #[test]
    fn squared_group() {
        let (tex, summary) = both("(x+1)*(x+1)");
        assert_eq!(tex, "\\left(x + 1\\right)^{2}");
        assert_eq!(summary, "{(x + 1)**2: 1}");
    }

    #[test]
    fn floats_keep_decimal_point() {
        assert_eq!(both("0.5*x").1, "{x: 0.5}");
        assert_eq!(both("1.5 + 0.5").0, "2.0");
    }

    #[test]
    fn zero() {
        assert_eq!(both("x - x"), ("0".into(), "{1: 0}".into()));
    }

    #[test]
    fn symbolic_power() {
        assert_eq!(both("x^y").0, "x^{y}");
        assert_eq!(plain(&parse("x^(y+1)", 64).unwrap()), "x**(y + 1)");
    }
}
