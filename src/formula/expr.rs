//! Canonical sum-of-terms representation.
//!
//! Every expression is kept as `Σ coefficient · monomial`, where a monomial
//! maps factors to non-zero exponents. Construction goes through the
//! arithmetic methods below, which combine like terms as they go, so two
//! spellings of the same polynomial end up structurally equal.
//!
//! Sums are only distributed over by plain numbers; a product that involves a
//! multi-term sum keeps the sum as a [`Factor::Group`].

use super::number::Number;
use crate::error::FormulaError;
use std::collections::BTreeMap;

/// Largest integer exponent applied to a number or a monomial.
pub const MAX_EXPONENT: i128 = 64;

/// An irreducible factor of a monomial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Factor {
    Symbol(String),
    /// A function application that is not evaluated, e.g. `sin(x)`.
    Call(String, Vec<Expr>),
    /// A sum with at least two terms.
    Group(Expr),
    /// A power the canonical form cannot fold into an exponent.
    Power(Box<Expr>, Box<Expr>),
}

/// Product of factors raised to exponents. The empty monomial is `1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial(pub BTreeMap<Factor, Number>);

impl Monomial {
    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    fn single(factor: Factor, exp: Number) -> Monomial {
        let mut m = BTreeMap::new();
        m.insert(factor, exp);
        Monomial(m)
    }

    fn mul(&self, other: &Monomial) -> Result<Monomial, FormulaError> {
        let mut out = self.0.clone();
        for (factor, exp) in &other.0 {
            let merged = match out.get(factor) {
                Some(existing) => existing.add(*exp)?,
                None => *exp,
            };
            if merged.is_zero() {
                out.remove(factor);
            } else {
                out.insert(factor.clone(), merged);
            }
        }
        Ok(Monomial(out))
    }

    fn scale_exponents(&self, by: Number) -> Result<Monomial, FormulaError> {
        let mut out = BTreeMap::new();
        for (factor, exp) in &self.0 {
            out.insert(factor.clone(), exp.mul(by)?);
        }
        Ok(Monomial(out))
    }

    /// Sum of the exponents, used to order terms by degree.
    pub fn degree(&self) -> f64 {
        self.0.values().map(|e| e.to_f64()).sum()
    }
}

/// A canonical expression: monomials with non-zero coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expr {
    pub terms: BTreeMap<Monomial, Number>,
}

impl Expr {
    pub fn zero() -> Expr {
        Expr::default()
    }

    pub fn number(n: Number) -> Expr {
        let mut terms = BTreeMap::new();
        if !n.is_zero() {
            terms.insert(Monomial::default(), n);
        }
        Expr { terms }
    }

    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::monomial(Monomial::single(Factor::Symbol(name.into()), Number::ONE), Number::ONE)
    }

    fn monomial(m: Monomial, coefficient: Number) -> Expr {
        let mut terms = BTreeMap::new();
        if !coefficient.is_zero() {
            terms.insert(m, coefficient);
        }
        Expr { terms }
    }

    fn factor(f: Factor) -> Expr {
        Expr::monomial(Monomial::single(f, Number::ONE), Number::ONE)
    }

    /// The value of a constant expression.
    pub fn as_constant(&self) -> Option<Number> {
        match self.terms.len() {
            0 => Some(Number::ZERO),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_one())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    fn as_single_term(&self) -> Option<(&Monomial, Number)> {
        if self.terms.len() == 1 {
            self.terms.iter().next().map(|(m, c)| (m, *c))
        } else {
            None
        }
    }

    pub fn add(&self, other: &Expr) -> Result<Expr, FormulaError> {
        let mut terms = self.terms.clone();
        for (m, c) in &other.terms {
            let merged = match terms.get(m) {
                Some(existing) => existing.add(*c)?,
                None => *c,
            };
            if merged.is_zero() {
                terms.remove(m);
            } else {
                terms.insert(m.clone(), merged);
            }
        }
        Ok(Expr { terms })
    }

    pub fn neg(&self) -> Result<Expr, FormulaError> {
        self.scale(Number::MINUS_ONE)
    }

    pub fn sub(&self, other: &Expr) -> Result<Expr, FormulaError> {
        self.add(&other.neg()?)
    }

    fn scale(&self, by: Number) -> Result<Expr, FormulaError> {
        if by.is_zero() {
            return Ok(Expr::zero());
        }
        let mut terms = BTreeMap::new();
        for (m, c) in &self.terms {
            let scaled = c.mul(by)?;
            if !scaled.is_zero() {
                terms.insert(m.clone(), scaled);
            }
        }
        Ok(Expr { terms })
    }

    pub fn mul(&self, other: &Expr) -> Result<Expr, FormulaError> {
        if let Some(c) = self.as_constant() {
            return other.scale(c);
        }
        if let Some(c) = other.as_constant() {
            return self.scale(c);
        }
        let (lhs_m, lhs_c) = match self.as_single_term() {
            Some((m, c)) => (m.clone(), c),
            None => (Monomial::single(Factor::Group(self.clone()), Number::ONE), Number::ONE),
        };
        let (rhs_m, rhs_c) = match other.as_single_term() {
            Some((m, c)) => (m.clone(), c),
            None => (Monomial::single(Factor::Group(other.clone()), Number::ONE), Number::ONE),
        };
        Ok(Expr::monomial(lhs_m.mul(&rhs_m)?, lhs_c.mul(rhs_c)?))
    }

    pub fn div(&self, other: &Expr) -> Result<Expr, FormulaError> {
        if other.as_constant().is_some_and(Number::is_zero) {
            return Err(FormulaError::DivisionByZero);
        }
        self.mul(&other.pow(&Expr::number(Number::MINUS_ONE))?)
    }

    pub fn pow(&self, exponent: &Expr) -> Result<Expr, FormulaError> {
        let Some(e) = exponent.as_constant() else {
            return Ok(self.opaque_power(exponent));
        };
        if e.is_zero() {
            return Ok(Expr::number(Number::ONE));
        }
        if e.is_one() {
            return Ok(self.clone());
        }
        if let Some(n) = e.as_integer() {
            if n.unsigned_abs() > MAX_EXPONENT as u128 {
                return Err(FormulaError::Overflow);
            }
            if let Some(base) = self.as_constant() {
                return Ok(Expr::number(base.powi(n)?));
            }
            return match self.as_single_term() {
                Some((m, c)) => Ok(Expr::monomial(m.scale_exponents(e)?, c.powi(n)?)),
                None => Ok(Expr::monomial(
                    Monomial::single(Factor::Group(self.clone()), e),
                    Number::ONE,
                )),
            };
        }

        // Fractional or float exponent.
        if let Some(base) = self.as_constant() {
            if base.is_float() || e.is_float() {
                if base.is_negative() {
                    return Err(FormulaError::Unsupported(
                        "fractional power of a negative number".into(),
                    ));
                }
                return Ok(Expr::number(Number::float(base.to_f64().powf(e.to_f64()))?));
            }
            return Ok(self.opaque_power(exponent));
        }
        if let Some((m, c)) = self.as_single_term() {
            if c.is_one() && m.0.len() == 1 {
                if let Some((factor, exp)) = m.0.iter().next() {
                    if exp.is_one() {
                        return Ok(Expr::monomial(Monomial::single(factor.clone(), e), Number::ONE));
                    }
                }
            }
        }
        Ok(self.opaque_power(exponent))
    }

    fn opaque_power(&self, exponent: &Expr) -> Expr {
        Expr::factor(Factor::Power(Box::new(self.clone()), Box::new(exponent.clone())))
    }

    /// Apply a named function. `sqrt` folds into a half power, everything
    /// else stays symbolic.
    pub fn call(name: &str, args: Vec<Expr>) -> Result<Expr, FormulaError> {
        if name == "sqrt" {
            if args.len() != 1 {
                return Err(FormulaError::Unsupported(format!(
                    "sqrt takes one argument, got {}",
                    args.len()
                )));
            }
            return args[0].pow(&Expr::number(Number::HALF));
        }
        Ok(Expr::factor(Factor::Call(name.to_string(), args)))
    }

    /// Terms in display order: descending degree, constant term last.
    pub fn ordered_terms(&self) -> Vec<(&Monomial, Number)> {
        let mut terms: Vec<(&Monomial, Number)> = self.terms.iter().map(|(m, c)| (m, *c)).collect();
        terms.sort_by(|(a, _), (b, _)| {
            a.is_one()
                .cmp(&b.is_one())
                .then_with(|| b.degree().total_cmp(&a.degree()))
                .then_with(|| a.cmp(b))
        });
        terms
    }
}
