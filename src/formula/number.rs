//! Exact rationals with a float escape hatch.
//!
//! Integer literals stay exact (`1/3 + 1/3 = 2/3`), decimal literals become
//! floats and make every result they touch a float. All integer arithmetic is
//! checked; leaving the `i128` range is a [`FormulaError::Overflow`].

use crate::error::FormulaError;
use std::cmp::Ordering;

/// A coefficient or exponent.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Reduced fraction with a positive denominator.
    Rational { num: i128, den: i128 },
    /// Any value written with a decimal point or exponent.
    Float(f64),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Number {
    pub const ZERO: Number = Number::Rational { num: 0, den: 1 };
    pub const ONE: Number = Number::Rational { num: 1, den: 1 };
    pub const MINUS_ONE: Number = Number::Rational { num: -1, den: 1 };
    pub const HALF: Number = Number::Rational { num: 1, den: 2 };

    pub fn int(n: i128) -> Number {
        Number::Rational { num: n, den: 1 }
    }

    /// Build a reduced fraction.
    ///
    /// `i128::MIN` has no positive counterpart, so it is rejected as an
    /// overflow on either side.
    pub fn ratio(num: i128, den: i128) -> Result<Number, FormulaError> {
        if den == 0 {
            return Err(FormulaError::DivisionByZero);
        }
        if num == i128::MIN || den == i128::MIN {
            return Err(FormulaError::Overflow);
        }
        let g = gcd(num, den);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = num.checked_neg().ok_or(FormulaError::Overflow)?;
            den = den.checked_neg().ok_or(FormulaError::Overflow)?;
        }
        Ok(Number::Rational { num, den })
    }

    pub fn float(f: f64) -> Result<Number, FormulaError> {
        if f.is_finite() {
            Ok(Number::Float(f))
        } else {
            Err(FormulaError::Overflow)
        }
    }

    /// Parse a numeric literal as written in a formula.
    pub fn parse_literal(text: &str) -> Result<Number, FormulaError> {
        if text.contains(['.', 'e', 'E']) {
            let f: f64 = text.parse().map_err(|_| FormulaError::Syntax {
                offset: 0,
                detail: format!("bad number '{text}'"),
            })?;
            Number::float(f)
        } else {
            let n: i128 = text.parse().map_err(|_| FormulaError::Overflow)?;
            Ok(Number::int(n))
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Rational { num, den } => num as f64 / den as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Rational { num, .. } => num == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        matches!(self, Number::Rational { num: 1, den: 1 })
    }

    pub fn is_negative(self) -> bool {
        match self {
            Number::Rational { num, .. } => num < 0,
            Number::Float(f) => f < 0.0,
        }
    }

    /// The integer value, if this is an exact integer.
    pub fn as_integer(self) -> Option<i128> {
        match self {
            Number::Rational { num, den: 1 } => Some(num),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn neg(self) -> Result<Number, FormulaError> {
        match self {
            Number::Rational { num, den } => Ok(Number::Rational {
                num: num.checked_neg().ok_or(FormulaError::Overflow)?,
                den,
            }),
            Number::Float(f) => Ok(Number::Float(-f)),
        }
    }

    pub fn abs(self) -> Result<Number, FormulaError> {
        if self.is_negative() {
            self.neg()
        } else {
            Ok(self)
        }
    }

    pub fn add(self, other: Number) -> Result<Number, FormulaError> {
        match (self, other) {
            (Number::Rational { num: a, den: b }, Number::Rational { num: c, den: d }) => {
                let left = a.checked_mul(d).ok_or(FormulaError::Overflow)?;
                let right = c.checked_mul(b).ok_or(FormulaError::Overflow)?;
                let num = left.checked_add(right).ok_or(FormulaError::Overflow)?;
                let den = b.checked_mul(d).ok_or(FormulaError::Overflow)?;
                Number::ratio(num, den)
            }
            (a, b) => Number::float(a.to_f64() + b.to_f64()),
        }
    }

    pub fn mul(self, other: Number) -> Result<Number, FormulaError> {
        match (self, other) {
            (Number::Rational { num: a, den: b }, Number::Rational { num: c, den: d }) => {
                let num = a.checked_mul(c).ok_or(FormulaError::Overflow)?;
                let den = b.checked_mul(d).ok_or(FormulaError::Overflow)?;
                Number::ratio(num, den)
            }
            (a, b) => Number::float(a.to_f64() * b.to_f64()),
        }
    }

    pub fn recip(self) -> Result<Number, FormulaError> {
        if self.is_zero() {
            return Err(FormulaError::DivisionByZero);
        }
        match self {
            Number::Rational { num, den } => Number::ratio(den, num),
            Number::Float(f) => Number::float(1.0 / f),
        }
    }

    /// Raise to an integer power.
    pub fn powi(self, exp: i128) -> Result<Number, FormulaError> {
        let base = if exp < 0 { self.recip()? } else { self };
        let mut acc = Number::ONE;
        for _ in 0..exp.unsigned_abs() {
            acc = acc.mul(base)?;
        }
        Ok(acc)
    }

    /// Total order: exact comparison for rationals, `f64::total_cmp` otherwise.
    pub fn total_cmp(&self, other: &Number) -> Ordering {
        match (*self, *other) {
            (Number::Rational { num: a, den: b }, Number::Rational { num: c, den: d }) => {
                match (a.checked_mul(d), c.checked_mul(b)) {
                    (Some(l), Some(r)) => l.cmp(&r),
                    _ => self.to_f64().total_cmp(&other.to_f64()),
                }
            }
            (a, b) => a.to_f64().total_cmp(&b.to_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// Float rendering that keeps a visible decimal point on whole values.
pub fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}
