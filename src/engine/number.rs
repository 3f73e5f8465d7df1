//! Numeric model shared by comparison, `$mod` and the arithmetic update operators.
//!
//! Int32/Int64/Double compare exactly against each other (no lossy casts through `f64`).
//! As soon as a Decimal128 is involved both sides go through [`Dec`], which carries a
//! [`BigDecimal`] rounded half-even to 34 significant digits like IEEE decimal128.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use bson::{Bson, Decimal128};

use crate::errors::DbError;
use crate::utils::num::f64_to_i64_truncating;

const MAX_DIGITS: u64 = 34;

/// Decimal value. All NaN payloads and signs collapse to [`Dec::NaN`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dec {
    NaN,
    Inf { neg: bool },
    Finite(BigDecimal),
}

/// Round to decimal128 precision, half-even.
fn round_to_precision(v: BigDecimal) -> BigDecimal {
    let digits = v.digits();
    if digits <= MAX_DIGITS {
        return v;
    }
    let (_, scale) = v.as_bigint_and_exponent();
    let excess = i64::try_from(digits - MAX_DIGITS).unwrap_or(i64::MAX);
    let rounded = v.with_scale_round(scale.saturating_sub(excess), RoundingMode::HalfEven);
    if rounded.digits() > MAX_DIGITS {
        // 99..9 carried into a new digit; the dropped digit is a zero.
        let (_, scale) = rounded.as_bigint_and_exponent();
        return rounded.with_scale_round(scale.saturating_sub(1), RoundingMode::HalfEven);
    }
    rounded
}

impl Dec {
    #[must_use]
    pub fn zero() -> Self {
        Dec::Finite(BigDecimal::zero())
    }

    fn finite(v: BigDecimal) -> Self {
        Dec::Finite(round_to_precision(v))
    }

    #[must_use]
    pub fn from_i64(v: i64) -> Self {
        Dec::Finite(BigDecimal::from(v))
    }

    /// Converts through the shortest decimal text that round-trips the double.
    #[must_use]
    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            Dec::NaN
        } else if v.is_infinite() {
            Dec::Inf { neg: v < 0.0 }
        } else {
            format!("{v:e}").parse().unwrap_or(Dec::NaN)
        }
    }

    #[must_use]
    pub fn from_decimal128(d: &Decimal128) -> Self {
        d.to_string().parse().unwrap_or(Dec::NaN)
    }

    /// # Errors
    /// Fails only if the value cannot be represented (exponent out of decimal128 range).
    pub fn to_decimal128(&self) -> Result<Decimal128, DbError> {
        let text = self.to_string();
        Decimal128::from_str(&text)
            .map_err(|e| DbError::bad_value(format!("cannot represent {text} as Decimal128: {e}")))
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Dec::NaN)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Dec::Finite(v) if v.is_zero())
    }

    fn is_negative(&self) -> bool {
        match self {
            Dec::Finite(v) => *v < BigDecimal::zero(),
            Dec::Inf { neg } => *neg,
            Dec::NaN => false,
        }
    }

    /// Total order with NaN as the minimum and equal to itself.
    #[must_use]
    pub fn total_cmp(&self, other: &Dec) -> Ordering {
        match (self, other) {
            (Dec::NaN, Dec::NaN) => Ordering::Equal,
            (Dec::NaN, _) => Ordering::Less,
            (_, Dec::NaN) => Ordering::Greater,
            (Dec::Inf { neg: a }, Dec::Inf { neg: b }) => b.cmp(a),
            (Dec::Inf { neg }, _) => if *neg { Ordering::Less } else { Ordering::Greater },
            (_, Dec::Inf { neg }) => if *neg { Ordering::Greater } else { Ordering::Less },
            (Dec::Finite(a), Dec::Finite(b)) => a.cmp(b),
        }
    }

    #[must_use]
    pub fn add(&self, other: &Dec) -> Dec {
        match (self, other) {
            (Dec::NaN, _) | (_, Dec::NaN) => Dec::NaN,
            (Dec::Inf { neg: a }, Dec::Inf { neg: b }) if a != b => Dec::NaN,
            (Dec::Inf { neg }, _) | (_, Dec::Inf { neg }) => Dec::Inf { neg: *neg },
            (Dec::Finite(a), Dec::Finite(b)) => Dec::finite(a + b),
        }
    }

    #[must_use]
    pub fn mul(&self, other: &Dec) -> Dec {
        match (self, other) {
            (Dec::NaN, _) | (_, Dec::NaN) => Dec::NaN,
            (Dec::Inf { .. }, x) | (x, Dec::Inf { .. }) if x.is_zero() => Dec::NaN,
            (Dec::Inf { neg }, x) | (x, Dec::Inf { neg }) => Dec::Inf { neg: *neg ^ x.is_negative() },
            (Dec::Finite(a), Dec::Finite(b)) => Dec::finite(a * b),
        }
    }

    /// Truncated remainder (sign follows the dividend). `None` for zero, NaN or infinite operands.
    #[must_use]
    pub fn rem(&self, divisor: &Dec) -> Option<Dec> {
        let (Dec::Finite(a), Dec::Finite(b)) = (self, divisor) else {
            return None;
        };
        if b.is_zero() {
            return None;
        }
        Some(Dec::finite(a % b))
    }

    fn to_f64(&self) -> f64 {
        match self {
            Dec::NaN => f64::NAN,
            Dec::Inf { neg: true } => f64::NEG_INFINITY,
            Dec::Inf { neg: false } => f64::INFINITY,
            Dec::Finite(v) => v.to_f64().unwrap_or(f64::NAN),
        }
    }
}

impl FromStr for Dec {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, DbError> {
        let t = s.trim();
        let (neg, body) = match t.as_bytes().first() {
            Some(b'-') => (true, &t[1..]),
            Some(b'+') => (false, &t[1..]),
            _ => (false, t),
        };
        let lower = body.to_ascii_lowercase();
        if lower.ends_with("nan") {
            return Ok(Dec::NaN);
        }
        if lower == "inf" || lower == "infinity" {
            return Ok(Dec::Inf { neg });
        }
        BigDecimal::from_str(t)
            .map(Dec::finite)
            .map_err(|_| DbError::bad_value(format!("invalid decimal string: {s}")))
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dec::NaN => f.write_str("NaN"),
            Dec::Inf { neg } => f.write_str(if *neg { "-Infinity" } else { "Infinity" }),
            Dec::Finite(v) => {
                // Decimal128 text form: plain digits, or `E` notation for positive exponents.
                let (coef, scale) = v.as_bigint_and_exponent();
                let text = coef.to_string();
                let (sign, digits) = match text.strip_prefix('-') {
                    Some(d) => ("-", d),
                    None => ("", text.as_str()),
                };
                if scale == 0 {
                    write!(f, "{sign}{digits}")
                } else if scale < 0 {
                    write!(f, "{sign}{digits}E+{}", scale.unsigned_abs())
                } else {
                    let frac = usize::try_from(scale).unwrap_or(usize::MAX);
                    if frac > 6176 {
                        return write!(f, "{sign}{digits}E-{scale}");
                    }
                    if digits.len() > frac {
                        let (int, fr) = digits.split_at(digits.len() - frac);
                        write!(f, "{sign}{int}.{fr}")
                    } else {
                        write!(f, "{sign}0.{}{digits}", "0".repeat(frac - digits.len()))
                    }
                }
            }
        }
    }
}

/// A numeric BSON value. Booleans are never numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Num {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Dec),
}

impl Num {
    #[must_use]
    pub fn from_bson(v: &Bson) -> Option<Num> {
        match v {
            Bson::Int32(i) => Some(Num::Int32(*i)),
            Bson::Int64(i) => Some(Num::Int64(*i)),
            Bson::Double(d) => Some(Num::Double(*d)),
            Bson::Decimal128(d) => Some(Num::Decimal(Dec::from_decimal128(d))),
            _ => None,
        }
    }

    /// # Errors
    /// Only decimal results can fail to encode.
    pub fn into_bson(self) -> Result<Bson, DbError> {
        Ok(match self {
            Num::Int32(i) => Bson::Int32(i),
            Num::Int64(i) => Bson::Int64(i),
            Num::Double(d) => Bson::Double(d),
            Num::Decimal(d) => Bson::Decimal128(d.to_decimal128()?),
        })
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        match self {
            Num::Double(d) => d.is_nan(),
            Num::Decimal(d) => d.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn to_dec(&self) -> Dec {
        match self {
            Num::Int32(i) => Dec::from_i64(i64::from(*i)),
            Num::Int64(i) => Dec::from_i64(*i),
            Num::Double(d) => Dec::from_f64(*d),
            Num::Decimal(d) => d.clone(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(&self) -> f64 {
        match self {
            Num::Int32(i) => f64::from(*i),
            Num::Int64(i) => *i as f64,
            Num::Double(d) => *d,
            Num::Decimal(d) => d.to_f64(),
        }
    }

    /// Integer view truncated toward zero; used by `$mod` on non-decimal operands.
    #[must_use]
    pub fn truncated(&self) -> Option<i64> {
        match self {
            Num::Int32(i) => Some(i64::from(*i)),
            Num::Int64(i) => Some(*i),
            Num::Double(d) if d.is_finite() => Some(f64_to_i64_truncating(*d)),
            Num::Double(_) | Num::Decimal(_) => None,
        }
    }

    /// The additive identity in this value's numeric type.
    #[must_use]
    pub fn zero_like(&self) -> Num {
        match self {
            Num::Int32(_) => Num::Int32(0),
            Num::Int64(_) => Num::Int64(0),
            Num::Double(_) => Num::Double(0.0),
            Num::Decimal(_) => Num::Decimal(Dec::zero()),
        }
    }

    /// `$inc` semantics: int32 widens to int64 on overflow, int64 overflow is `None`.
    #[must_use]
    pub fn checked_add(&self, rhs: &Num) -> Option<Num> {
        self.combine(rhs, i64::checked_add, |a, b| a + b, Dec::add)
    }

    /// `$mul` semantics, same promotion rules as [`Num::checked_add`].
    #[must_use]
    pub fn checked_mul(&self, rhs: &Num) -> Option<Num> {
        self.combine(rhs, i64::checked_mul, |a, b| a * b, Dec::mul)
    }

    fn combine(
        &self,
        rhs: &Num,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
        dec_op: fn(&Dec, &Dec) -> Dec,
    ) -> Option<Num> {
        match (self, rhs) {
            (Num::Decimal(_), _) | (_, Num::Decimal(_)) => {
                Some(Num::Decimal(dec_op(&self.to_dec(), &rhs.to_dec())))
            }
            (Num::Double(_), _) | (_, Num::Double(_)) => {
                Some(Num::Double(float_op(self.to_f64(), rhs.to_f64())))
            }
            (Num::Int32(a), Num::Int32(b)) => {
                let wide = int_op(i64::from(*a), i64::from(*b))?;
                Some(i32::try_from(wide).map_or(Num::Int64(wide), Num::Int32))
            }
            (a, b) => {
                let (a, b) = (a.truncated()?, b.truncated()?);
                int_op(a, b).map(Num::Int64)
            }
        }
    }
}

fn cmp_int_double(i: i64, f: f64) -> Ordering {
    if f.is_infinite() {
        return if f > 0.0 { Ordering::Less } else { Ordering::Greater };
    }
    if (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&f) {
        let t = f.trunc();
        let ti = f64_to_i64_truncating(t);
        match i.cmp(&ti) {
            Ordering::Equal if f > t => Ordering::Less,
            Ordering::Equal if f < t => Ordering::Greater,
            other => other,
        }
    } else if f > 0.0 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Exact total order over numbers; NaN sorts below everything and equals NaN.
#[must_use]
pub fn cmp_numbers(a: &Num, b: &Num) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    match (a, b) {
        (Num::Decimal(_), _) | (_, Num::Decimal(_)) => a.to_dec().total_cmp(&b.to_dec()),
        (Num::Double(x), Num::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Num::Double(x), other) => other.truncated().map_or(Ordering::Equal, |i| cmp_int_double(i, *x).reverse()),
        (other, Num::Double(y)) => other.truncated().map_or(Ordering::Equal, |i| cmp_int_double(i, *y)),
        (x, y) => x.truncated().cmp(&y.truncated()),
    }
}

/// `value % divisor == remainder`. Decimal operands use exact decimal arithmetic, everything
/// else truncates to integers first.
#[must_use]
pub fn mod_matches(value: &Num, divisor: &Num, remainder: &Num) -> bool {
    if value.is_nan() {
        return false;
    }
    let any_decimal = [value, divisor, remainder].iter().any(|n| matches!(n, Num::Decimal(_)));
    if any_decimal {
        return value
            .to_dec()
            .rem(&divisor.to_dec())
            .is_some_and(|r| r.total_cmp(&remainder.to_dec()) == Ordering::Equal);
    }
    match (value.truncated(), divisor.truncated(), remainder.truncated()) {
        (Some(v), Some(d), Some(r)) if d != 0 => v.wrapping_rem(d) == r,
        _ => false,
    }
}
