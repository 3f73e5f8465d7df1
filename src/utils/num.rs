//! Numeric utilities: centralized integer conversions.
//!
//! - Fallible conversions (`Option<T>`) where an out-of-range value must stop the operation,
//!   e.g. an array index taken from a field path or an operator argument.
//! - Saturating conversions where clamping is acceptable, e.g. durations for metrics.

#[inline]
#[must_use]
pub fn u64_to_usize(v: u64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn i64_to_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// Integral value of a double, if it has no fractional part and fits an `i64`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn f64_to_i64_exact(v: f64) -> Option<i64> {
    if !v.is_finite() || v.fract() != 0.0 {
        return None;
    }
    if v < -9_223_372_036_854_775_808.0 || v >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    Some(v as i64)
}

/// Truncate toward zero, saturating at the `i64` bounds. NaN maps to 0.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_i64_truncating(v: f64) -> i64 {
    // `as` saturates and maps NaN to 0.
    v.trunc() as i64
}
