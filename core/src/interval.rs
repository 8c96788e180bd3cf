//! Interval expressions — the range grammar and its evaluator
//!
//! ```text
//! interval := "past" | "future"
//!           | lower-delim bound "," bound upper-delim
//! lower-delim := "(" | "["          ( exclusive | inclusive )
//! upper-delim := ")" | "]"
//! bound := "null" | "now" | number | "'" timestamp "'"
//! ```
//!
//! `'null'` and `'now'` are accepted as quoted synonyms. Timestamps are
//! `YYYY-MM-DD HH:MM:SS.mmm` (seconds, milliseconds and the whole time part are
//! optional) and are read as UTC.
//!
//! Every syntactic problem is reported by [`parse`] as a [`SyntaxError`];
//! [`Interval::matches`] never fails, it only answers `true` or `false`.
//!
//! # Time dependence
//!
//! `now`, `past` and `future` read the wall clock on *every* call to
//! [`Interval::matches`]. Use [`Interval::matches_at`] to evaluate against a
//! fixed instant.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::value::{Value, TIMESTAMP_FORMAT};

/// A malformed interval expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid range expression \"{expr}\": {reason}")]
pub struct SyntaxError {
    /// The expression as written.
    pub expr: String,
    /// What is wrong with it.
    pub reason: String,
}

impl SyntaxError {
    fn new(expr: &str, reason: impl Into<String>) -> Self {
        Self {
            expr: expr.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A literal bound value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Integer literal. Stored widened so `u64` field values compare exactly.
    Int(i128),
    /// Floating-point literal (always finite).
    Float(f64),
    /// Timestamp literal, truncated to milliseconds.
    Time(DateTime<Utc>),
}

impl Scalar {
    fn domain(self) -> Domain {
        match self {
            Self::Int(_) | Self::Float(_) => Domain::Numeric,
            Self::Time(_) => Domain::Temporal,
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Int(a), Self::Float(b)) => compare_int_float(a, b),
            (Self::Float(a), Self::Int(b)) => compare_int_float(b, a).map(Ordering::reverse),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Time(a), Self::Time(b)) => Some(a.timestamp_millis().cmp(&b.timestamp_millis())),
            _ => None,
        }
    }
}

/// Exact `a <=> b` without rounding `a` through `f64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn compare_int_float(a: i128, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b.is_infinite() {
        return Some(if b > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let floor = b.floor();
    // i128::MAX as f64 rounds up to 2^127, the first value outside the range.
    if floor >= i128::MAX as f64 {
        return Some(Ordering::Less);
    }
    if floor < i128::MIN as f64 {
        return Some(Ordering::Greater);
    }
    // Integer-valued and in range, so the cast is exact.
    match a.cmp(&(floor as i128)) {
        Ordering::Equal if b > floor => Some(Ordering::Less),
        ordering => Some(ordering),
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Time(t) => write!(f, "'{}'", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// What kind of values an interval ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Integers and floats.
    Numeric,
    /// Timestamps, or integers read as epoch milliseconds.
    Temporal,
}

/// One side of an interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `null` — no limit on this side.
    Unbounded,
    /// `now` — the evaluation instant.
    Now {
        /// Whether the evaluation instant itself is inside.
        inclusive: bool,
    },
    /// A number or timestamp.
    Literal {
        /// The bound value.
        value: Scalar,
        /// Whether `value` itself is inside.
        inclusive: bool,
    },
}

impl Bound {
    fn domain(self) -> Option<Domain> {
        match self {
            Self::Unbounded => None,
            Self::Now { .. } => Some(Domain::Temporal),
            Self::Literal { value, .. } => Some(value.domain()),
        }
    }

    /// Check `value` against this bound. `lower` selects which side it is.
    fn admits(self, value: Scalar, now: DateTime<Utc>, lower: bool) -> bool {
        let (limit, inclusive) = match self {
            Self::Unbounded => return true,
            Self::Now { inclusive } => (Scalar::Time(now), inclusive),
            Self::Literal { value, inclusive } => (value, inclusive),
        };
        match value.compare(limit) {
            Some(Ordering::Equal) => inclusive,
            Some(Ordering::Greater) => lower,
            Some(Ordering::Less) => !lower,
            None => false,
        }
    }

    fn fmt_side(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("null"),
            Self::Now { .. } => f.write_str("now"),
            Self::Literal { value, .. } => write!(f, "{value}"),
        }
    }

    fn inclusive(self) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Now { inclusive } | Self::Literal { inclusive, .. } => inclusive,
        }
    }
}

/// A parsed interval expression.
///
/// # Example
///
/// ```
/// use sieve::{Interval, Value};
///
/// let interval: Interval = "[100, 200)".parse().unwrap();
/// assert!(interval.matches(&Value::from(100i64)));
/// assert!(interval.matches(&Value::from(199.5f64)));
/// assert!(!interval.matches(&Value::from(200i64)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Interval {
    /// Two bounds over one domain.
    Range {
        /// Lower side.
        lower: Bound,
        /// Upper side.
        upper: Bound,
        /// `None` only when both sides are `null`; such an interval admits
        /// every numeric and temporal value.
        domain: Option<Domain>,
    },
    /// Strictly before the evaluation instant.
    Past,
    /// Strictly after the evaluation instant.
    Future,
}

impl Interval {
    /// Does `value` fall inside this interval, evaluated against the current time?
    ///
    /// Non-comparable values (strings, booleans, null, objects, NaN) never match.
    #[must_use]
    pub fn matches(&self, value: &Value<'_>) -> bool {
        self.matches_at(value, Utc::now())
    }

    /// Like [`matches`](Self::matches), with `now` fixed by the caller.
    #[must_use]
    pub fn matches_at(&self, value: &Value<'_>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Past => temporal(value).is_some_and(|t| t.compare(Scalar::Time(now)) == Some(Ordering::Less)),
            Self::Future => {
                temporal(value).is_some_and(|t| t.compare(Scalar::Time(now)) == Some(Ordering::Greater))
            }
            Self::Range {
                lower,
                upper,
                domain,
            } => {
                let scalar = match domain {
                    Some(Domain::Numeric) => numeric(value),
                    Some(Domain::Temporal) => temporal(value),
                    None => numeric(value).or_else(|| temporal(value)),
                };
                scalar.is_some_and(|s| lower.admits(s, now, true) && upper.admits(s, now, false))
            }
        }
    }

    /// Returns `true` if evaluation reads the wall clock.
    #[must_use]
    pub fn is_time_dependent(&self) -> bool {
        match self {
            Self::Past | Self::Future => true,
            Self::Range { lower, upper, .. } => {
                matches!(lower, Bound::Now { .. }) || matches!(upper, Bound::Now { .. })
            }
        }
    }
}

impl FromStr for Interval {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Past => f.write_str("past"),
            Self::Future => f.write_str("future"),
            Self::Range { lower, upper, .. } => {
                f.write_str(if lower.inclusive() { "[" } else { "(" })?;
                lower.fmt_side(f)?;
                f.write_str(", ")?;
                upper.fmt_side(f)?;
                f.write_str(if upper.inclusive() { "]" } else { ")" })
            }
        }
    }
}

fn numeric(value: &Value<'_>) -> Option<Scalar> {
    match value {
        Value::Int(i) => Some(Scalar::Int(i128::from(*i))),
        Value::UInt(u) => Some(Scalar::Int(i128::from(*u))),
        Value::Float(x) if !x.is_nan() => Some(Scalar::Float(*x)),
        _ => None,
    }
}

fn temporal(value: &Value<'_>) -> Option<Scalar> {
    match value {
        Value::Timestamp(t) => Some(Scalar::Time(*t)),
        Value::Int(ms) => DateTime::from_timestamp_millis(*ms).map(Scalar::Time),
        Value::UInt(ms) => i64::try_from(*ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(Scalar::Time),
        _ => None,
    }
}

/// Parse an interval expression.
///
/// # Errors
///
/// Returns [`SyntaxError`] for a missing or unknown delimiter, a bound count
/// other than two, an unparsable number or timestamp, a numeric bound mixed
/// with a temporal one, or a lower literal greater than the upper literal.
///
/// # Example
///
/// ```
/// use sieve::interval::parse;
///
/// assert!(parse("(100, null)").is_ok());
/// assert!(parse("['2019-07-13 12:00:23.321', now)").is_ok());
/// assert!(parse("[10, 1]").is_err());
/// assert!(parse("[1, '2019-07-13']").is_err());
/// ```
pub fn parse(expr: &str) -> Result<Interval, SyntaxError> {
    let text = expr.trim();
    match text {
        "past" => return Ok(Interval::Past),
        "future" => return Ok(Interval::Future),
        "" => return Err(SyntaxError::new(expr, "expression is empty")),
        _ => {}
    }

    let lower_inclusive = match text.as_bytes()[0] {
        b'[' => true,
        b'(' => false,
        _ => {
            return Err(SyntaxError::new(
                expr,
                "must start with '(' or '[', or be one of \"past\", \"future\"",
            ))
        }
    };
    let upper_inclusive = match text.as_bytes()[text.len() - 1] {
        b']' => true,
        b')' => false,
        _ => return Err(SyntaxError::new(expr, "must end with ')' or ']'")),
    };
    if text.len() < 2 {
        return Err(SyntaxError::new(expr, "missing closing delimiter"));
    }

    // Both delimiters are single ASCII bytes, so this slice is on char boundaries.
    let body = &text[1..text.len() - 1];
    let (lo, hi) = body
        .split_once(',')
        .ok_or_else(|| SyntaxError::new(expr, "expected two bounds separated by ','"))?;
    if hi.contains(',') {
        return Err(SyntaxError::new(expr, "expected exactly two bounds, found more"));
    }

    let lower = parse_bound(expr, lo, lower_inclusive)?;
    let upper = parse_bound(expr, hi, upper_inclusive)?;

    let domain = match (lower.domain(), upper.domain()) {
        (Some(a), Some(b)) if a != b => {
            return Err(SyntaxError::new(
                expr,
                "cannot mix a numeric bound with a timestamp bound",
            ))
        }
        (a, b) => a.or(b),
    };

    if let (Bound::Literal { value: lo, .. }, Bound::Literal { value: hi, .. }) = (lower, upper) {
        if lo.compare(hi) == Some(Ordering::Greater) {
            return Err(SyntaxError::new(
                expr,
                format!("lower bound {lo} is greater than upper bound {hi}"),
            ));
        }
    }

    Ok(Interval::Range {
        lower,
        upper,
        domain,
    })
}

fn parse_bound(expr: &str, token: &str, inclusive: bool) -> Result<Bound, SyntaxError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SyntaxError::new(
            expr,
            "empty bound, use null for an open side",
        ));
    }

    let quoted = token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'');
    let inner = if quoted {
        token[1..token.len() - 1].trim()
    } else {
        token
    };

    match inner {
        "null" => Ok(Bound::Unbounded),
        "now" => Ok(Bound::Now { inclusive }),
        _ if quoted => parse_timestamp(inner)
            .map(|t| Bound::Literal {
                value: Scalar::Time(t),
                inclusive,
            })
            .ok_or_else(|| {
                SyntaxError::new(
                    expr,
                    format!("'{inner}' is not a timestamp (expected 'YYYY-MM-DD HH:MM:SS.mmm')"),
                )
            }),
        _ => parse_number(inner)
            .map(|value| Bound::Literal { value, inclusive })
            .ok_or_else(|| {
                SyntaxError::new(
                    expr,
                    format!("{inner} is not a number; quote timestamps with '...'"),
                )
            }),
    }
}

fn parse_number(token: &str) -> Option<Scalar> {
    if let Ok(i) = token.parse::<i128>() {
        return Some(Scalar::Int(i));
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .map(Scalar::Float)
}

/// Parse a timestamp literal as UTC, truncated to milliseconds.
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    DateTime::from_timestamp_millis(naive.and_utc().timestamp_millis())
}
