//! Score, lexicographic, and rank windows over ordered sorted-set members.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("min or max is not a float")]
    NotAFloat,
    #[error("min or max not valid string range item")]
    InvalidLexItem,
}

/// One end of a score interval. `(` makes it exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    #[must_use]
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            exclusive: false,
        }
    }

    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreRange {
    #[must_use]
    pub fn new(min: ScoreBound, max: ScoreBound) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn above_min(&self, score: f64) -> bool {
        self.min.admits_from_below(score)
    }

    #[must_use]
    pub fn below_max(&self, score: f64) -> bool {
        self.max.admits_from_above(score)
    }

    #[must_use]
    pub fn contains(&self, score: f64) -> bool {
        self.above_min(score) && self.below_max(score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    NegInfinity,
    PosInfinity,
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexRange {
    pub min: LexBound,
    pub max: LexBound,
}

impl LexRange {
    #[must_use]
    pub fn new(min: LexBound, max: LexBound) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn above_min(&self, member: &[u8]) -> bool {
        match &self.min {
            LexBound::NegInfinity => true,
            LexBound::PosInfinity => false,
            LexBound::Inclusive(bound) => member >= bound.as_slice(),
            LexBound::Exclusive(bound) => member > bound.as_slice(),
        }
    }

    #[must_use]
    pub fn below_max(&self, member: &[u8]) -> bool {
        match &self.max {
            LexBound::NegInfinity => false,
            LexBound::PosInfinity => true,
            LexBound::Inclusive(bound) => member <= bound.as_slice(),
            LexBound::Exclusive(bound) => member < bound.as_slice(),
        }
    }

    #[must_use]
    pub fn contains(&self, member: &[u8]) -> bool {
        self.above_min(member) && self.below_max(member)
    }
}

/// `LIMIT offset count` window. A negative offset selects nothing and a
/// negative count means no upper limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimit {
    pub offset: i64,
    pub count: i64,
}

impl RangeLimit {
    pub(crate) fn apply<I: Iterator>(limit: Option<Self>, iter: I) -> Vec<I::Item> {
        let Some(limit) = limit else {
            return iter.collect();
        };
        if limit.offset < 0 {
            return Vec::new();
        }
        let skipped = iter.skip(usize::try_from(limit.offset).unwrap_or(usize::MAX));
        match usize::try_from(limit.count) {
            Ok(count) => skipped.take(count).collect(),
            Err(_) => skipped.collect(),
        }
    }
}

/// Parses `1.5`, `(1.5`, `-inf`, `+inf` style score bounds.
pub fn parse_score_bound(raw: &[u8]) -> Result<ScoreBound, RangeParseError> {
    let (exclusive, digits) = match raw.split_first() {
        Some((b'(', rest)) => (true, rest),
        _ => (false, raw),
    };
    let value = parse_float(digits).ok_or(RangeParseError::NotAFloat)?;
    Ok(ScoreBound { value, exclusive })
}

/// Parses `-`, `+`, `[member`, `(member` lexicographic bounds.
pub fn parse_lex_bound(raw: &[u8]) -> Result<LexBound, RangeParseError> {
    match raw.split_first() {
        Some((b'-', [])) => Ok(LexBound::NegInfinity),
        Some((b'+', [])) => Ok(LexBound::PosInfinity),
        Some((b'[', rest)) => Ok(LexBound::Inclusive(rest.to_vec())),
        Some((b'(', rest)) => Ok(LexBound::Exclusive(rest.to_vec())),
        _ => Err(RangeParseError::InvalidLexItem),
    }
}

/// Float parsing shared by scores and increments. Accepts `inf` spellings,
/// rejects NaN.
#[must_use]
pub fn parse_float(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?;
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => f64::INFINITY,
        "-inf" | "-infinity" => f64::NEG_INFINITY,
        _ => text.parse::<f64>().ok()?,
    };
    if value.is_nan() { None } else { Some(value) }
}

/// Resolves `start..=stop` with negative indexes counted from the end.
/// `None` when the window is empty.
#[must_use]
pub fn clamp_rank_window(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if start < 0 { start.saturating_add(len).max(0) } else { start };
    let stop = if stop < 0 { stop.saturating_add(len) } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::{
        LexBound, LexRange, RangeLimit, RangeParseError, ScoreBound, ScoreRange,
        clamp_rank_window, parse_lex_bound, parse_score_bound,
    };

    #[test]
    fn score_bounds_parse_exclusive_and_infinite_forms() {
        assert_eq!(parse_score_bound(b"1.5"), Ok(ScoreBound::inclusive(1.5)));
        assert_eq!(
            parse_score_bound(b"(2"),
            Ok(ScoreBound {
                value: 2.0,
                exclusive: true
            })
        );
        assert_eq!(parse_score_bound(b"-inf").map(|b| b.value), Ok(f64::NEG_INFINITY));
        assert_eq!(parse_score_bound(b"+inf").map(|b| b.value), Ok(f64::INFINITY));
        assert_eq!(parse_score_bound(b"(abc"), Err(RangeParseError::NotAFloat));
        assert_eq!(parse_score_bound(b"nan"), Err(RangeParseError::NotAFloat));
        assert_eq!(parse_score_bound(b""), Err(RangeParseError::NotAFloat));
    }

    #[test]
    fn exclusive_bounds_exclude_edges() {
        let range = ScoreRange::new(
            ScoreBound {
                value: 1.0,
                exclusive: true,
            },
            ScoreBound::inclusive(3.0),
        );
        assert!(!range.contains(1.0));
        assert!(range.contains(2.0));
        assert!(range.contains(3.0));
        assert!(!range.contains(3.5));
    }

    #[test]
    fn lex_bounds_require_prefix() {
        assert_eq!(parse_lex_bound(b"-"), Ok(LexBound::NegInfinity));
        assert_eq!(parse_lex_bound(b"+"), Ok(LexBound::PosInfinity));
        assert_eq!(parse_lex_bound(b"[a"), Ok(LexBound::Inclusive(b"a".to_vec())));
        assert_eq!(parse_lex_bound(b"(a"), Ok(LexBound::Exclusive(b"a".to_vec())));
        assert_eq!(parse_lex_bound(b"a"), Err(RangeParseError::InvalidLexItem));
        assert_eq!(parse_lex_bound(b"-a"), Err(RangeParseError::InvalidLexItem));
    }

    #[test]
    fn lex_range_with_inverted_infinities_is_empty() {
        let range = LexRange::new(LexBound::PosInfinity, LexBound::NegInfinity);
        assert!(!range.contains(b"a"));
        let range = LexRange::new(LexBound::Exclusive(b"a".to_vec()), LexBound::Inclusive(b"c".to_vec()));
        assert!(!range.contains(b"a"));
        assert!(range.contains(b"b"));
        assert!(range.contains(b"c"));
    }

    #[test]
    fn limit_window() {
        let items = || 0..10;
        assert_eq!(RangeLimit::apply(None, items()).len(), 10);
        let limit = |offset, count| Some(RangeLimit { offset, count });
        assert_eq!(RangeLimit::apply(limit(2, 3), items()), vec![2, 3, 4]);
        assert_eq!(RangeLimit::apply(limit(8, -1), items()), vec![8, 9]);
        assert!(RangeLimit::apply(limit(-1, 5), items()).is_empty());
        assert!(RangeLimit::apply(limit(20, 5), items()).is_empty());
    }

    #[test]
    fn rank_window_handles_negative_and_overflowing_indexes() {
        assert_eq!(clamp_rank_window(0, -1, 5), Some((0, 4)));
        assert_eq!(clamp_rank_window(-2, -1, 5), Some((3, 4)));
        assert_eq!(clamp_rank_window(-100, 100, 5), Some((0, 4)));
        assert_eq!(clamp_rank_window(3, 1, 5), None);
        assert_eq!(clamp_rank_window(5, 10, 5), None);
        assert_eq!(clamp_rank_window(0, -10, 5), None);
        assert_eq!(clamp_rank_window(0, 0, 0), None);
    }
}
