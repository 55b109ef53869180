//! Sorted sets: a member→score map plus an index ordered by
//! `(score, member)`, members compared bytewise on ties.

use std::collections::{BTreeSet, HashMap};

use ordered_float::OrderedFloat;

use crate::{
    LexRange, RangeLimit, ScoreRange, Store, StoreError, Value, ValueType, clamp_rank_window,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    order: BTreeSet<(OrderedFloat<f64>, Vec<u8>)>,
}

impl SortedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[must_use]
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Adds or rescores `member`. Returns true when it was new.
    pub fn insert(&mut self, member: Vec<u8>, score: f64) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                self.order.remove(&(OrderedFloat(previous), member.clone()));
                self.order.insert((OrderedFloat(score), member));
                false
            }
            None => {
                self.order.insert((OrderedFloat(score), member));
                true
            }
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&(OrderedFloat(score), member.to_vec()));
                true
            }
            None => false,
        }
    }

    /// Zero-based ascending rank.
    #[must_use]
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        Some(self.order.range(..(OrderedFloat(score), member.to_vec())).count())
    }

    /// Members in ascending `(score, member)` order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&[u8], f64)> + '_ {
        self.order
            .iter()
            .map(|(score, member)| (member.as_slice(), score.into_inner()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZaddCondition {
    #[default]
    Always,
    /// `NX`: only add new members.
    IfAbsent,
    /// `XX`: only update existing members.
    IfPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZaddUpdate {
    #[default]
    Any,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZaddOptions {
    pub condition: ZaddCondition,
    pub update: ZaddUpdate,
    pub increment: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZaddOutcome {
    pub added: u64,
    /// Existing members whose score changed.
    pub updated: u64,
    /// Score of the last member written; `None` when every pair was skipped.
    pub score: Option<f64>,
}

fn apply_zadd(
    zset: &mut SortedSet,
    pairs: &[(f64, Vec<u8>)],
    options: ZaddOptions,
) -> Result<ZaddOutcome, StoreError> {
    let mut outcome = ZaddOutcome::default();
    for (score, member) in pairs {
        let current = zset.score(member);
        match (options.condition, current) {
            (ZaddCondition::IfAbsent, Some(_)) | (ZaddCondition::IfPresent, None) => continue,
            _ => {}
        }
        let next = if options.increment {
            current.unwrap_or(0.0) + score
        } else {
            *score
        };
        if next.is_nan() {
            return Err(StoreError::ScoreIsNan);
        }
        match current {
            None => {
                zset.insert(member.clone(), next);
                outcome.added += 1;
            }
            Some(previous) => {
                let allowed = match options.update {
                    ZaddUpdate::Any => true,
                    ZaddUpdate::GreaterThan => next > previous,
                    ZaddUpdate::LessThan => next < previous,
                };
                if !allowed {
                    continue;
                }
                if next != previous {
                    zset.insert(member.clone(), next);
                    outcome.updated += 1;
                }
            }
        }
        outcome.score = Some(next);
    }
    Ok(outcome)
}

/// Walks `zset` in the requested direction, skipping members until
/// `entered` holds, then yielding while `inside` holds.
fn window<E, S>(
    zset: &SortedSet,
    reverse: bool,
    entered: E,
    inside: S,
    limit: Option<RangeLimit>,
) -> Vec<(Vec<u8>, f64)>
where
    E: Fn(&[u8], f64) -> bool,
    S: Fn(&[u8], f64) -> bool,
{
    let ordered: Box<dyn Iterator<Item = (&[u8], f64)> + '_> = if reverse {
        Box::new(zset.iter().rev())
    } else {
        Box::new(zset.iter())
    };
    let matching = ordered
        .skip_while(|(member, score)| !entered(*member, *score))
        .take_while(|(member, score)| inside(*member, *score))
        .map(|(member, score)| (member.to_vec(), score));
    RangeLimit::apply(limit, matching)
}

impl Store {
    pub fn zadd(
        &mut self,
        key: &[u8],
        pairs: &[(f64, Vec<u8>)],
        options: ZaddOptions,
        now_ms: u64,
    ) -> Result<ZaddOutcome, StoreError> {
        let zset = self.typed_or_insert(key, ValueType::ZSet, now_ms, Value::as_zset_mut)?;
        let outcome = apply_zadd(zset, pairs, options);
        self.reap_if_empty(key);
        outcome
    }

    pub fn zincrby(
        &mut self,
        key: &[u8],
        delta: f64,
        member: &[u8],
        now_ms: u64,
    ) -> Result<f64, StoreError> {
        let options = ZaddOptions {
            increment: true,
            ..ZaddOptions::default()
        };
        let outcome = self.zadd(key, &[(delta, member.to_vec())], options, now_ms)?;
        outcome.score.ok_or(StoreError::ScoreIsNan)
    }

    pub fn zrem(&mut self, key: &[u8], members: &[Vec<u8>], now_ms: u64) -> Result<u64, StoreError> {
        let Some(zset) = self.typed_mut(key, now_ms, Value::as_zset_mut)? else {
            return Ok(0);
        };
        let removed = members.iter().filter(|member| zset.remove(member)).count() as u64;
        self.reap_if_empty(key);
        Ok(removed)
    }

    pub fn zscore(
        &mut self,
        key: &[u8],
        member: &[u8],
        now_ms: u64,
    ) -> Result<Option<f64>, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_zset_mut)?
            .and_then(|zset| zset.score(member)))
    }

    pub fn zcard(&mut self, key: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_zset_mut)?
            .map_or(0, |zset| zset.len()))
    }

    pub fn zrank(
        &mut self,
        key: &[u8],
        member: &[u8],
        reverse: bool,
        now_ms: u64,
    ) -> Result<Option<usize>, StoreError> {
        let Some(zset) = self.typed_mut(key, now_ms, Value::as_zset_mut)? else {
            return Ok(None);
        };
        let len = zset.len();
        Ok(zset
            .rank(member)
            .map(|rank| if reverse { len - 1 - rank } else { rank }))
    }

    pub fn zrange_by_rank(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
        reverse: bool,
        now_ms: u64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        let Some(zset) = self.typed_mut(key, now_ms, Value::as_zset_mut)? else {
            return Ok(Vec::new());
        };
        let Some((from, to)) = clamp_rank_window(start, stop, zset.len()) else {
            return Ok(Vec::new());
        };
        let limit = Some(RangeLimit {
            offset: from as i64,
            count: (to - from + 1) as i64,
        });
        Ok(window(zset, reverse, |_, _| true, |_, _| true, limit))
    }

    /// Members whose score lies in `range`. Descending scans start from
    /// the `max` end.
    pub fn zrange_by_score(
        &mut self,
        key: &[u8],
        range: &ScoreRange,
        reverse: bool,
        limit: Option<RangeLimit>,
        now_ms: u64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        let Some(zset) = self.typed_mut(key, now_ms, Value::as_zset_mut)? else {
            return Ok(Vec::new());
        };
        Ok(if reverse {
            window(
                zset,
                true,
                |_, score| range.below_max(score),
                |_, score| range.above_min(score),
                limit,
            )
        } else {
            window(
                zset,
                false,
                |_, score| range.above_min(score),
                |_, score| range.below_max(score),
                limit,
            )
        })
    }

    /// Lexicographic window. Assumes every member shares one score.
    pub fn zrange_by_lex(
        &mut self,
        key: &[u8],
        range: &LexRange,
        reverse: bool,
        limit: Option<RangeLimit>,
        now_ms: u64,
    ) -> Result<Vec<(Vec<u8>, f64)>, StoreError> {
        let Some(zset) = self.typed_mut(key, now_ms, Value::as_zset_mut)? else {
            return Ok(Vec::new());
        };
        Ok(if reverse {
            window(
                zset,
                true,
                |member, _| range.below_max(member),
                |member, _| range.above_min(member),
                limit,
            )
        } else {
            window(
                zset,
                false,
                |member, _| range.above_min(member),
                |member, _| range.below_max(member),
                limit,
            )
        })
    }

    pub fn zcount(&mut self, key: &[u8], range: &ScoreRange, now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_zset_mut)?
            .map_or(0, |zset| {
                zset.iter()
                    .skip_while(|(_, score)| !range.above_min(*score))
                    .take_while(|(_, score)| range.below_max(*score))
                    .count()
            }))
    }

    pub fn zlexcount(&mut self, key: &[u8], range: &LexRange, now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_zset_mut)?
            .map_or(0, |zset| {
                zset.iter()
                    .skip_while(|(member, _)| !range.above_min(member))
                    .take_while(|(member, _)| range.below_max(member))
                    .count()
            }))
    }

    pub fn zremrangebyscore(
        &mut self,
        key: &[u8],
        range: &ScoreRange,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let doomed = self.zrange_by_score(key, range, false, None, now_ms)?;
        self.remove_members(key, doomed, now_ms)
    }

    pub fn zremrangebylex(
        &mut self,
        key: &[u8],
        range: &LexRange,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let doomed = self.zrange_by_lex(key, range, false, None, now_ms)?;
        self.remove_members(key, doomed, now_ms)
    }

    pub fn zremrangebyrank(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let doomed = self.zrange_by_rank(key, start, stop, false, now_ms)?;
        self.remove_members(key, doomed, now_ms)
    }

    fn remove_members(
        &mut self,
        key: &[u8],
        doomed: Vec<(Vec<u8>, f64)>,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let members: Vec<Vec<u8>> = doomed.into_iter().map(|(member, _)| member).collect();
        self.zrem(key, &members, now_ms)
    }
}
