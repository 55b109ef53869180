use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Store, StoreError, Value, ValueType};

/// Upper bound on with-replacement draws for a negative `SRANDMEMBER` count.
pub const MAX_RANDOM_DRAWS: u64 = 1 << 24;

/// The first key's members combined with the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAlgebra {
    Union,
    Intersection,
    Difference,
}

impl Store {
    pub fn sadd(&mut self, key: &[u8], members: &[Vec<u8>], now_ms: u64) -> Result<u64, StoreError> {
        let set = self.typed_or_insert(key, ValueType::Set, now_ms, Value::as_set_mut)?;
        let added = members
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count() as u64;
        self.reap_if_empty(key);
        Ok(added)
    }

    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>], now_ms: u64) -> Result<u64, StoreError> {
        let Some(set) = self.typed_mut(key, now_ms, Value::as_set_mut)? else {
            return Ok(0);
        };
        let removed = members
            .iter()
            .filter(|member| set.remove(member.as_slice()))
            .count() as u64;
        self.reap_if_empty(key);
        Ok(removed)
    }

    /// Members in bytewise order.
    pub fn smembers(&mut self, key: &[u8], now_ms: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_set_mut)?
            .map(|set| sorted_members(set))
            .unwrap_or_default())
    }

    pub fn scard(&mut self, key: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_set_mut)?
            .map_or(0, |set| set.len()))
    }

    pub fn sismember(&mut self, key: &[u8], member: &[u8], now_ms: u64) -> Result<bool, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_set_mut)?
            .is_some_and(|set| set.contains(member)))
    }

    /// Removes and returns up to `count` distinct random members.
    pub fn spop<R: Rng + ?Sized>(
        &mut self,
        key: &[u8],
        count: usize,
        rng: &mut R,
        now_ms: u64,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let Some(set) = self.typed_mut(key, now_ms, Value::as_set_mut)? else {
            return Ok(Vec::new());
        };
        let picked: Vec<Vec<u8>> = sorted_members(set)
            .choose_multiple(rng, count)
            .cloned()
            .collect();
        for member in &picked {
            set.remove(member);
        }
        self.reap_if_empty(key);
        Ok(picked)
    }

    /// Random members without removal. A positive `count` yields distinct
    /// members; a negative one yields `|count|` draws with replacement, at
    /// most [`MAX_RANDOM_DRAWS`] of them.
    pub fn srandmember<R: Rng + ?Sized>(
        &mut self,
        key: &[u8],
        count: i64,
        rng: &mut R,
        now_ms: u64,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        if count < 0 && count.unsigned_abs() > MAX_RANDOM_DRAWS {
            return Err(StoreError::ValueNotInteger);
        }
        let Some(set) = self.typed_mut(key, now_ms, Value::as_set_mut)? else {
            return Ok(Vec::new());
        };
        let members = sorted_members(set);
        let draws = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
        if count >= 0 {
            return Ok(members.choose_multiple(rng, draws).cloned().collect());
        }
        Ok((0..draws)
            .filter_map(|_| members.choose(rng).cloned())
            .collect())
    }

    /// Moves `member` between sets. Both kinds are checked first.
    pub fn smove(
        &mut self,
        source: &[u8],
        destination: &[u8],
        member: &[u8],
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let present = self.sismember(source, member, now_ms)?;
        self.check_kind(destination, ValueType::Set, now_ms)?;
        if !present {
            return Ok(false);
        }
        if source == destination {
            return Ok(true);
        }
        self.srem(source, &[member.to_vec()], now_ms)?;
        self.sadd(destination, &[member.to_vec()], now_ms)?;
        Ok(true)
    }

    /// Members of `SDIFF`/`SINTER`/`SUNION` over `keys`, sorted. Missing keys
    /// count as empty sets.
    pub fn set_algebra(
        &mut self,
        op: SetAlgebra,
        keys: &[Vec<u8>],
        now_ms: u64,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut operands = Vec::with_capacity(keys.len());
        for key in keys {
            let set = self
                .typed_mut(key, now_ms, Value::as_set_mut)?
                .map(|set| set.clone())
                .unwrap_or_default();
            operands.push(set);
        }
        let mut operands = operands.into_iter();
        let mut result: HashSet<Vec<u8>> = operands.next().unwrap_or_default();
        for other in operands {
            match op {
                SetAlgebra::Union => result.extend(other),
                SetAlgebra::Intersection => result.retain(|member| other.contains(member)),
                SetAlgebra::Difference => result.retain(|member| !other.contains(member)),
            }
        }
        Ok(sorted_members(&result))
    }

    /// Writes the algebra result to `destination`, replacing any kind, and
    /// returns its cardinality. An empty result deletes `destination`.
    pub fn set_algebra_store(
        &mut self,
        op: SetAlgebra,
        destination: &[u8],
        keys: &[Vec<u8>],
        now_ms: u64,
    ) -> Result<usize, StoreError> {
        let members = self.set_algebra(op, keys, now_ms)?;
        let len = members.len();
        self.overwrite(destination, Value::Set(members.into_iter().collect()), now_ms);
        Ok(len)
    }
}

fn sorted_members(set: &HashSet<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut members: Vec<Vec<u8>> = set.iter().cloned().collect();
    members.sort();
    members
}
