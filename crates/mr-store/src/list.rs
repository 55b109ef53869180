use std::collections::VecDeque;

use crate::{Store, StoreError, Value, ValueType, clamp_rank_window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Head,
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Resolves a possibly negative list index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

impl Store {
    /// Pushes `values` one at a time onto `end`, so `LPUSH k a b` leaves
    /// `b` at the head. With `only_if_exists` an absent key stays absent
    /// and the reply is 0.
    pub fn push(
        &mut self,
        key: &[u8],
        values: &[Vec<u8>],
        end: ListEnd,
        only_if_exists: bool,
        now_ms: u64,
    ) -> Result<usize, StoreError> {
        let list = if only_if_exists {
            match self.typed_mut(key, now_ms, Value::as_list_mut)? {
                Some(list) => list,
                None => return Ok(0),
            }
        } else {
            self.typed_or_insert(key, ValueType::List, now_ms, Value::as_list_mut)?
        };
        for value in values {
            match end {
                ListEnd::Head => list.push_front(value.clone()),
                ListEnd::Tail => list.push_back(value.clone()),
            }
        }
        let len = list.len();
        self.reap_if_empty(key);
        Ok(len)
    }

    pub fn lpush(&mut self, key: &[u8], values: &[Vec<u8>], now_ms: u64) -> Result<usize, StoreError> {
        self.push(key, values, ListEnd::Head, false, now_ms)
    }

    pub fn rpush(&mut self, key: &[u8], values: &[Vec<u8>], now_ms: u64) -> Result<usize, StoreError> {
        self.push(key, values, ListEnd::Tail, false, now_ms)
    }

    pub fn pop(
        &mut self,
        key: &[u8],
        end: ListEnd,
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(None);
        };
        let popped = match end {
            ListEnd::Head => list.pop_front(),
            ListEnd::Tail => list.pop_back(),
        };
        self.reap_if_empty(key);
        Ok(popped)
    }

    pub fn llen(&mut self, key: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_list_mut)?
            .map_or(0, |list| list.len()))
    }

    pub fn lrange(
        &mut self,
        key: &[u8],
        start: i64,
        stop: i64,
        now_ms: u64,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(Vec::new());
        };
        Ok(match clamp_rank_window(start, stop, list.len()) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    pub fn lindex(
        &mut self,
        key: &[u8],
        index: i64,
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(None);
        };
        Ok(resolve_index(index, list.len()).and_then(|at| list.get(at).cloned()))
    }

    pub fn lset(
        &mut self,
        key: &[u8],
        index: i64,
        value: Vec<u8>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let list = self
            .typed_mut(key, now_ms, Value::as_list_mut)?
            .ok_or(StoreError::KeyNotFound)?;
        let at = resolve_index(index, list.len()).ok_or(StoreError::IndexOutOfRange)?;
        list[at] = value;
        Ok(())
    }

    /// Returns the new length, or -1 when the key or the pivot is missing.
    pub fn linsert(
        &mut self,
        key: &[u8],
        position: InsertPosition,
        pivot: &[u8],
        value: Vec<u8>,
        now_ms: u64,
    ) -> Result<i64, StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(-1);
        };
        let Some(found) = list.iter().position(|item| item.as_slice() == pivot) else {
            return Ok(-1);
        };
        let at = match position {
            InsertPosition::Before => found,
            InsertPosition::After => found + 1,
        };
        list.insert(at, value);
        Ok(list.len() as i64)
    }

    /// Removes up to `|count|` occurrences of `value`: from the head when
    /// positive, from the tail when negative, all of them when zero.
    pub fn lrem(
        &mut self,
        key: &[u8],
        count: i64,
        value: &[u8],
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(0);
        };
        let limit = if count == 0 {
            usize::MAX
        } else {
            usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX)
        };
        let mut removed = 0_usize;
        let kept: VecDeque<Vec<u8>> = if count < 0 {
            let mut kept: VecDeque<Vec<u8>> = list
                .drain(..)
                .rev()
                .filter(|item| {
                    let drop = removed < limit && item.as_slice() == value;
                    removed += usize::from(drop);
                    !drop
                })
                .collect();
            kept.make_contiguous().reverse();
            kept
        } else {
            list.drain(..)
                .filter(|item| {
                    let drop = removed < limit && item.as_slice() == value;
                    removed += usize::from(drop);
                    !drop
                })
                .collect()
        };
        *list = kept;
        self.reap_if_empty(key);
        Ok(removed as u64)
    }

    /// Keeps only `start..=stop`; an empty window deletes the key.
    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64, now_ms: u64) -> Result<(), StoreError> {
        let Some(list) = self.typed_mut(key, now_ms, Value::as_list_mut)? else {
            return Ok(());
        };
        match clamp_rank_window(start, stop, list.len()) {
            Some((from, to)) => {
                list.truncate(to + 1);
                list.drain(..from);
            }
            None => list.clear(),
        }
        self.reap_if_empty(key);
        Ok(())
    }

    /// Pops the tail of `source` and pushes it onto the head of
    /// `destination`. The destination kind is checked before anything moves.
    pub fn rpoplpush(
        &mut self,
        source: &[u8],
        destination: &[u8],
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        if self.typed_mut(source, now_ms, Value::as_list_mut)?.is_none() {
            return Ok(None);
        }
        self.check_kind(destination, ValueType::List, now_ms)?;
        let Some(item) = self.pop(source, ListEnd::Tail, now_ms)? else {
            return Ok(None);
        };
        self.push(destination, std::slice::from_ref(&item), ListEnd::Head, false, now_ms)?;
        Ok(Some(item))
    }
}
