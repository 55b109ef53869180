//! String values, counters, and bit operations.

use crate::{
    Entry, Store, StoreError, Value, ValueType, clamp_rank_window, format_float, parse_f64,
    parse_i64,
};

/// What happens to the deadline when `SET` replaces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetExpiry {
    #[default]
    Clear,
    KeepTtl,
    /// Absolute unix-millisecond deadline.
    At(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    #[default]
    Always,
    IfAbsent,
    IfPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    pub expiry: SetExpiry,
    pub condition: SetCondition,
    pub return_previous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    pub applied: bool,
    /// Prior value, only filled in when `return_previous` was requested.
    pub previous: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl Store {
    /// Get a string value. Returns `None` if the key doesn't exist.
    /// Returns `Err(WrongType)` if the key holds a non-string value.
    pub fn get(&mut self, key: &[u8], now_ms: u64) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_string_mut)?
            .map(|bytes| bytes.clone()))
    }

    pub fn set(
        &mut self,
        key: Vec<u8>,
        value: Vec<u8>,
        px_ttl_ms: Option<u64>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let expiry = match px_ttl_ms {
            Some(ttl) => SetExpiry::At(now_ms.saturating_add(ttl)),
            None => SetExpiry::Clear,
        };
        let options = SetOptions {
            expiry,
            ..SetOptions::default()
        };
        self.set_with_options(&key, value, options, now_ms)
            .map(|_| ())
    }

    pub fn set_with_options(
        &mut self,
        key: &[u8],
        value: Vec<u8>,
        options: SetOptions,
        now_ms: u64,
    ) -> Result<SetOutcome, StoreError> {
        self.drop_if_expired(key, now_ms);
        let (exists, kept_deadline, previous) = match self.entries.get(key) {
            Some(Entry {
                value: Value::String(bytes),
                expires_at_ms,
                ..
            }) => (
                true,
                *expires_at_ms,
                options.return_previous.then(|| bytes.clone()),
            ),
            Some(_) => return Err(StoreError::WrongType),
            None => (false, None, None),
        };
        let applied = match options.condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !exists,
            SetCondition::IfPresent => exists,
        };
        if applied {
            let mut entry = Entry::new(Value::String(value), now_ms);
            entry.expires_at_ms = match options.expiry {
                SetExpiry::Clear => None,
                SetExpiry::KeepTtl => kept_deadline,
                SetExpiry::At(when_ms) => Some(when_ms),
            };
            self.entries.insert(key.to_vec(), entry);
        }
        Ok(SetOutcome { applied, previous })
    }

    pub fn setnx(&mut self, key: &[u8], value: Vec<u8>, now_ms: u64) -> Result<bool, StoreError> {
        let options = SetOptions {
            condition: SetCondition::IfAbsent,
            ..SetOptions::default()
        };
        Ok(self.set_with_options(key, value, options, now_ms)?.applied)
    }

    /// Replaces the value and clears any deadline, returning the old value.
    pub fn getset(
        &mut self,
        key: &[u8],
        value: Vec<u8>,
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let options = SetOptions {
            return_previous: true,
            ..SetOptions::default()
        };
        Ok(self.set_with_options(key, value, options, now_ms)?.previous)
    }

    pub fn getdel(&mut self, key: &[u8], now_ms: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.get(key, now_ms)?;
        if value.is_some() {
            self.entries.remove(key);
        }
        Ok(value)
    }

    /// One slot per key; absent and non-string keys read as `None`.
    pub fn mget(&mut self, keys: &[Vec<u8>], now_ms: u64) -> Vec<Option<Vec<u8>>> {
        keys.iter()
            .map(|key| self.get(key, now_ms).ok().flatten())
            .collect()
    }

    /// Sets every pair, or nothing when any key holds another kind.
    pub fn mset(&mut self, pairs: &[(Vec<u8>, Vec<u8>)], now_ms: u64) -> Result<(), StoreError> {
        for (key, _) in pairs {
            self.check_kind(key, ValueType::String, now_ms)?;
        }
        for (key, value) in pairs {
            self.entries
                .insert(key.clone(), Entry::new(Value::String(value.clone()), now_ms));
        }
        Ok(())
    }

    pub fn msetnx(&mut self, pairs: &[(Vec<u8>, Vec<u8>)], now_ms: u64) -> bool {
        if pairs.iter().any(|(key, _)| self.exists(key, now_ms)) {
            return false;
        }
        for (key, value) in pairs {
            self.entries
                .insert(key.clone(), Entry::new(Value::String(value.clone()), now_ms));
        }
        true
    }

    pub fn append(&mut self, key: &[u8], value: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        let bytes = self.typed_or_insert(key, ValueType::String, now_ms, Value::as_string_mut)?;
        bytes.extend_from_slice(value);
        Ok(bytes.len())
    }

    pub fn strlen(&mut self, key: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_string_mut)?
            .map_or(0, |bytes| bytes.len()))
    }

    pub fn getrange(
        &mut self,
        key: &[u8],
        start: i64,
        end: i64,
        now_ms: u64,
    ) -> Result<Vec<u8>, StoreError> {
        let Some(bytes) = self.typed_mut(key, now_ms, Value::as_string_mut)? else {
            return Ok(Vec::new());
        };
        Ok(match clamp_rank_window(start, end, bytes.len()) {
            Some((from, to)) => bytes[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    /// Overwrites from `offset`, zero-padding as needed. An empty `value`
    /// never creates the key.
    pub fn setrange(
        &mut self,
        key: &[u8],
        offset: usize,
        value: &[u8],
        now_ms: u64,
    ) -> Result<usize, StoreError> {
        if value.is_empty() {
            return self.strlen(key, now_ms);
        }
        let bytes = self.typed_or_insert(key, ValueType::String, now_ms, Value::as_string_mut)?;
        let end = offset.saturating_add(value.len());
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[offset..end].copy_from_slice(value);
        Ok(bytes.len())
    }

    pub fn incrby(&mut self, key: &[u8], delta: i64, now_ms: u64) -> Result<i64, StoreError> {
        let current = match self.typed_mut(key, now_ms, Value::as_string_mut)? {
            Some(bytes) => parse_i64(bytes)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or(StoreError::IntegerOverflow)?;
        let bytes = self.typed_or_insert(key, ValueType::String, now_ms, Value::as_string_mut)?;
        *bytes = next.to_string().into_bytes();
        Ok(next)
    }

    pub fn incrbyfloat(&mut self, key: &[u8], delta: f64, now_ms: u64) -> Result<f64, StoreError> {
        let current = match self.typed_mut(key, now_ms, Value::as_string_mut)? {
            Some(bytes) => parse_f64(bytes)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(StoreError::ValueNotFloat);
        }
        let bytes = self.typed_or_insert(key, ValueType::String, now_ms, Value::as_string_mut)?;
        *bytes = format_float(next).into_bytes();
        Ok(next)
    }

    /// Sets or clears the bit at `offset` (MSB-first within each byte) and
    /// returns its previous value.
    pub fn setbit(
        &mut self,
        key: &[u8],
        offset: usize,
        bit: bool,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let bytes = self.typed_or_insert(key, ValueType::String, now_ms, Value::as_string_mut)?;
        let (index, mask) = bit_position(offset);
        if bytes.len() <= index {
            bytes.resize(index + 1, 0);
        }
        let previous = bytes[index] & mask != 0;
        if bit {
            bytes[index] |= mask;
        } else {
            bytes[index] &= !mask;
        }
        Ok(previous)
    }

    pub fn getbit(&mut self, key: &[u8], offset: usize, now_ms: u64) -> Result<bool, StoreError> {
        let (index, mask) = bit_position(offset);
        Ok(self
            .typed_mut(key, now_ms, Value::as_string_mut)?
            .and_then(|bytes| bytes.get(index))
            .is_some_and(|byte| byte & mask != 0))
    }

    /// Population count, optionally limited to an inclusive byte window.
    pub fn bitcount(
        &mut self,
        key: &[u8],
        window: Option<(i64, i64)>,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let Some(bytes) = self.typed_mut(key, now_ms, Value::as_string_mut)? else {
            return Ok(0);
        };
        let slice = match window {
            None => bytes.as_slice(),
            Some((start, end)) => match clamp_rank_window(start, end, bytes.len()) {
                Some((from, to)) => &bytes[from..=to],
                None => &[],
            },
        };
        Ok(slice.iter().map(|byte| u64::from(byte.count_ones())).sum())
    }

    /// Combines `sources` into `dest`, replacing whatever `dest` held.
    /// Returns the length of the result; an empty result deletes `dest`.
    pub fn bitop(
        &mut self,
        op: BitOp,
        dest: &[u8],
        sources: &[Vec<u8>],
        now_ms: u64,
    ) -> Result<usize, StoreError> {
        let mut inputs = Vec::with_capacity(sources.len());
        for key in sources {
            inputs.push(self.get(key, now_ms)?.unwrap_or_default());
        }
        let width = inputs.iter().map(Vec::len).max().unwrap_or(0);
        let byte_at = |input: &Vec<u8>, index: usize| input.get(index).copied().unwrap_or(0);
        let result: Vec<u8> = (0..width)
            .map(|index| {
                let mut lanes = inputs.iter().map(|input| byte_at(input, index));
                let first = lanes.next().unwrap_or(0);
                match op {
                    BitOp::And => lanes.fold(first, |acc, byte| acc & byte),
                    BitOp::Or => lanes.fold(first, |acc, byte| acc | byte),
                    BitOp::Xor => lanes.fold(first, |acc, byte| acc ^ byte),
                    BitOp::Not => !first,
                }
            })
            .collect();
        let len = result.len();
        if len == 0 {
            self.entries.remove(dest);
        } else {
            self.overwrite(dest, Value::String(result), now_ms);
        }
        Ok(len)
    }
}

fn bit_position(offset: usize) -> (usize, u8) {
    (offset / 8, 0x80 >> (offset % 8))
}

#[cfg(test)]
mod tests {
    use crate::{BitOp, PttlValue, SetCondition, SetExpiry, SetOptions, Store, StoreError};

    #[test]
    fn set_refuses_to_replace_other_kinds() {
        let mut store = Store::new();
        store.rpush(b"l", &[b"x".to_vec()], 0).expect("rpush");
        assert_eq!(
            store.set(b"l".to_vec(), b"v".to_vec(), None, 0),
            Err(StoreError::WrongType)
        );
        assert_eq!(store.append(b"l", b"v", 0), Err(StoreError::WrongType));
        assert_eq!(store.getset(b"l", b"v".to_vec(), 0), Err(StoreError::WrongType));
        assert_eq!(store.llen(b"l", 0), Ok(1));
    }

    #[test]
    fn set_options_apply_conditions_and_deadlines() {
        let mut store = Store::new();
        let nx = SetOptions {
            condition: SetCondition::IfAbsent,
            expiry: SetExpiry::At(1_000),
            ..SetOptions::default()
        };
        assert!(store.set_with_options(b"k", b"1".to_vec(), nx, 0).expect("set").applied);
        assert!(!store.set_with_options(b"k", b"2".to_vec(), nx, 0).expect("set").applied);
        let keep = SetOptions {
            expiry: SetExpiry::KeepTtl,
            return_previous: true,
            ..SetOptions::default()
        };
        let outcome = store.set_with_options(b"k", b"3".to_vec(), keep, 10).expect("set");
        assert_eq!(outcome.previous, Some(b"1".to_vec()));
        assert_eq!(store.pttl(b"k", 10), PttlValue::Remaining(990));
        store.set(b"k".to_vec(), b"4".to_vec(), None, 20).expect("set");
        assert_eq!(store.pttl(b"k", 20), PttlValue::NoExpiry);
        let xx = SetOptions {
            condition: SetCondition::IfPresent,
            ..SetOptions::default()
        };
        assert!(!store.set_with_options(b"nope", b"v".to_vec(), xx, 0).expect("set").applied);
    }

    #[test]
    fn counters_keep_deadline_and_detect_overflow() {
        let mut store = Store::new();
        assert_eq!(store.incrby(b"n", 5, 0), Ok(5));
        store.expire_milliseconds(b"n", 100, 0);
        assert_eq!(store.incrby(b"n", -7, 10), Ok(-2));
        assert_eq!(store.pttl(b"n", 10), PttlValue::Remaining(90));
        store.set(b"max".to_vec(), i64::MAX.to_string().into_bytes(), None, 0).expect("set");
        assert_eq!(store.incrby(b"max", 1, 0), Err(StoreError::IntegerOverflow));
        store.set(b"text".to_vec(), b"abc".to_vec(), None, 0).expect("set");
        assert_eq!(store.incrby(b"text", 1, 0), Err(StoreError::ValueNotInteger));
    }

    #[test]
    fn incrbyfloat_formats_and_rejects_non_finite() {
        let mut store = Store::new();
        assert_eq!(store.incrbyfloat(b"f", 10.5, 0), Ok(10.5));
        assert_eq!(store.incrbyfloat(b"f", 0.5, 0), Ok(11.0));
        assert_eq!(store.get(b"f", 0), Ok(Some(b"11".to_vec())));
        assert_eq!(store.incrbyfloat(b"f", f64::INFINITY, 0), Err(StoreError::ValueNotFloat));
        assert_eq!(store.get(b"f", 0), Ok(Some(b"11".to_vec())));
    }

    #[test]
    fn mset_validates_before_writing() {
        let mut store = Store::new();
        store.sadd(b"s", &[b"m".to_vec()], 0).expect("sadd");
        let pairs = vec![(b"a".to_vec(), b"1".to_vec()), (b"s".to_vec(), b"2".to_vec())];
        assert_eq!(store.mset(&pairs, 0), Err(StoreError::WrongType));
        assert!(!store.exists(b"a", 0));
        assert!(!store.msetnx(&pairs, 0));
        let fresh = vec![(b"x".to_vec(), b"1".to_vec()), (b"y".to_vec(), b"2".to_vec())];
        assert!(store.msetnx(&fresh, 0));
        assert_eq!(
            store.mget(&[b"x".to_vec(), b"s".to_vec(), b"zz".to_vec()], 0),
            vec![Some(b"1".to_vec()), None, None]
        );
    }

    #[test]
    fn ranges_over_strings() {
        let mut store = Store::new();
        store.set(b"k".to_vec(), b"Hello World".to_vec(), None, 0).expect("set");
        assert_eq!(store.getrange(b"k", 0, 4, 0), Ok(b"Hello".to_vec()));
        assert_eq!(store.getrange(b"k", -5, -1, 0), Ok(b"World".to_vec()));
        assert_eq!(store.getrange(b"k", 5, 2, 0), Ok(Vec::new()));
        assert_eq!(store.setrange(b"k", 6, b"Redis", 0), Ok(11));
        assert_eq!(store.get(b"k", 0), Ok(Some(b"Hello Redis".to_vec())));
        assert_eq!(store.setrange(b"pad", 3, b"x", 0), Ok(4));
        assert_eq!(store.get(b"pad", 0), Ok(Some(vec![0, 0, 0, b'x'])));
        assert_eq!(store.setrange(b"empty", 3, b"", 0), Ok(0));
        assert!(!store.exists(b"empty", 0));
    }

    #[test]
    fn bits_are_msb_first_within_bytes() {
        let mut store = Store::new();
        assert_eq!(store.setbit(b"b", 7, true, 0), Ok(false));
        assert_eq!(store.get(b"b", 0), Ok(Some(vec![0x01])));
        assert_eq!(store.setbit(b"b", 0, true, 0), Ok(false));
        assert_eq!(store.get(b"b", 0), Ok(Some(vec![0x81])));
        assert_eq!(store.setbit(b"b", 7, false, 0), Ok(true));
        assert_eq!(store.getbit(b"b", 0, 0), Ok(true));
        assert_eq!(store.getbit(b"b", 1_000, 0), Ok(false));
        assert_eq!(store.setbit(b"b", 17, true, 0), Ok(false));
        assert_eq!(store.strlen(b"b", 0), Ok(3));
        assert_eq!(store.bitcount(b"b", None, 0), Ok(2));
        assert_eq!(store.bitcount(b"b", Some((1, -1)), 0), Ok(1));
        assert_eq!(store.bitcount(b"b", Some((5, 9)), 0), Ok(0));
    }

    #[test]
    fn bitop_pads_shorter_sources() {
        let mut store = Store::new();
        store.set(b"a".to_vec(), vec![0xff, 0x0f], None, 0).expect("set");
        store.set(b"b".to_vec(), vec![0x0f], None, 0).expect("set");
        store.sadd(b"dst", &[b"m".to_vec()], 0).expect("sadd");
        let sources = [b"a".to_vec(), b"b".to_vec()];
        assert_eq!(store.bitop(BitOp::Xor, b"dst", &sources, 0), Ok(2));
        assert_eq!(store.get(b"dst", 0), Ok(Some(vec![0xf0, 0x0f])));
        assert_eq!(store.bitop(BitOp::And, b"dst", &sources, 0), Ok(2));
        assert_eq!(store.get(b"dst", 0), Ok(Some(vec![0x0f, 0x00])));
        assert_eq!(store.bitop(BitOp::Not, b"dst", &[b"b".to_vec()], 0), Ok(1));
        assert_eq!(store.get(b"dst", 0), Ok(Some(vec![0xf0])));
        assert_eq!(store.bitop(BitOp::Or, b"dst", &[b"none".to_vec()], 0), Ok(0));
        assert!(!store.exists(b"dst", 0));
    }
}
