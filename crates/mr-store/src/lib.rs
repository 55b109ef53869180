#![forbid(unsafe_code)]

//! Typed keyspaces with lazy expiration.
//!
//! A [`Store`] is one numbered database: a map from binary keys to typed
//! [`Value`]s with an optional deadline. Every operation first drops the key
//! it touches when that key has expired, then checks the stored kind before
//! reading or writing. [`Databases`] holds the numbered stores a client can
//! switch between.

mod databases;
mod dump;
mod hash;
mod list;
mod pattern;
mod range;
mod set;
mod string;
mod zset;

use std::collections::{HashMap, HashSet, VecDeque};

use mr_expire::Deadline;
use rand::Rng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use databases::Databases;
pub use dump::{DUMP_FORMAT_VERSION, PayloadError, decode_payload, encode_payload};
pub use list::{InsertPosition, ListEnd};
pub use mr_expire::PttlValue;
pub use pattern::glob_matches;
pub use range::{
    LexBound, LexRange, RangeLimit, RangeParseError, ScoreBound, ScoreRange, clamp_rank_window,
    parse_float, parse_lex_bound, parse_score_bound,
};
pub use set::{MAX_RANDOM_DRAWS, SetAlgebra};
pub use string::{BitOp, SetCondition, SetExpiry, SetOptions, SetOutcome};
pub use zset::{SortedSet, ZaddCondition, ZaddOptions, ZaddOutcome, ZaddUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("value is not an integer or out of range")]
    ValueNotInteger,
    #[error("value is not a valid float")]
    ValueNotFloat,
    #[error("increment or decrement would overflow")]
    IntegerOverflow,
    #[error("resulting score is not a number (NaN)")]
    ScoreIsNan,
    #[error("no such key")]
    KeyNotFound,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("target key name already exists")]
    BusyKey,
    #[error("DB index is out of range")]
    DbIndexOutOfRange,
    #[error("source and destination objects are the same")]
    SameObject,
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// The inner value held by a key in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    SortedSet(SortedSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Hash,
    List,
    Set,
    ZSet,
}

impl ValueType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Set => "set",
            Self::ZSet => "zset",
        }
    }
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Hash(_) => ValueType::Hash,
            Self::List(_) => ValueType::List,
            Self::Set(_) => ValueType::Set,
            Self::SortedSet(_) => ValueType::ZSet,
        }
    }

    fn empty(kind: ValueType) -> Self {
        match kind {
            ValueType::String => Self::String(Vec::new()),
            ValueType::Hash => Self::Hash(HashMap::new()),
            ValueType::List => Self::List(VecDeque::new()),
            ValueType::Set => Self::Set(HashSet::new()),
            ValueType::ZSet => Self::SortedSet(SortedSet::new()),
        }
    }

    /// Containers never stay in the keyspace once empty; strings may.
    fn is_empty_container(&self) -> bool {
        match self {
            Self::String(_) => false,
            Self::Hash(map) => map.is_empty(),
            Self::List(list) => list.is_empty(),
            Self::Set(set) => set.is_empty(),
            Self::SortedSet(zset) => zset.is_empty(),
        }
    }

    fn as_string_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Self::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn as_hash_mut(&mut self) -> Option<&mut HashMap<Vec<u8>, Vec<u8>>> {
        match self {
            Self::Hash(map) => Some(map),
            _ => None,
        }
    }

    fn as_list_mut(&mut self) -> Option<&mut VecDeque<Vec<u8>>> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    fn as_set_mut(&mut self) -> Option<&mut HashSet<Vec<u8>>> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    fn as_zset_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            Self::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    value: Value,
    expires_at_ms: Option<u64>,
    last_access_ms: u64,
}

impl Entry {
    fn new(value: Value, now_ms: u64) -> Self {
        Self {
            value,
            expires_at_ms: None,
            last_access_ms: now_ms,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Store {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones whose deadline passed but
    /// that nothing has touched yet. See [`Store::dbsize`] for live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn del(&mut self, keys: &[Vec<u8>], now_ms: u64) -> u64 {
        let mut removed = 0_u64;
        for key in keys {
            self.drop_if_expired(key, now_ms);
            if self.entries.remove(key.as_slice()).is_some() {
                removed = removed.saturating_add(1);
            }
        }
        removed
    }

    pub fn exists(&mut self, key: &[u8], now_ms: u64) -> bool {
        self.drop_if_expired(key, now_ms);
        self.entries.contains_key(key)
    }

    /// Refreshes the last-access time of each live key. Returns how many existed.
    pub fn touch(&mut self, keys: &[Vec<u8>], now_ms: u64) -> u64 {
        keys.iter()
            .filter(|key| self.entry_mut(key, now_ms).is_some())
            .count() as u64
    }

    /// Last time `key` was read or written, in unix milliseconds.
    pub fn last_access_ms(&mut self, key: &[u8], now_ms: u64) -> Option<u64> {
        self.drop_if_expired(key, now_ms);
        self.entries.get(key).map(|entry| entry.last_access_ms)
    }

    pub fn value_type(&mut self, key: &[u8], now_ms: u64) -> Option<ValueType> {
        self.drop_if_expired(key, now_ms);
        self.entries.get(key).map(|entry| entry.value.kind())
    }

    pub fn key_type(&mut self, key: &[u8], now_ms: u64) -> Option<&'static str> {
        self.value_type(key, now_ms).map(ValueType::as_str)
    }

    /// Moves `key` to `newkey`, replacing whatever `newkey` held and
    /// keeping the deadline.
    pub fn rename(&mut self, key: &[u8], newkey: &[u8], now_ms: u64) -> Result<(), StoreError> {
        self.drop_if_expired(key, now_ms);
        self.drop_if_expired(newkey, now_ms);
        let mut entry = self.entries.remove(key).ok_or(StoreError::KeyNotFound)?;
        entry.last_access_ms = now_ms;
        self.entries.insert(newkey.to_vec(), entry);
        Ok(())
    }

    pub fn renamenx(&mut self, key: &[u8], newkey: &[u8], now_ms: u64) -> Result<bool, StoreError> {
        self.drop_if_expired(key, now_ms);
        if !self.entries.contains_key(key) {
            return Err(StoreError::KeyNotFound);
        }
        if self.exists(newkey, now_ms) {
            return Ok(false);
        }
        self.rename(key, newkey, now_ms)?;
        Ok(true)
    }

    /// Live keys matching a glob pattern, sorted bytewise.
    pub fn keys_matching(&mut self, pattern: &[u8], now_ms: u64) -> Vec<Vec<u8>> {
        self.purge_expired(now_ms);
        let mut keys: Vec<Vec<u8>> = self
            .entries
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn random_key<R: Rng + ?Sized>(&mut self, rng: &mut R, now_ms: u64) -> Option<Vec<u8>> {
        self.purge_expired(now_ms);
        let mut keys: Vec<&Vec<u8>> = self.entries.keys().collect();
        keys.sort();
        keys.choose(rng).map(|key| (*key).clone())
    }

    pub fn dbsize(&mut self, now_ms: u64) -> usize {
        self.purge_expired(now_ms);
        self.entries.len()
    }

    pub fn flushdb(&mut self) {
        self.entries.clear();
    }

    pub fn expire_seconds(&mut self, key: &[u8], seconds: i64, now_ms: u64) -> bool {
        self.apply_deadline(key, mr_expire::deadline_from_relative_secs(seconds, now_ms), now_ms)
    }

    pub fn expire_milliseconds(&mut self, key: &[u8], milliseconds: i64, now_ms: u64) -> bool {
        self.apply_deadline(
            key,
            mr_expire::deadline_from_relative_ms(milliseconds, now_ms),
            now_ms,
        )
    }

    /// Absolute deadline given as a unix timestamp in seconds or milliseconds.
    pub fn expire_at(&mut self, key: &[u8], unix_time: i64, now_ms: u64) -> bool {
        self.apply_deadline(key, mr_expire::deadline_from_unix(unix_time, now_ms), now_ms)
    }

    pub fn pttl(&mut self, key: &[u8], now_ms: u64) -> PttlValue {
        self.drop_if_expired(key, now_ms);
        match self.entries.get(key) {
            Some(entry) => mr_expire::remaining_ttl(entry.expires_at_ms, now_ms),
            None => PttlValue::KeyMissing,
        }
    }

    pub fn persist(&mut self, key: &[u8], now_ms: u64) -> bool {
        match self.entry_mut(key, now_ms) {
            Some(entry) => entry.expires_at_ms.take().is_some(),
            None => false,
        }
    }

    /// Serializes the value at `key` into a DUMP payload. The deadline is
    /// not part of the payload.
    pub fn dump(&mut self, key: &[u8], now_ms: u64) -> Result<Option<Vec<u8>>, StoreError> {
        match self.entry_mut(key, now_ms) {
            Some(entry) => Ok(Some(encode_payload(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Recreates `key` from a DUMP payload. `ttl_ms == 0` means no deadline.
    pub fn restore(
        &mut self,
        key: &[u8],
        ttl_ms: u64,
        payload: &[u8],
        replace: bool,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        if !replace && self.exists(key, now_ms) {
            return Err(StoreError::BusyKey);
        }
        let value = decode_payload(payload)?;
        let mut entry = Entry::new(value, now_ms);
        if ttl_ms > 0 {
            entry.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
        }
        self.entries.insert(key.to_vec(), entry);
        Ok(())
    }

    pub(crate) fn take_entry(&mut self, key: &[u8], now_ms: u64) -> Option<Entry> {
        self.drop_if_expired(key, now_ms);
        self.entries.remove(key)
    }

    pub(crate) fn put_entry(&mut self, key: Vec<u8>, entry: Entry) {
        self.entries.insert(key, entry);
    }

    /// Feeds the canonical form of every entry into `hasher`: keys sorted,
    /// unordered containers sorted, deadlines included.
    pub(crate) fn feed_digest(&self, hasher: &mut Sha256) {
        let mut rows: Vec<_> = self.entries.iter().collect();
        rows.sort_by_key(|(key, _)| *key);
        for (key, entry) in rows {
            digest_bytes(hasher, key);
            match &entry.value {
                Value::String(bytes) => {
                    hasher.update(b"S");
                    digest_bytes(hasher, bytes);
                }
                Value::Hash(map) => {
                    hasher.update(b"H");
                    let mut fields: Vec<_> = map.iter().collect();
                    fields.sort_by_key(|(field, _)| *field);
                    for (field, value) in fields {
                        digest_bytes(hasher, field);
                        digest_bytes(hasher, value);
                    }
                }
                Value::List(list) => {
                    hasher.update(b"L");
                    for item in list {
                        digest_bytes(hasher, item);
                    }
                }
                Value::Set(set) => {
                    hasher.update(b"E");
                    let mut members: Vec<_> = set.iter().collect();
                    members.sort();
                    for member in members {
                        digest_bytes(hasher, member);
                    }
                }
                Value::SortedSet(zset) => {
                    hasher.update(b"Z");
                    for (member, score) in zset.iter() {
                        digest_bytes(hasher, member);
                        hasher.update(score.to_bits().to_le_bytes());
                    }
                }
            }
            hasher.update(entry.expires_at_ms.unwrap_or(0).to_le_bytes());
        }
    }

    fn apply_deadline(&mut self, key: &[u8], deadline: Deadline, now_ms: u64) -> bool {
        let Some(entry) = self.entry_mut(key, now_ms) else {
            return false;
        };
        match deadline {
            Deadline::At(when_ms) => entry.expires_at_ms = Some(when_ms),
            Deadline::Immediate => {
                self.entries.remove(key);
            }
        }
        true
    }

    fn drop_if_expired(&mut self, key: &[u8], now_ms: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| mr_expire::is_expired(entry.expires_at_ms, now_ms));
        if expired {
            self.entries.remove(key);
        }
        expired
    }

    fn purge_expired(&mut self, now_ms: u64) {
        self.entries
            .retain(|_, entry| !mr_expire::is_expired(entry.expires_at_ms, now_ms));
    }

    fn entry_mut(&mut self, key: &[u8], now_ms: u64) -> Option<&mut Entry> {
        self.drop_if_expired(key, now_ms);
        let entry = self.entries.get_mut(key)?;
        entry.last_access_ms = now_ms;
        Some(entry)
    }

    /// Kind check shared by every typed operation: `Ok(None)` when the key
    /// is absent, `WrongType` when it holds another kind.
    fn typed_mut<T>(
        &mut self,
        key: &[u8],
        now_ms: u64,
        project: fn(&mut Value) -> Option<&mut T>,
    ) -> Result<Option<&mut T>, StoreError> {
        match self.entry_mut(key, now_ms) {
            Some(entry) => project(&mut entry.value)
                .map(Some)
                .ok_or(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Like [`Store::typed_mut`] but creates an empty value of `kind` when
    /// the key is absent. Callers reap it again if they end up adding nothing.
    fn typed_or_insert<T>(
        &mut self,
        key: &[u8],
        kind: ValueType,
        now_ms: u64,
        project: fn(&mut Value) -> Option<&mut T>,
    ) -> Result<&mut T, StoreError> {
        self.drop_if_expired(key, now_ms);
        let entry = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::new(Value::empty(kind), now_ms));
        entry.last_access_ms = now_ms;
        project(&mut entry.value).ok_or(StoreError::WrongType)
    }

    /// `Ok(true)` when `key` is live and holds `kind`, `Ok(false)` when absent.
    fn check_kind(&mut self, key: &[u8], kind: ValueType, now_ms: u64) -> Result<bool, StoreError> {
        match self.value_type(key, now_ms) {
            Some(found) if found == kind => Ok(true),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(false),
        }
    }

    fn reap_if_empty(&mut self, key: &[u8]) {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_empty_container())
        {
            self.entries.remove(key);
        }
    }

    /// Replaces `key` with a fresh value, dropping any deadline. Empty
    /// containers delete the key instead.
    fn overwrite(&mut self, key: &[u8], value: Value, now_ms: u64) {
        if value.is_empty_container() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_vec(), Entry::new(value, now_ms));
        }
    }
}

fn digest_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

pub(crate) fn parse_i64(bytes: &[u8]) -> Result<i64, StoreError> {
    let text = std::str::from_utf8(bytes).map_err(|_| StoreError::ValueNotInteger)?;
    if text.starts_with('+') {
        return Err(StoreError::ValueNotInteger);
    }
    text.parse::<i64>().map_err(|_| StoreError::ValueNotInteger)
}

pub(crate) fn parse_f64(bytes: &[u8]) -> Result<f64, StoreError> {
    range::parse_float(bytes).ok_or(StoreError::ValueNotFloat)
}

/// Renders a float the way scores and float counters are returned:
/// integral values without a fraction, infinities as `inf`/`-inf`, very
/// large magnitudes in exponent form, and everything else in shortest
/// round-trip form.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.abs() >= 1e17 {
        return format!("{value:e}");
    }
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}
