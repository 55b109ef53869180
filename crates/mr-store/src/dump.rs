//! DUMP/RESTORE payloads.
//!
//! Layout: `body | version (u16 LE) | sha256(body | version)[..8]`, where the
//! body is the JSON form of [`DumpedValue`]. Scores travel as raw `f64` bits
//! so infinities survive the trip through JSON.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{SortedSet, Value};

pub const DUMP_FORMAT_VERSION: u16 = 1;

const VERSION_LEN: usize = 2;
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("DUMP payload version or checksum are wrong")]
    Checksum,
    #[error("DUMP payload version or checksum are wrong")]
    Version,
    #[error("Bad data format")]
    Malformed,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
enum DumpedValue {
    String(Vec<u8>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    List(Vec<Vec<u8>>),
    Set(Vec<Vec<u8>>),
    Zset(Vec<(Vec<u8>, u64)>),
}

impl DumpedValue {
    fn capture(value: &Value) -> Self {
        match value {
            Value::String(bytes) => Self::String(bytes.clone()),
            Value::Hash(map) => {
                let mut fields: Vec<_> = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                fields.sort();
                Self::Hash(fields)
            }
            Value::List(list) => Self::List(list.iter().cloned().collect()),
            Value::Set(set) => {
                let mut members: Vec<_> = set.iter().cloned().collect();
                members.sort();
                Self::Set(members)
            }
            Value::SortedSet(zset) => Self::Zset(
                zset.iter()
                    .map(|(member, score)| (member.to_vec(), score.to_bits()))
                    .collect(),
            ),
        }
    }

    /// Containers are never stored empty, so an empty one is malformed.
    fn into_value(self) -> Result<Value, PayloadError> {
        let empty_container = match &self {
            Self::String(_) => false,
            Self::Hash(fields) => fields.is_empty(),
            Self::List(items) | Self::Set(items) => items.is_empty(),
            Self::Zset(pairs) => pairs.is_empty(),
        };
        if empty_container {
            return Err(PayloadError::Malformed);
        }
        let value = match self {
            Self::String(bytes) => Value::String(bytes),
            Self::Hash(fields) => Value::Hash(fields.into_iter().collect::<HashMap<_, _>>()),
            Self::List(items) => Value::List(items.into_iter().collect::<VecDeque<_>>()),
            Self::Set(members) => Value::Set(members.into_iter().collect::<HashSet<_>>()),
            Self::Zset(pairs) => {
                let mut zset = SortedSet::new();
                for (member, bits) in pairs {
                    let score = f64::from_bits(bits);
                    if score.is_nan() {
                        return Err(PayloadError::Malformed);
                    }
                    zset.insert(member, score);
                }
                Value::SortedSet(zset)
            }
        };
        Ok(value)
    }
}

pub fn encode_payload(value: &Value) -> Result<Vec<u8>, PayloadError> {
    let mut payload = serde_json::to_vec(&DumpedValue::capture(value))
        .map_err(|_| PayloadError::Malformed)?;
    payload.extend_from_slice(&DUMP_FORMAT_VERSION.to_le_bytes());
    let checksum = Sha256::digest(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    Ok(payload)
}

pub fn decode_payload(payload: &[u8]) -> Result<Value, PayloadError> {
    if payload.len() < VERSION_LEN + CHECKSUM_LEN {
        return Err(PayloadError::Checksum);
    }
    let (signed, checksum) = payload.split_at(payload.len() - CHECKSUM_LEN);
    if Sha256::digest(signed)[..CHECKSUM_LEN] != *checksum {
        return Err(PayloadError::Checksum);
    }
    let (body, version) = signed.split_at(signed.len() - VERSION_LEN);
    if u16::from_le_bytes([version[0], version[1]]) != DUMP_FORMAT_VERSION {
        return Err(PayloadError::Version);
    }
    let dumped: DumpedValue =
        serde_json::from_slice(body).map_err(|_| PayloadError::Malformed)?;
    dumped.into_value()
}
