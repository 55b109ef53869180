#![forbid(unsafe_code)]

//! The value every command answers with.
//!
//! Shapes follow the server's reply types, minus the wire encoding: status
//! lines, errors, integers, nullable bulk strings and nullable arrays.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    SimpleString(String),
    /// Only produced inside `EXEC` results; top-level failures are
    /// returned as `Err`.
    Error(String),
    Integer(i64),
    BulkString(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    #[must_use]
    pub fn ok() -> Self {
        Self::SimpleString("OK".to_string())
    }

    #[must_use]
    pub fn queued() -> Self {
        Self::SimpleString("QUEUED".to_string())
    }

    #[must_use]
    pub fn null_bulk() -> Self {
        Self::BulkString(None)
    }

    #[must_use]
    pub fn null_array() -> Self {
        Self::Array(None)
    }

    #[must_use]
    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Self::BulkString(Some(bytes.into()))
    }

    #[must_use]
    pub fn optional_bulk(bytes: Option<Vec<u8>>) -> Self {
        Self::BulkString(bytes)
    }

    #[must_use]
    pub fn integer(value: impl TryInto<i64>) -> Self {
        Self::Integer(value.try_into().unwrap_or(i64::MAX))
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }

    /// Array of non-null bulk strings.
    #[must_use]
    pub fn bulk_array<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self::Array(Some(items.into_iter().map(Self::bulk).collect()))
    }

    #[must_use]
    pub fn array(items: Vec<Reply>) -> Self {
        Self::Array(Some(items))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::BulkString(None) | Self::Array(None))
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Bulk or status payload as UTF-8 text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::SimpleString(text) => Some(text),
            Self::BulkString(Some(bytes)) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Self::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// Flattens an array of bulk strings into owned byte vectors. Null
    /// elements are skipped.
    #[must_use]
    pub fn into_bulk_vec(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Self::Array(Some(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Self::BulkString(Some(bytes)) => Some(bytes),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleString(text) => write!(f, "{text}"),
            Self::Error(message) => write!(f, "(error) {message}"),
            Self::Integer(value) => write!(f, "(integer) {value}"),
            Self::BulkString(Some(bytes)) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
            Self::BulkString(None) | Self::Array(None) => write!(f, "(nil)"),
            Self::Array(Some(items)) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Reply {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Option<Vec<u8>>> for Reply {
    fn from(value: Option<Vec<u8>>) -> Self {
        Self::BulkString(value)
    }
}
