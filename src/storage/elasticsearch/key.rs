//! Event stream position for the Elasticsearch backend.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interfaces::{EventKey, Result, StoreError};

/// Backend name reported by `Key::backend`.
pub const BACKEND: &str = "elasticsearch";

/// Position in a build's event stream: `(time_millis, tiebreak)`.
///
/// Ordering is by `time_millis`, then `tiebreak`. Persisted as
/// `{"time": <millis>, "tiebreak": <n>}`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(deny_unknown_fields)]
pub struct Key {
    #[serde(rename = "time")]
    pub time_millis: i64,
    pub tiebreak: i64,
}

impl Key {
    pub fn new(time_millis: i64, tiebreak: i64) -> Self {
        Self {
            time_millis,
            tiebreak,
        }
    }

    /// Decode a key from its persisted form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|source| StoreError::Serialization {
            op: "unmarshal key",
            source,
        })
    }

    /// View an opaque key as this backend's key.
    pub fn downcast(key: &dyn EventKey) -> Result<&Key> {
        key.as_any()
            .downcast_ref::<Key>()
            .ok_or_else(|| StoreError::KeyType {
                expected: BACKEND,
                actual: key.backend().to_string(),
            })
    }

    /// Offset a read starts after. No cursor is the zero key.
    pub fn from_cursor(cursor: Option<&dyn EventKey>) -> Result<Key> {
        cursor.map_or(Ok(Key::default()), |key| Key::downcast(key).copied())
    }

    /// Sort values for `search_after`.
    pub fn sort_values(&self) -> Vec<i64> {
        vec![self.time_millis, self.tiebreak]
    }

    /// Key of a search hit, from the `[time_millis, tiebreak]` sort values
    /// the cluster returned for it.
    ///
    /// A hit without a `data.time` carries the cluster's missing-value
    /// sentinel (`i64::MAX` for an ascending sort), which still orders it
    /// after every timed event.
    pub fn from_sort_values(values: &[Value]) -> serde_json::Result<Key> {
        let (time_millis, tiebreak): (i64, i64) = serde_json::from_value(Value::Array(values.to_vec()))?;
        Ok(Key::new(time_millis, tiebreak))
    }
}

impl EventKey for Key {
    fn greater_than(&self, other: Option<&dyn EventKey>) -> Result<bool> {
        match other {
            None => Ok(true),
            Some(other) => Ok(self > Key::downcast(other)?),
        }
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| StoreError::Serialization {
            op: "marshal key",
            source,
        })
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
