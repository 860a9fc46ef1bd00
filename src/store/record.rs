//! Record shape shared by every collection: a JSON object carrying an `id`.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::error::{StoreError, StoreResult};

/// Name of the key field every record must carry.
pub const ID_FIELD: &str = "id";

/// Identifier of a record. Equality is exact: `"7"` and `7` are different keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    Text(String),
    Number(Number),
}

impl RecordId {
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        match value {
            Value::String(text) if text.trim().is_empty() => {
                Err(StoreError::invalid_record("'id' must not be empty"))
            }
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Number(number) => Ok(Self::Number(number.clone())),
            Value::Null => Err(StoreError::invalid_record("'id' must not be null")),
            other => Err(StoreError::invalid_record(format!(
                "'id' must be a string or a number, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Keys a lookup coming from text (e.g. a URL segment) may refer to:
    /// the text itself, then its numeric reading when it parses as one.
    pub fn lookup_candidates(raw: &str) -> Vec<Self> {
        let mut candidates = vec![Self::Text(raw.to_string())];
        if let Ok(int) = raw.parse::<i64>() {
            candidates.push(Self::Number(Number::from(int)));
        } else if let Ok(uint) = raw.parse::<u64>() {
            candidates.push(Self::Number(Number::from(uint)));
        } else if let Some(float) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            candidates.push(Self::Number(float));
        }
        candidates
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(number) => number.as_u64(),
            Self::Text(_) => None,
        }
    }

    /// Hashable form used for uniqueness checks.
    pub(crate) fn unique_key(&self) -> String {
        match self {
            Self::Text(text) => format!("s:{text}"),
            Self::Number(number) => format!("n:{number}"),
        }
    }

}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Number(number) => number.serialize(serializer),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "\"{text}\""),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

/// A validated JSON object with a string or numeric `id`.
///
/// Field order is kept as written so files round-trip without reshuffling.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: Map<String, Value>,
}

impl Record {
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Builds a record from any serializable type whose JSON form is a keyed object.
    pub fn from_serialize<T: Serialize>(value: &T) -> StoreResult<Self> {
        let json = serde_json::to_value(value)
            .map_err(|err| StoreError::invalid_record(format!("not serializable: {err}")))?;
        Self::try_from(json)
    }
}

impl TryFrom<Value> for Record {
    type Error = StoreError;

    fn try_from(value: Value) -> StoreResult<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(StoreError::invalid_record(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )));
            }
        };
        let id = match fields.get(ID_FIELD) {
            Some(raw) => RecordId::from_value(raw)?,
            None => return Err(StoreError::invalid_record("missing 'id' field")),
        };
        Ok(Self { id, fields })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Fails with `DuplicateKey` on the first id seen twice.
pub(crate) fn ensure_unique_ids(collection: &str, records: &[Record]) -> StoreResult<()> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.unique_key()) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id: record.id.clone(),
            });
        }
    }
    Ok(())
}

/// Allocates a numeric id: the current millisecond timestamp, bumped past the
/// highest numeric id already present so ids stay unique within one tick.
pub fn next_numeric_id(records: &[Record], now_ms: u64) -> u64 {
    let highest = records.iter().filter_map(|r| r.id.as_u64()).max();
    match highest {
        Some(max) if max >= now_ms => max.saturating_add(1),
        _ => now_ms,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
