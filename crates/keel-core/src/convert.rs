//! Message conversion to flat records.
//!
//! A [`Record`] is a single-level JSON object whose keys are the dot-joined
//! paths of the original message's nested fields. Flat records are what
//! key/value oriented backends and log sinks consume.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Flat record: dot-joined keys to scalar or array values.
pub type Record = Map<String, Value>;

/// Errors raised while converting messages.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The message did not serialize to a JSON object.
    #[error("message must serialize to an object, got {0}")]
    NotARecord(&'static str),

    /// A field name contains the path separator.
    #[error("field `{0}` contains '.', which is reserved as the path separator")]
    AmbiguousKey(String),

    /// Two record keys address the same path as both a value and an object.
    #[error("record key `{0}` is both a value and a parent of other keys")]
    Conflict(String),

    /// Serde failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Converts messages of type `M` to and from flat records.
pub trait Converter<M>: Send + Sync {
    /// Flattens a message.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the message has no record shape.
    fn encode(&self, message: &M) -> Result<Record, ConversionError>;

    /// Rebuilds a message from a record produced by [`encode`](Converter::encode).
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the record is inconsistent or does not
    /// match `M`.
    fn decode(&self, record: Record) -> Result<M, ConversionError>;
}

/// [`Converter`] for any serde message that serializes to an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl<M: Serialize + DeserializeOwned> Converter<M> for JsonConverter {
    fn encode(&self, message: &M) -> Result<Record, ConversionError> {
        match serde_json::to_value(message)? {
            Value::Object(fields) => {
                let mut record = Record::new();
                flatten_into(&mut record, None, fields)?;
                Ok(record)
            }
            other => Err(ConversionError::NotARecord(kind_of(&other))),
        }
    }

    fn decode(&self, record: Record) -> Result<M, ConversionError> {
        let nested = unflatten(record)?;
        Ok(serde_json::from_value(Value::Object(nested))?)
    }
}

fn flatten_into(
    record: &mut Record,
    prefix: Option<&str>,
    fields: Map<String, Value>,
) -> Result<(), ConversionError> {
    for (key, value) in fields {
        if key.contains('.') {
            return Err(ConversionError::AmbiguousKey(key));
        }
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => {
                flatten_into(record, Some(&path), inner)?;
            }
            leaf => {
                record.insert(path, leaf);
            }
        }
    }
    Ok(())
}

fn unflatten(record: Record) -> Result<Map<String, Value>, ConversionError> {
    let mut root = Map::new();
    for (path, value) in record {
        let mut segments = path.split('.').peekable();
        let mut node = &mut root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if node.contains_key(segment) {
                    return Err(ConversionError::Conflict(path));
                }
                node.insert(segment.to_owned(), value);
                break;
            }
            let child = node
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match child {
                Value::Object(map) => map,
                _ => return Err(ConversionError::Conflict(path)),
            };
        }
    }
    Ok(root)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
