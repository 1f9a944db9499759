//! Opaque class state and its two serializations.
//!
//! A unit's full state is a dictionary of typed values. It is stored either
//! as a compact binary form (a magic prefix followed by bincode) or as
//! pretty-printed JSON that a user can read and edit. Readers detect the
//! format from the content.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix of every binary class-state blob.
pub const BINARY_MAGIC: &[u8; 8] = b"fxstate1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Data(Vec<u8>),
    List(Vec<StateValue>),
    Dict(BTreeMap<String, StateValue>),
}

/// Full serialized state of a unit, parameters and internal data alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassState(pub BTreeMap<String, StateValue>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFormat {
    #[default]
    Binary,
    Text,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("no data")]
    Empty,

    #[error("unrecognized state format")]
    UnknownFormat,

    #[error("binary state: {0}")]
    Binary(#[from] bincode::Error),

    #[error("text state: {0}")]
    Text(#[from] serde_json::Error),
}

impl ClassState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: StateValue) -> Option<StateValue> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self, format: StateFormat) -> Result<Vec<u8>, StateError> {
        match format {
            StateFormat::Binary => {
                let mut bytes = BINARY_MAGIC.to_vec();
                bincode::serialize_into(&mut bytes, self)?;
                Ok(bytes)
            }
            StateFormat::Text => Ok(serde_json::to_vec_pretty(self)?),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        match detect_format(bytes)? {
            StateFormat::Binary => Ok(bincode::deserialize(&bytes[BINARY_MAGIC.len()..])?),
            StateFormat::Text => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

pub fn detect_format(bytes: &[u8]) -> Result<StateFormat, StateError> {
    if bytes.is_empty() {
        return Err(StateError::Empty);
    }
    if bytes.starts_with(BINARY_MAGIC) {
        return Ok(StateFormat::Binary);
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(StateFormat::Text),
        _ => Err(StateError::UnknownFormat),
    }
}

/// Re-serialize a blob in `format`. Blobs already in that format are
/// returned unchanged.
pub fn convert(bytes: &[u8], format: StateFormat) -> Result<Vec<u8>, StateError> {
    if detect_format(bytes)? == format {
        return Ok(bytes.to_vec());
    }
    ClassState::from_bytes(bytes)?.to_bytes(format)
}
