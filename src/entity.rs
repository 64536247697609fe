//! In-memory entity model
//!
//! Entities are built by the stream parser and read by the GeoJSON
//! projection. Every property and reference key is a canonical URI.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Number;

use crate::context::Context;
use crate::error::AccessError;

/// Value of an entity property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    /// Kept as written, so integers serialize without a fraction
    Number(Number),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Entity(Box<Entity>),
}

impl PropertyValue {
    /// The value itself, or the first element of an array
    fn first(&self) -> Option<&PropertyValue> {
        match self {
            PropertyValue::Array(items) => items.first(),
            other => Some(other),
        }
    }
}

/// Value of an entity reference: one canonical URI or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReferenceValue {
    Single(String),
    Many(Vec<String>),
}

impl ReferenceValue {
    /// The URI itself, or the first URI of a list
    pub fn first(&self) -> Option<&str> {
        match self {
            ReferenceValue::Single(uri) => Some(uri),
            ReferenceValue::Many(uris) => uris.first().map(String::as_str),
        }
    }
}

/// One versioned entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub recorded: u64,
    #[serde(rename = "deleted")]
    pub is_deleted: bool,
    #[serde(rename = "props")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(rename = "refs")]
    pub references: BTreeMap<String, ReferenceValue>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// First reference URI stored under `predicate`
    pub fn reference_value(&self, predicate: &str) -> Result<&str, AccessError> {
        self.references
            .get(predicate)
            .and_then(ReferenceValue::first)
            .ok_or_else(|| not_found("reference", predicate))
    }

    /// First string literal stored under `predicate`
    pub fn string_property(&self, predicate: &str) -> Result<&str, AccessError> {
        match self.properties.get(predicate).and_then(PropertyValue::first) {
            Some(PropertyValue::String(s)) => Ok(s),
            _ => Err(not_found("string", predicate)),
        }
    }

    /// First boolean literal stored under `predicate`
    pub fn bool_property(&self, predicate: &str) -> Result<bool, AccessError> {
        match self.properties.get(predicate).and_then(PropertyValue::first) {
            Some(PropertyValue::Bool(b)) => Ok(*b),
            _ => Err(not_found("boolean", predicate)),
        }
    }

    /// First numeric literal stored under `predicate`, truncated toward zero
    pub fn int_property(&self, predicate: &str) -> Result<i64, AccessError> {
        match self.properties.get(predicate).and_then(PropertyValue::first) {
            Some(PropertyValue::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| not_found("integer", predicate)),
            _ => Err(not_found("integer", predicate)),
        }
    }
}

fn not_found(kind: &'static str, predicate: &str) -> AccessError {
    AccessError::NotFound {
        kind,
        predicate: predicate.to_string(),
    }
}

/// Pagination cursor for resuming a change stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub token: String,
}

/// Everything decoded from one change stream
#[derive(Debug, Clone, Default)]
pub struct EntityCollection {
    pub context: Context,
    pub entities: Vec<Entity>,
    pub continuation: Option<Continuation>,
}

impl EntityCollection {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }
}
