//! Error types for entity stream parsing, projection and serving

use std::path::PathBuf;
use thiserror::Error;

/// Lexical error while tokenizing a JSON byte stream.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("I/O error at byte {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of input at byte {offset} while reading {context}")]
    UnexpectedEof { offset: u64, context: &'static str },

    #[error("invalid character {found:?} at byte {offset}, expected {expected}")]
    UnexpectedByte {
        offset: u64,
        found: char,
        expected: &'static str,
    },

    #[error("invalid number literal '{literal}' at byte {offset}")]
    InvalidNumber { offset: u64, literal: String },

    #[error("invalid escape sequence at byte {offset}")]
    InvalidEscape { offset: u64 },

    #[error("invalid UTF-8 in string ending at byte {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("nesting deeper than {max} levels at byte {offset}")]
    TooDeep { offset: u64, max: usize },
}

/// Failure to resolve or combine namespace mappings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("no expansion for prefix: {0}")]
    UnknownPrefix(String),

    #[error("no prefix for expansion: {0}")]
    UnknownExpansion(String),

    #[error("{key} is already mapped to {existing}, cannot map it to {incoming}")]
    Conflict {
        key: String,
        existing: String,
        incoming: String,
    },
}

/// Structural error in an entity stream.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unable to read {expected}: {source}")]
    Token {
        expected: &'static str,
        #[source]
        source: TokenError,
    },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of stream while reading {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("first entity in array must be a context")]
    MissingContext,

    #[error("entity has no id")]
    MissingId,

    #[error("token property found but not a continuation entity")]
    TokenOutsideContinuation,

    #[error("continuation entity has no token")]
    MissingContinuationToken,

    #[error("continuation marker is not allowed inside a property value")]
    NestedContinuation,

    #[error("unable to canonicalize '{id}': {source}")]
    Canonicalize {
        id: String,
        #[source]
        source: ContextError,
    },

    #[error("unable to parse {context}: {source}")]
    Within {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with a description of the enclosing production
    pub fn within(self, context: impl Into<String>) -> Self {
        ParseError::Within {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// A typed accessor found no value of the requested shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("no {kind} value for {predicate}")]
    NotFound {
        kind: &'static str,
        predicate: String,
    },
}

/// Failure to build a GeoJSON geometry from an entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("unknown geometry type: {0}")]
    UnknownType(String),

    #[error("entity has no coordinate list")]
    MissingCoordinates,

    #[error("polygon coordinate list has odd length {0}")]
    OddCoordinateCount(usize),
}

/// Failure to load the dataset registry.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid datahub URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Duplicate dataset name '{0}'")]
    DuplicateDataset(String),
}

/// Failure to obtain a change stream from the datahub.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Datahub URL '{0}' cannot be used as a base")]
    InvalidBase(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Datahub responded with status {0}")]
    Status(u16),
}

/// Top-level failure of a change request or a conversion run.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("Unsupported dataset type '{0}'")]
    UnsupportedType(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Task(String),
}
