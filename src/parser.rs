//! Streaming parser for datahub entity change streams
//!
//! A change stream is a JSON array whose first element declares the
//! namespace context and whose remaining elements are entities or a
//! single continuation marker:
//!
//! ```text
//! [
//!   {"id": "@context", "namespaces": {"_": "http://data.example.org/", ...}},
//!   {"id": "road-1", "recorded": 17, "deleted": false, "props": {...}, "refs": {...}},
//!   ...
//!   {"id": "@continuation", "token": "..."}
//! ]
//! ```
//!
//! The parser walks the stream token by token. Every identifier position
//! (entity ids, property keys, reference keys and reference values) is
//! canonicalized against the context as it is read; unknown object keys
//! are skipped so newer producers do not break older readers.

use std::collections::BTreeMap;
use std::io::Read;

use tracing::debug;

use crate::context::Context;
use crate::entity::{Continuation, Entity, EntityCollection, PropertyValue, ReferenceValue};
use crate::error::ParseError;
use crate::token::{Token, Tokenizer};
use crate::vocab::{CONTEXT_ID, CONTINUATION_ID, TOKEN_KEY};

/// One element of the entity array after the context declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Entity(Entity),
    Continuation(Continuation),
}

/// Parse a whole change stream into an [`EntityCollection`]
///
/// Entities keep their input order. If several continuation markers
/// appear, the last one wins.
pub fn parse<R: Read>(reader: R) -> Result<EntityCollection, ParseError> {
    EntityStream::open(reader)?.into_collection()
}

/// Lazily decoded change stream
///
/// Opening the stream consumes the array start and the context
/// declaration; records are then decoded one at a time.
pub struct EntityStream<R> {
    tokens: Tokenizer<R>,
    context: Context,
    finished: bool,
}

impl<R: Read> EntityStream<R> {
    pub fn open(reader: R) -> Result<Self, ParseError> {
        Self::from_tokenizer(Tokenizer::new(reader))
    }

    /// Open with an explicit read buffer size
    pub fn with_capacity(capacity: usize, reader: R) -> Result<Self, ParseError> {
        Self::from_tokenizer(Tokenizer::with_capacity(capacity, reader))
    }

    fn from_tokenizer(mut tokens: Tokenizer<R>) -> Result<Self, ParseError> {
        const START: &str = "'[' at start of document";
        match next(&mut tokens, START)? {
            Token::BeginArray => {}
            other => return Err(unexpected(START, &other)),
        }
        let context = read_context(&mut tokens)?;
        debug!(namespaces = context.len(), "read stream context");
        Ok(Self {
            tokens,
            context,
            finished: false,
        })
    }

    /// The namespace context declared by the stream
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Decode the next record, or `None` once the closing ']' is read
    pub fn next_record(&mut self) -> Result<Option<Record>, ParseError> {
        if self.finished {
            return Ok(None);
        }

        const ELEMENT: &str = "entity or ']' in entity array";
        let at_end = match self.tokens.peek().map_err(|source| ParseError::Token {
            expected: ELEMENT,
            source,
        })? {
            Some(Token::BeginObject) => false,
            Some(Token::EndArray) => true,
            Some(other) => {
                return Err(ParseError::UnexpectedToken {
                    expected: ELEMENT,
                    found: other.to_string(),
                })
            }
            None => return Err(ParseError::UnexpectedEnd { expected: ELEMENT }),
        };

        next(&mut self.tokens, ELEMENT)?;
        if at_end {
            self.finished = true;
            return Ok(None);
        }
        parse_record(&mut self.tokens, &self.context)
            .map(Some)
            .map_err(|e| e.within("entity"))
    }

    /// Drain the remaining records into a collection
    pub fn into_collection(mut self) -> Result<EntityCollection, ParseError> {
        let mut records = Vec::new();
        let mut continuation = None;
        while let Some(record) = self.next_record()? {
            match record {
                Record::Entity(entity) => records.push(entity),
                Record::Continuation(c) => continuation = Some(c),
            }
        }
        debug!(
            entities = records.len(),
            continuation = continuation.is_some(),
            "parsed entity stream"
        );

        let mut collection = EntityCollection::new(self.context);
        collection.entities = records;
        collection.continuation = continuation;
        Ok(collection)
    }
}

impl<R: Read> Iterator for EntityStream<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn next<R: Read>(tokens: &mut Tokenizer<R>, expected: &'static str) -> Result<Token, ParseError> {
    tokens
        .next_token()
        .map_err(|source| ParseError::Token { expected, source })?
        .ok_or(ParseError::UnexpectedEnd { expected })
}

fn unexpected(expected: &'static str, found: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        found: found.to_string(),
    }
}

fn expect_string<R: Read>(
    tokens: &mut Tokenizer<R>,
    expected: &'static str,
) -> Result<String, ParseError> {
    match next(tokens, expected)? {
        Token::String(s) => Ok(s),
        other => Err(unexpected(expected, &other)),
    }
}

fn expect_object<R: Read>(
    tokens: &mut Tokenizer<R>,
    expected: &'static str,
) -> Result<(), ParseError> {
    match next(tokens, expected)? {
        Token::BeginObject => Ok(()),
        other => Err(unexpected(expected, &other)),
    }
}

/// Next member name of an open object, or `None` at its closing '}'
fn next_key<R: Read>(
    tokens: &mut Tokenizer<R>,
    expected: &'static str,
) -> Result<Option<String>, ParseError> {
    match next(tokens, expected)? {
        Token::Key(key) => Ok(Some(key)),
        Token::EndObject => Ok(None),
        other => Err(unexpected(expected, &other)),
    }
}

fn skip<R: Read>(tokens: &mut Tokenizer<R>, key: &str) -> Result<(), ParseError> {
    tokens.skip_value().map_err(|source| {
        ParseError::Token {
            expected: "value",
            source,
        }
        .within(format!("value of unknown key {}", key))
    })
}

fn canonical(context: &Context, id: &str) -> Result<String, ParseError> {
    context
        .canonicalize(id)
        .map_err(|source| ParseError::Canonicalize {
            id: id.to_string(),
            source,
        })
}

/// Read the leading `{"id": "@context", "namespaces": {...}}` element
fn read_context<R: Read>(tokens: &mut Tokenizer<R>) -> Result<Context, ParseError> {
    read_context_object(tokens).map_err(|e| match e {
        ParseError::MissingContext => ParseError::MissingContext,
        other => other.within("context"),
    })
}

fn read_context_object<R: Read>(tokens: &mut Tokenizer<R>) -> Result<Context, ParseError> {
    expect_object(tokens, "context object")?;

    let mut id = None;
    let mut context = Context::new();
    while let Some(key) = next_key(tokens, "context key")? {
        match key.as_str() {
            "id" => id = Some(expect_string(tokens, "context id")?),
            "namespaces" => {
                expect_object(tokens, "namespaces object")?;
                while let Some(prefix) = next_key(tokens, "namespace prefix")? {
                    let expansion = expect_string(tokens, "namespace expansion")?;
                    context.store(prefix, expansion);
                }
            }
            _ => skip(tokens, &key)?,
        }
    }

    if id.as_deref() != Some(CONTEXT_ID) {
        return Err(ParseError::MissingContext);
    }
    Ok(context)
}

/// Parse an entity or continuation object whose '{' is already consumed
fn parse_record<R: Read>(tokens: &mut Tokenizer<R>, context: &Context) -> Result<Record, ParseError> {
    let mut entity = Entity::default();
    let mut has_id = false;
    let mut is_continuation = false;
    let mut token = None;

    while let Some(key) = next_key(tokens, "entity key")? {
        match key.as_str() {
            "id" => {
                let id = expect_string(tokens, "id value")?;
                if id == CONTINUATION_ID {
                    is_continuation = true;
                } else {
                    entity.id = canonical(context, &id)?;
                }
                has_id = true;
            }
            "recorded" => {
                entity.recorded = match next(tokens, "recorded value")? {
                    Token::Number(n) => n
                        .as_u64()
                        .unwrap_or_else(|| n.as_f64().unwrap_or_default() as u64),
                    other => return Err(unexpected("numeric recorded value", &other)),
                }
            }
            "deleted" => {
                entity.is_deleted = match next(tokens, "deleted value")? {
                    Token::Bool(b) => b,
                    other => return Err(unexpected("boolean deleted value", &other)),
                }
            }
            "props" => {
                entity.properties =
                    parse_properties(tokens, context).map_err(|e| e.within("properties"))?
            }
            "refs" => {
                entity.references =
                    parse_references(tokens, context).map_err(|e| e.within("references"))?
            }
            TOKEN_KEY => {
                if !is_continuation {
                    return Err(ParseError::TokenOutsideContinuation);
                }
                token = Some(expect_string(tokens, "continuation token value")?);
            }
            _ => skip(tokens, &key)?,
        }
    }

    if is_continuation {
        return token
            .map(|token| Record::Continuation(Continuation { token }))
            .ok_or(ParseError::MissingContinuationToken);
    }
    if !has_id {
        return Err(ParseError::MissingId);
    }
    Ok(Record::Entity(entity))
}

fn parse_properties<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<BTreeMap<String, PropertyValue>, ParseError> {
    expect_object(tokens, "properties object")?;

    let mut properties = BTreeMap::new();
    while let Some(key) = next_key(tokens, "property key")? {
        let value = parse_property_value(tokens, context)
            .map_err(|e| e.within(format!("property value of key {}", key)))?;
        // null means absent
        if let Some(value) = value {
            properties.insert(canonical(context, &key)?, value);
        }
    }
    Ok(properties)
}

fn parse_property_value<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<Option<PropertyValue>, ParseError> {
    match next(tokens, "property value")? {
        Token::Null => Ok(None),
        Token::BeginObject => parse_nested_entity(tokens, context).map(Some),
        Token::BeginArray => parse_array(tokens, context).map(|items| Some(PropertyValue::Array(items))),
        other => scalar(other, "property value").map(Some),
    }
}

// '[' already consumed
fn parse_array<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<Vec<PropertyValue>, ParseError> {
    let mut items = Vec::new();
    loop {
        let item = match next(tokens, "array element")? {
            Token::EndArray => return Ok(items),
            Token::BeginObject => parse_nested_entity(tokens, context)?,
            Token::BeginArray => PropertyValue::Array(parse_array(tokens, context)?),
            other => scalar(other, "array element")?,
        };
        items.push(item);
    }
}

// '{' already consumed
fn parse_nested_entity<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<PropertyValue, ParseError> {
    match parse_record(tokens, context).map_err(|e| e.within("nested entity"))? {
        Record::Entity(entity) => Ok(PropertyValue::Entity(Box::new(entity))),
        Record::Continuation(_) => Err(ParseError::NestedContinuation),
    }
}

fn scalar(token: Token, expected: &'static str) -> Result<PropertyValue, ParseError> {
    match token {
        Token::String(s) => Ok(PropertyValue::String(s)),
        Token::Number(n) => Ok(PropertyValue::Number(n)),
        Token::Bool(b) => Ok(PropertyValue::Bool(b)),
        other => Err(unexpected(expected, &other)),
    }
}

fn parse_references<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<BTreeMap<String, ReferenceValue>, ParseError> {
    expect_object(tokens, "references object")?;

    let mut references = BTreeMap::new();
    while let Some(key) = next_key(tokens, "reference key")? {
        let value = parse_reference_value(tokens, context)
            .map_err(|e| e.within(format!("value of reference key {}", key)))?;
        references.insert(canonical(context, &key)?, value);
    }
    Ok(references)
}

fn parse_reference_value<R: Read>(
    tokens: &mut Tokenizer<R>,
    context: &Context,
) -> Result<ReferenceValue, ParseError> {
    match next(tokens, "reference value")? {
        Token::String(id) => Ok(ReferenceValue::Single(canonical(context, &id)?)),
        Token::BeginArray => {
            let mut ids = Vec::new();
            loop {
                match next(tokens, "reference array element")? {
                    Token::EndArray => return Ok(ReferenceValue::Many(ids)),
                    Token::String(id) => ids.push(canonical(context, &id)?),
                    other => return Err(unexpected("reference string", &other)),
                }
            }
        }
        other => Err(unexpected("reference string or array", &other)),
    }
}
