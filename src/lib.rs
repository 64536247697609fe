//! Datahub to GeoJSON bridge
//!
//! This library reads entity change streams published by a datahub and
//! projects them to GeoJSON features.
//!
//! # Overview
//!
//! A change stream is one JSON array: a namespace context first, then
//! entities, optionally interleaved with a continuation marker carrying the
//! token for the next page. The library:
//!
//! 1. Tokenizes the stream incrementally, without loading it whole
//! 2. Canonicalizes every identifier against the stream's context
//! 3. Builds typed entities with properties and references
//! 4. Projects each entity to a GeoJSON feature using the flatgeo vocabulary
//!
//! # Usage
//!
//! ## Convert a saved stream
//!
//! ```ignore
//! use datahub_geojson::{parse, to_features};
//!
//! let file = std::fs::File::open("changes.json")?;
//! let collection = parse(file)?;
//! let features = to_features(&collection, true);
//! println!("{}", serde_json::to_string(&features)?);
//! ```
//!
//! ## Iterate entities one at a time
//!
//! ```ignore
//! use datahub_geojson::{EntityStream, Record};
//!
//! let mut stream = EntityStream::open(reader)?;
//! for record in &mut stream {
//!     match record? {
//!         Record::Entity(entity) => println!("{}", entity.id),
//!         Record::Continuation(c) => println!("next page: {}", c.token),
//!     }
//! }
//! ```

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod geojson;
pub mod id;
pub mod parser;
pub mod server;
pub mod token;
pub mod vocab;

// Re-export main types for convenience
pub use crate::config::{Config, Dataset, DatasetKind};
pub use crate::context::Context;
pub use crate::entity::{Continuation, Entity, EntityCollection, PropertyValue, ReferenceValue};
pub use crate::error::{
    AccessError, ConfigError, ContextError, FetchError, GeometryError, ParseError, ServiceError,
    TokenError,
};
pub use crate::fetch::{ChangeSource, ChangeStream, HttpChangeSource};
pub use crate::geojson::{to_feature_collections, to_features, Feature, FeatureCollection, FeatureItem};
pub use crate::parser::{parse, EntityStream, Record};
pub use crate::server::{router, serve, AppState};
pub use crate::token::{Token, Tokenizer};
