//! Vocabulary used by the entity stream and the GeoJSON projection
//!
//! Reserved identifiers of the datahub envelope format and the fixed
//! flatgeo predicates read off entities when building geometries.

/// Id of the namespace declaration that opens every entity stream
pub const CONTEXT_ID: &str = "@context";

/// Id of the pagination marker that may appear among the entities
pub const CONTINUATION_ID: &str = "@continuation";

/// Prefix whose expansion is applied to bare (non-CURIE) identifiers
pub const DEFAULT_PREFIX: &str = "_";

/// Key holding the pagination token on a continuation marker
pub const TOKEN_KEY: &str = "token";

/// Base namespace for the flatgeo model
pub const FLATGEO_NS: &str = "http://data.mimiro.io/models/flatgeo/";

/// Reference naming the geometry kind of an entity
pub const GEOTYPE: &str = "http://data.mimiro.io/models/flatgeo/geotype";

/// Property holding the flat coordinate list of an entity
pub const COORDINATES: &str = "http://data.mimiro.io/models/flatgeo/coordinates";

/// Geometry kind for a single position
pub const POINT_TYPE: &str = "http://data.mimiro.io/models/flatgeo/Point";

/// Geometry kind for a list of positions
pub const POLYGON_TYPE: &str = "http://data.mimiro.io/models/flatgeo/Polygon";
