//! Projection of parsed entities to GeoJSON
//!
//! Geometry is read off each entity through the flatgeo vocabulary: the
//! `geotype` reference picks the geometry kind and the `coordinates`
//! property carries a flat list of numbers.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::entity::{Entity, EntityCollection, PropertyValue};
use crate::error::GeometryError;
use crate::id::local_name;
use crate::vocab::{CONTEXT_ID, CONTINUATION_ID, COORDINATES, GEOTYPE, POINT_TYPE, POLYGON_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryType {
    Point,
    Polygon,
}

/// Coordinate payload of a geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Coordinates {
    /// A single position, copied element by element
    Position(Vec<PropertyValue>),
    /// Consecutive pairs of the flat coordinate list
    Pairs(Vec<[PropertyValue; 2]>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    pub geometry: Option<Geometry>,
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_link: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCollection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub bbox: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_link: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
}

/// One element of the projected output array
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureItem {
    Context { id: &'static str },
    Feature(Feature),
    Continuation { id: &'static str, token: String },
}

/// Project a collection to `[context marker, features..., continuation marker?]`
///
/// An entity whose geometry cannot be built still yields a feature, with a
/// `null` geometry.
pub fn to_features(collection: &EntityCollection, strip_property_urls: bool) -> Vec<FeatureItem> {
    let mut items = Vec::with_capacity(collection.entities.len() + 2);
    items.push(FeatureItem::Context { id: CONTEXT_ID });

    for entity in &collection.entities {
        items.push(FeatureItem::Feature(to_feature(entity, strip_property_urls)));
    }

    if let Some(continuation) = &collection.continuation {
        items.push(FeatureItem::Continuation {
            id: CONTINUATION_ID,
            token: continuation.token.clone(),
        });
    }
    items
}

/// Feature collection projection
///
/// Not implemented for any dataset yet: always empty.
pub fn to_feature_collections(_collection: &EntityCollection) -> Vec<FeatureCollection> {
    Vec::new()
}

pub fn to_feature(entity: &Entity, strip_property_urls: bool) -> Feature {
    let geometry = match geometry_from_entity(entity) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            warn!(entity = %entity.id, error = %e, "emitting feature without geometry");
            None
        }
    };

    let properties = entity
        .properties
        .iter()
        .map(|(key, value)| {
            let key = if strip_property_urls {
                local_name(key)
            } else {
                key.as_str()
            };
            (key.to_string(), value.clone())
        })
        .collect();

    Feature {
        id: entity.id.clone(),
        kind: "Feature",
        bbox: None,
        geometry,
        properties,
        asset_type: None,
        asset_link: None,
        is_deleted: entity.is_deleted,
    }
}

/// Build the geometry named by the entity's `geotype` reference
pub fn geometry_from_entity(entity: &Entity) -> Result<Geometry, GeometryError> {
    match entity.reference_value(GEOTYPE).unwrap_or_default() {
        POINT_TYPE => Ok(Geometry {
            kind: GeometryType::Point,
            coordinates: Coordinates::Position(coordinates(entity)?.to_vec()),
        }),
        POLYGON_TYPE => {
            let flat = coordinates(entity)?;
            if flat.len() % 2 != 0 {
                return Err(GeometryError::OddCoordinateCount(flat.len()));
            }
            let pairs = flat
                .chunks_exact(2)
                .map(|pair| [pair[0].clone(), pair[1].clone()])
                .collect();
            Ok(Geometry {
                kind: GeometryType::Polygon,
                coordinates: Coordinates::Pairs(pairs),
            })
        }
        other => Err(GeometryError::UnknownType(other.to_string())),
    }
}

fn coordinates(entity: &Entity) -> Result<&[PropertyValue], GeometryError> {
    match entity.properties.get(COORDINATES) {
        Some(PropertyValue::Array(items)) => Ok(items),
        _ => Err(GeometryError::MissingCoordinates),
    }
}
