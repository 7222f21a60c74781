//! # Data Model
//!
//! Plain value types shared by every layer: entity identity, geographic
//! points, and extracted field values. No I/O, no state, no async.

pub mod geo;
pub mod ids;
pub mod value;

pub use geo::{
    GeoPoint, EARTH_RADIUS_KM,
    distance_km, distance_km_with_radius, distance_between, normalize_lon,
};
pub use ids::{EntityType, EntityId, EntityKey, DocumentId};
pub use value::{Value, FieldMap};
