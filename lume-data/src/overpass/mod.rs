//! Nearby place names from the Overpass API.
//!
//! [`OverpassPoiLookup`] implements [`lume_core::PoiLookup`] by asking
//! Overpass for named nodes and ways within a radius of the requested
//! coordinate and returning the first name it finds.

mod lookup;
mod response;

pub use lookup::{
    DEFAULT_OVERPASS_URL, DEFAULT_RADIUS_M, OverpassConfig, OverpassPoiLookup, build_query,
};
