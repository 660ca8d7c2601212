//! OSRM API response types for the Route service.
//!
//! Only the parts needed to rebuild the polyline and the turn-by-turn
//! maneuvers are decoded.
//!
//! See: <http://project-osrm.org/docs/v5.24.0/api/#route-service>

use serde::Deserialize;

/// OSRM Route API response.
#[derive(Debug, Deserialize)]
pub struct RouteResponse {
    /// Status code from OSRM.
    ///
    /// Common values:
    /// - `"Ok"` - Request was successful
    /// - `"NoRoute"` - No route between the coordinates
    /// - `"InvalidQuery"` - Invalid query parameters
    pub code: String,

    /// Optional error message when `code` is not `"Ok"`.
    pub message: Option<String>,

    /// Alternative routes, best first.
    #[serde(default)]
    pub routes: Vec<RouteObject>,
}

impl RouteResponse {
    /// Check if the response indicates success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

/// One route through all supplied coordinates.
#[derive(Debug, Deserialize)]
pub struct RouteObject {
    /// Full-resolution line when requested with `geometries=geojson`.
    pub geometry: Geometry,
    /// One leg per pair of consecutive coordinates.
    #[serde(default)]
    pub legs: Vec<Leg>,
}

/// GeoJSON `LineString` geometry.
#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude]` pairs.
    pub coordinates: Vec<[f64; 2]>,
}

/// Route between two consecutive coordinates.
#[derive(Debug, Deserialize)]
pub struct Leg {
    /// Present when requested with `steps=true`.
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

/// A single step of a leg.
#[derive(Debug, Deserialize)]
pub struct RouteStep {
    /// Step length in metres.
    #[serde(default)]
    pub distance: f64,
    /// Name of the way travelled on.
    #[serde(default)]
    pub name: String,
    pub maneuver: StepManeuver,
}

/// The maneuver that opens a step.
#[derive(Debug, Deserialize)]
pub struct StepManeuver {
    /// Maneuver type such as `"turn"`, `"depart"` or `"arrive"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Direction such as `"left"` or `"slight right"`.
    pub modifier: Option<String>,
    /// Ready-made text, only present on some deployments.
    pub instruction: Option<String>,
}
