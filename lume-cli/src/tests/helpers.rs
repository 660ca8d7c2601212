//! Test doubles for the CLI command pipelines.

use async_trait::async_trait;
use geo::Coord;
use lume_core::{Geocoder, LookupError, Maneuver, RoutePlan};
use lume_core::test_support::equator_waypoints;

/// Geocoder that knows a single place name.
#[derive(Debug)]
pub(super) struct FixedGeocoder {
    pub(super) name: &'static str,
    pub(super) location: Coord<f64>,
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coord<f64>, LookupError> {
        if query == self.name {
            Ok(self.location)
        } else {
            Err(LookupError::NotFound {
                query: query.to_owned(),
            })
        }
    }
}

pub(super) fn alexanderplatz() -> FixedGeocoder {
    FixedGeocoder {
        name: "Alexanderplatz",
        location: Coord { x: 13.4132, y: 52.5219 },
    }
}

/// A 2.5 km plan along the equator with one narrated turn.
pub(super) fn equator_plan() -> RoutePlan {
    RoutePlan {
        waypoints: equator_waypoints(&[1_200.0, 1_300.0]),
        maneuvers: vec![
            Maneuver::new("Head east", 12_000.0),
            Maneuver::new("Continue", 20_000.0),
            Maneuver::new("Turn left", 300.0),
        ],
    }
}

/// Parse JSON lines into values, one per event.
pub(super) fn json_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(bytes.to_vec())
        .expect("output should be UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect()
}

pub(super) fn event_names(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| event.get("event").and_then(serde_json::Value::as_str))
        .map(str::to_owned)
        .collect()
}
