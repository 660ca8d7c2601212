//! Facade crate for the Lume route playback engine.
//!
//! This crate re-exports the playback core and, behind the `http` feature,
//! the OSRM, Overpass, Nominatim and Wikipedia collaborators.

#![forbid(unsafe_code)]

pub use lume_core::{
    Command, CommandError, ConfigError, CoordKey, EventSink, Geocoder, LookupError, Maneuver,
    Narrator, PlaceDescriber, PlaceDescription, PlanError, PlaybackConfig, PlaybackController,
    PlaybackEvent, PlaybackState, PoiCache, PoiLookup, PoiSample, PoiSampler, Progress,
    RecentPois, Route, RouteError, RoutePlan, RouteSource, Telemetry, UpcomingPoiTable,
    major_maneuvers, narration_script, parse_coordinate, resolve_location, sample_points,
};

#[cfg(feature = "http")]
pub use lume_data::{
    ClientBuildError, NominatimConfig, NominatimGeocoder, OsrmConfig, OsrmRouteSource,
    OverpassConfig, OverpassPoiLookup, WikipediaConfig, WikipediaDescriber,
};

#[cfg(feature = "test-support")]
pub use lume_core::test_support;
