//! Core playback engine for Lume.
//!
//! A [`Route`] is a validated polyline. The [`PoiSampler`] walks it in
//! kilometre steps and resolves nearby place names through a memoising
//! [`PoiCache`]. The [`PlaybackController`] then moves an agent along the
//! route frame by frame and announces whatever the sampler found. Network
//! access stays behind the [`PoiLookup`], [`RouteSource`] and [`Geocoder`]
//! traits so hosts and tests can plug in their own collaborators.

#![forbid(unsafe_code)]

pub mod maneuver;
pub mod playback;
pub mod poi_cache;
pub mod route;
pub mod sampler;
pub mod services;
pub mod test_support;

pub use maneuver::{Maneuver, major_maneuvers, narration_script};
pub use playback::{
    Command, CommandError, ConfigError, EventSink, Narrator, PlanError, PlaybackConfig,
    PlaybackController, PlaybackEvent, PlaybackState, Progress, ProgressError, RecentPois, Step,
    Telemetry,
};
pub use poi_cache::{CoordKey, PoiCache};
pub use route::{Route, RouteError};
pub use sampler::{
    PoiSample, PoiSampler, Resolution, ResolutionOrigin, UpcomingPoiTable, sample_points,
};
pub use services::{
    Geocoder, LookupError, PlaceDescriber, PlaceDescription, PoiLookup, RoutePlan, RouteSource,
    parse_coordinate, resolve_location,
};
