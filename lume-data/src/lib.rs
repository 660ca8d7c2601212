//! HTTP collaborators for the Lume playback engine.
//!
//! Responsibilities:
//! - Implement the `lume-core` service traits against public web APIs.
//! - Translate transport and payload failures into [`lume_core::LookupError`].
//!
//! Boundaries:
//! - Do not encode playback rules (live in `lume-core`).
//! - Never retry; callers decide how failures degrade.
//!
//! Invariants:
//! - Every request carries a user agent and a bounded timeout.
//! - No global mutable state.

pub mod nominatim;
pub mod overpass;
pub mod routing;
pub mod wikipedia;

mod http;

pub use http::{ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use nominatim::{NominatimConfig, NominatimGeocoder};
pub use overpass::{OverpassConfig, OverpassPoiLookup};
pub use routing::{OsrmConfig, OsrmRouteSource};
pub use wikipedia::{WikipediaConfig, WikipediaDescriber};
