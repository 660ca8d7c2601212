//! Route acquisition from an OSRM routing service.
//!
//! [`OsrmRouteSource`] implements [`lume_core::RouteSource`] on top of the
//! OSRM Route API. It requests the full GeoJSON geometry with steps, turns
//! the geometry into waypoints and the steps of the first leg into
//! maneuvers. Steps without instruction text get one composed from their
//! maneuver type, modifier and street name.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use lume_data::routing::{OsrmConfig, OsrmRouteSource};
//!
//! let config = OsrmConfig::new("http://localhost:5000")
//!     .with_profile("driving")
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("my-app/1.0");
//! let source = OsrmRouteSource::with_config(config)?;
//! # Ok::<(), lume_data::ClientBuildError>(())
//! ```

mod osrm;
mod provider;

pub use provider::{DEFAULT_OSRM_URL, DEFAULT_PROFILE, OsrmConfig, OsrmRouteSource};
