//! Interfaces to the external services the engine consumes.
//!
//! The engine never talks to the network itself. Hosts plug in
//! implementations of [`PoiLookup`], [`RouteSource`], [`Geocoder`] and
//! [`PlaceDescriber`]; `lume-data` ships HTTP-backed ones.

use async_trait::async_trait;
use geo::Coord;
use thiserror::Error;

use crate::maneuver::Maneuver;

/// Failures reported by external collaborators.
///
/// POI lookups degrade these to "no POI"; route and geocoding failures are
/// surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The request did not finish within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    /// The service answered with an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network { url: String, message: String },
    /// The response body could not be decoded.
    #[error("failed to parse response: {message}")]
    Parse { message: String },
    /// The service reported an application-level error.
    #[error("service error {code}: {message}")]
    Service { code: String, message: String },
    /// The service found nothing for the query.
    #[error("no result for {query:?}")]
    NotFound { query: String },
}

/// A route as delivered by a [`RouteSource`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePlan {
    /// Polyline in travel order (`x = longitude`, `y = latitude`).
    pub waypoints: Vec<Coord<f64>>,
    /// Turn-by-turn steps as reported by the service.
    pub maneuvers: Vec<Maneuver>,
}

/// Resolves the name of the nearest named place around a coordinate.
#[async_trait]
pub trait PoiLookup: Send + Sync {
    /// Return the nearest name, `Ok(None)` when nothing is named nearby.
    async fn nearest_name(&self, location: Coord<f64>) -> Result<Option<String>, LookupError>;
}

/// Fetches a route between two locations.
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Return the waypoints and maneuvers from `from` to `to`.
    async fn fetch_route(
        &self,
        from: Coord<f64>,
        to: Coord<f64>,
    ) -> Result<RoutePlan, LookupError>;
}

/// Turns free-text place names into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve `query` to a single coordinate.
    async fn geocode(&self, query: &str) -> Result<Coord<f64>, LookupError>;
}

/// A short encyclopaedic summary of a named place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaceDescription {
    /// Plain-text summary, ready to be read out.
    pub summary: String,
    /// Language code of the summary, e.g. `"de"`.
    pub language: String,
}

/// Looks up a description for an announced place.
#[async_trait]
pub trait PlaceDescriber: Send + Sync {
    /// Describe the place called `name`.
    async fn describe(&self, name: &str) -> Result<PlaceDescription, LookupError>;
}

/// Parse a literal `lat,lon` pair such as `52.52,13.405`.
///
/// Both parts must be decimal numbers with a fractional part and an optional
/// leading minus sign, without surrounding whitespace.
///
/// # Examples
/// ```
/// use lume_core::parse_coordinate;
///
/// let coord = parse_coordinate("52.5,-13.25").expect("literal coordinate");
/// assert_eq!((coord.y, coord.x), (52.5, -13.25));
/// assert!(parse_coordinate("Berlin").is_none());
/// ```
#[must_use]
pub fn parse_coordinate(text: &str) -> Option<Coord<f64>> {
    let (lat, lon) = text.split_once(',')?;
    if !is_decimal(lat) || !is_decimal(lon) {
        return None;
    }
    Some(Coord {
        x: lon.parse().ok()?,
        y: lat.parse().ok()?,
    })
}

fn is_decimal(part: &str) -> bool {
    let digits = part.strip_prefix('-').unwrap_or(part);
    let Some((whole, fraction)) = digits.split_once('.') else {
        return false;
    };
    !whole.is_empty()
        && !fraction.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve user input to a coordinate, geocoding only when it is not a
/// literal `lat,lon` pair.
///
/// # Errors
/// Propagates the geocoder's [`LookupError`].
pub async fn resolve_location(
    geocoder: &dyn Geocoder,
    input: &str,
) -> Result<Coord<f64>, LookupError> {
    let trimmed = input.trim();
    match parse_coordinate(trimmed) {
        Some(coord) => Ok(coord),
        None => geocoder.geocode(trimmed).await,
    }
}
