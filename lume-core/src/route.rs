//! Route polylines with precomputed segment distances.
//!
//! A [`Route`] is built once per plan and never mutated afterwards. Segment
//! lengths are great-circle distances between consecutive waypoints, while
//! positions inside a segment are planar interpolations of latitude and
//! longitude. The interpolation is a deliberate approximation that holds for
//! the short segments produced by routing services.

use geo::Coord;
use thiserror::Error;

/// Mean Earth radius in metres, matching common web-map distance helpers.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors returned by [`Route::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Fewer than two waypoints were supplied.
    #[error("route needs at least two waypoints, got {waypoints}")]
    InvalidRoute {
        /// Number of waypoints that were supplied.
        waypoints: usize,
    },
}

/// Great-circle distance between two WGS84 coordinates in metres.
///
/// Coordinates use `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use lume_core::route::haversine_m;
///
/// let here = Coord { x: 13.4, y: 52.5 };
/// assert_eq!(haversine_m(here, here), 0.0);
/// ```
#[must_use]
pub fn haversine_m(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let lat1 = from.y.to_radians();
    let lat2 = to.y.to_radians();
    let delta_lat = (to.y - from.y).to_radians();
    let delta_lon = (to.x - from.x).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Planar interpolation between two coordinates.
///
/// Written as `a * (1 - t) + b * t` so both endpoints are reproduced exactly.
fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    let keep = 1.0 - t;
    Coord {
        x: a.x * keep + b.x * t,
        y: a.y * keep + b.y * t,
    }
}

/// Clamp a segment fraction into `[0, 1]`; NaN collapses to the start.
fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// An ordered polyline with per-segment and cumulative distances.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use lume_core::Route;
///
/// # fn main() -> Result<(), lume_core::RouteError> {
/// let route = Route::new(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.01, y: 0.0 }])?;
/// assert_eq!(route.segment_count(), 1);
/// assert!(route.total_length() > 1_000.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    waypoints: Vec<Coord<f64>>,
    segment_lengths: Vec<f64>,
    /// Distance travelled at the start of each segment, plus the total.
    cumulative: Vec<f64>,
}

impl Route {
    /// Validates the waypoints and precomputes distances.
    ///
    /// # Errors
    /// Returns [`RouteError::InvalidRoute`] when fewer than two waypoints are
    /// supplied.
    pub fn new(waypoints: Vec<Coord<f64>>) -> Result<Self, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::InvalidRoute {
                waypoints: waypoints.len(),
            });
        }

        let segment_lengths: Vec<f64> = waypoints
            .windows(2)
            .map(|pair| match pair {
                [a, b] => haversine_m(*a, *b),
                _ => 0.0,
            })
            .collect();

        let mut cumulative = Vec::with_capacity(segment_lengths.len() + 1);
        let mut running = 0.0;
        cumulative.push(running);
        for length in &segment_lengths {
            running += length;
            cumulative.push(running);
        }

        Ok(Self {
            waypoints,
            segment_lengths,
            cumulative,
        })
    }

    /// Waypoints in travel order.
    #[must_use]
    pub fn waypoints(&self) -> &[Coord<f64>] {
        &self.waypoints
    }

    /// First waypoint of the route.
    #[must_use]
    pub fn start(&self) -> Coord<f64> {
        self.waypoints.first().copied().unwrap_or_default()
    }

    /// Last waypoint of the route.
    #[must_use]
    pub fn end(&self) -> Coord<f64> {
        self.waypoints.last().copied().unwrap_or_default()
    }

    /// Number of segments, always one less than the number of waypoints.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segment_lengths.len()
    }

    /// Length of a single segment, or `None` when out of range.
    #[must_use]
    pub fn segment_length(&self, segment: usize) -> Option<f64> {
        self.segment_lengths.get(segment).copied()
    }

    /// Lengths of all segments in travel order.
    #[must_use]
    pub fn segment_lengths(&self) -> &[f64] {
        &self.segment_lengths
    }

    /// Sum of all segment lengths.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Cumulative distance travelled at `fraction` of `segment`.
    ///
    /// `fraction` is clamped into `[0, 1]`. Returns `None` when `segment` is
    /// not a valid segment index.
    #[must_use]
    pub fn distance_at(&self, segment: usize, fraction: f64) -> Option<f64> {
        let before = self.cumulative.get(segment)?;
        let length = self.segment_lengths.get(segment)?;
        Some(before + length * clamp_fraction(fraction))
    }

    /// Position at `fraction` of `segment`, linearly interpolated.
    ///
    /// `point_at(i, 0.0)` and `point_at(i, 1.0)` return the segment's
    /// endpoints exactly. Returns `None` when `segment` is out of range.
    #[must_use]
    pub fn point_at(&self, segment: usize, fraction: f64) -> Option<Coord<f64>> {
        let from = self.waypoints.get(segment)?;
        let to = self.waypoints.get(segment + 1)?;
        Some(lerp(*from, *to, clamp_fraction(fraction)))
    }
}
