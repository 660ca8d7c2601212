//! [`RouteSource`] backed by OSRM's Route API.
//!
//! # Example
//!
//! ```no_run
//! use geo::Coord;
//! use lume_core::RouteSource;
//! use lume_data::routing::{OsrmConfig, OsrmRouteSource};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = OsrmRouteSource::with_config(OsrmConfig::new("http://localhost:5000"))?;
//! let plan = source
//!     .fetch_route(Coord { x: 13.40, y: 52.52 }, Coord { x: 13.45, y: 52.50 })
//!     .await?;
//! println!("{} waypoints", plan.waypoints.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;
use log::debug;
use lume_core::{LookupError, Maneuver, RoutePlan, RouteSource};
use reqwest::Client;
use url::Url;

use super::osrm::{RouteResponse, RouteStep};
use crate::http::{
    ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, build_client, get_json, parse_base_url,
};

/// Public demo server of the OSRM project.
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Default routing profile.
pub const DEFAULT_PROFILE: &str = "cycling";

/// Configuration for [`OsrmRouteSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsrmConfig {
    /// Base URL for the OSRM service (e.g., `"http://localhost:5000"`).
    pub base_url: String,
    /// Routing profile such as `"cycling"`, `"driving"` or `"walking"`.
    pub profile: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_URL.to_owned(),
            profile: DEFAULT_PROFILE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OsrmConfig {
    /// Create a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the routing profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetches cycling (or other profile) routes from OSRM.
///
/// The first route of the response becomes the [`RoutePlan`]: its GeoJSON
/// geometry provides the waypoints and the steps of its first leg provide
/// the maneuvers.
#[derive(Debug, Clone)]
pub struct OsrmRouteSource {
    client: Client,
    base: Url,
    config: OsrmConfig,
}

impl OsrmRouteSource {
    /// Create a source for the given base URL with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is unusable or the HTTP client fails
    /// to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientBuildError> {
        Self::with_config(OsrmConfig::new(base_url))
    }

    /// Create a source with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is unusable or the HTTP client fails
    /// to build.
    pub fn with_config(config: OsrmConfig) -> Result<Self, ClientBuildError> {
        let base = parse_base_url(&config.base_url)?;
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Build the Route API URL.
    ///
    /// The URL format is:
    /// `{base_url}/route/v1/{profile}/{lon},{lat};{lon},{lat}?overview=full&geometries=geojson&steps=true`.
    fn build_route_url(&self, from: Coord<f64>, to: Coord<f64>) -> Url {
        let coordinates = format!("{},{};{},{}", from.x, from.y, to.x, to.y);
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["route", "v1", self.config.profile.as_str(), coordinates.as_str()]);
        }
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson")
            .append_pair("steps", "true");
        url
    }

    /// Convert an OSRM response into a route plan.
    fn convert_response(response: RouteResponse) -> Result<RoutePlan, LookupError> {
        if !response.is_ok() {
            return Err(LookupError::Service {
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::Parse {
                message: "OSRM response contains no routes".to_owned(),
            })?;

        let waypoints = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| Coord { x: lon, y: lat })
            .collect();
        let maneuvers = route
            .legs
            .into_iter()
            .next()
            .map(|leg| {
                leg.steps
                    .iter()
                    .map(|step| Maneuver::new(instruction_text(step), step.distance))
                    .collect()
            })
            .unwrap_or_default();

        Ok(RoutePlan {
            waypoints,
            maneuvers,
        })
    }
}

/// Text for a step: the service's own instruction when present, otherwise
/// one built from the maneuver type, modifier and street name.
fn instruction_text(step: &RouteStep) -> String {
    if let Some(text) = step
        .maneuver
        .instruction
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    {
        return text.to_owned();
    }

    let kind = step.maneuver.kind.as_str();
    let mut text = match kind {
        "depart" => "Depart".to_owned(),
        "arrive" => "Arrive".to_owned(),
        "new name" | "continue" => "Continue".to_owned(),
        "" => "Proceed".to_owned(),
        other => capitalise(other),
    };
    if !matches!(kind, "depart" | "arrive")
        && let Some(modifier) = step.maneuver.modifier.as_deref()
    {
        text.push(' ');
        text.push_str(modifier);
    }
    if !step.name.is_empty() {
        text.push_str(if kind == "arrive" { " at " } else { " onto " });
        text.push_str(&step.name);
    }
    text
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[async_trait]
impl RouteSource for OsrmRouteSource {
    async fn fetch_route(
        &self,
        from: Coord<f64>,
        to: Coord<f64>,
    ) -> Result<RoutePlan, LookupError> {
        let url = self.build_route_url(from, to);
        let response: RouteResponse = get_json(&self.client, url, self.config.timeout).await?;
        let plan = Self::convert_response(response)?;
        debug!(
            "OSRM returned {} waypoints and {} steps",
            plan.waypoints.len(),
            plan.maneuvers.len()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::osrm::{Geometry, Leg, RouteObject, StepManeuver};
    use rstest::{fixture, rstest};

    const FROM: Coord<f64> = Coord { x: 13.4, y: 52.5 };
    const TO: Coord<f64> = Coord { x: 13.5, y: 52.6 };

    #[fixture]
    fn source() -> OsrmRouteSource {
        OsrmRouteSource::new("http://osrm.example.com").expect("source should build")
    }

    fn step(kind: &str, modifier: Option<&str>, name: &str, distance: f64) -> RouteStep {
        RouteStep {
            distance,
            name: name.to_owned(),
            maneuver: StepManeuver {
                kind: kind.to_owned(),
                modifier: modifier.map(str::to_owned),
                instruction: None,
            },
        }
    }

    #[rstest]
    fn build_route_url_formats_coordinates(source: OsrmRouteSource) {
        let url = source.build_route_url(FROM, TO);

        assert_eq!(
            url.as_str(),
            "http://osrm.example.com/route/v1/cycling/13.4,52.5;13.5,52.6?overview=full&geometries=geojson&steps=true"
        );
    }

    #[rstest]
    #[case("http://osrm.example.com/", "http://osrm.example.com/route/v1/driving/")]
    #[case("http://example.com/osrm/", "http://example.com/osrm/route/v1/driving/")]
    fn build_route_url_respects_base_paths(#[case] base: &str, #[case] prefix: &str) {
        let source = OsrmRouteSource::with_config(OsrmConfig::new(base).with_profile("driving"))
            .expect("source should build");

        let url = source.build_route_url(FROM, TO);

        assert!(url.as_str().starts_with(prefix), "got {url}");
    }

    #[rstest]
    fn convert_response_builds_a_plan() {
        let response = RouteResponse {
            code: "Ok".to_owned(),
            message: None,
            routes: vec![RouteObject {
                geometry: Geometry {
                    coordinates: vec![[13.4, 52.5], [13.45, 52.55], [13.5, 52.6]],
                },
                legs: vec![Leg {
                    steps: vec![
                        step("depart", Some("right"), "Karl-Marx-Allee", 15_000.0),
                        step("turn", Some("left"), "B1", 20_000.0),
                        step("arrive", None, "", 0.0),
                    ],
                }],
            }],
        };

        let plan = OsrmRouteSource::convert_response(response).expect("should convert");

        assert_eq!(plan.waypoints[1], Coord { x: 13.45, y: 52.55 });
        let texts: Vec<&str> = plan.maneuvers.iter().map(|m| m.instruction.as_str()).collect();
        assert_eq!(texts, vec!["Depart onto Karl-Marx-Allee", "Turn left onto B1", "Arrive"]);
        assert_eq!(plan.maneuvers[1].distance, 20_000.0);
    }

    #[rstest]
    fn convert_response_reports_service_errors() {
        let response = RouteResponse {
            code: "NoRoute".to_owned(),
            message: Some("Impossible route".to_owned()),
            routes: Vec::new(),
        };

        let err = OsrmRouteSource::convert_response(response).expect_err("should fail");

        assert_eq!(
            err,
            LookupError::Service {
                code: "NoRoute".to_owned(),
                message: "Impossible route".to_owned(),
            }
        );
    }

    #[rstest]
    fn convert_response_requires_a_route() {
        let response = RouteResponse {
            code: "Ok".to_owned(),
            message: None,
            routes: Vec::new(),
        };

        let err = OsrmRouteSource::convert_response(response).expect_err("should fail");

        assert!(matches!(err, LookupError::Parse { .. }));
    }

    #[rstest]
    #[case(
        step("new name", Some("straight"), "Hauptstraße", 1.0),
        "Continue straight onto Hauptstraße"
    )]
    #[case(step("roundabout", Some("right"), "", 1.0), "Roundabout right")]
    #[case(step("arrive", Some("left"), "Alexanderplatz", 1.0), "Arrive at Alexanderplatz")]
    fn synthesises_missing_instructions(#[case] step: RouteStep, #[case] expected: &str) {
        assert_eq!(instruction_text(&step), expected);
    }

    #[rstest]
    fn prefers_service_instructions() {
        let mut step = step("turn", Some("left"), "B1", 1.0);
        step.maneuver.instruction = Some("Turn left onto B1 towards Berlin".to_owned());

        assert_eq!(instruction_text(&step), "Turn left onto B1 towards Berlin");
    }

    #[rstest]
    fn config_builder_pattern() {
        let config = OsrmConfig::new("http://example.com")
            .with_profile("walking")
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("test-agent/1.0");

        assert_eq!(config.base_url, "http://example.com");
        assert_eq!(config.profile, "walking");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "test-agent/1.0");
    }
}
