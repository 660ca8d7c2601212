use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;
use lume_core::{LookupError, PoiLookup};
use reqwest::Client;
use url::Url;

use super::response::OverpassResponse;
use crate::http::{
    ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, build_client, get_json, parse_base_url,
};

/// Public Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Default search radius around a coordinate, in metres.
pub const DEFAULT_RADIUS_M: u32 = 300;

/// Server-side query timeout announced in the query header.
const QUERY_TIMEOUT_SECS: u64 = 25;

/// Overpass QL asking for one named node or way within `radius_m` metres.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use lume_data::overpass::build_query;
///
/// let query = build_query(Coord { x: 13.405, y: 52.52 }, 300);
/// assert!(query.starts_with("[out:json][timeout:25];"));
/// assert!(query.contains(r#"node(around:300,52.52,13.405)["name"];"#));
/// ```
#[must_use]
pub fn build_query(location: Coord<f64>, radius_m: u32) -> String {
    let around = format!("around:{radius_m},{},{}", location.y, location.x);
    format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];(node({around})[\"name\"];way({around})[\"name\"];);out body 1;"
    )
}

/// Configuration for [`OverpassPoiLookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassConfig {
    /// Interpreter endpoint.
    pub base_url: String,
    /// Search radius in metres.
    pub radius_m: u32,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OVERPASS_URL.to_owned(),
            radius_m: DEFAULT_RADIUS_M,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OverpassConfig {
    /// Create a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the search radius in metres.
    #[must_use]
    pub fn with_radius(mut self, radius_m: u32) -> Self {
        self.radius_m = radius_m;
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

/// Resolves the nearest named place through Overpass.
///
/// Errors are reported to the caller; the POI cache in front of this lookup
/// turns them into "no POI".
#[derive(Debug, Clone)]
pub struct OverpassPoiLookup {
    client: Client,
    base: Url,
    config: OverpassConfig,
}

impl OverpassPoiLookup {
    /// Create a lookup against the public interpreter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_config(OverpassConfig::default())
    }

    /// Create a lookup with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is unusable or the HTTP client fails
    /// to build.
    pub fn with_config(config: OverpassConfig) -> Result<Self, ClientBuildError> {
        let base = parse_base_url(&config.base_url)?;
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn build_url(&self, location: Coord<f64>) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("data", &build_query(location, self.config.radius_m));
        url
    }
}

#[async_trait]
impl PoiLookup for OverpassPoiLookup {
    async fn nearest_name(&self, location: Coord<f64>) -> Result<Option<String>, LookupError> {
        let url = self.build_url(location);
        let response: OverpassResponse = get_json(&self.client, url, self.config.timeout).await?;
        Ok(response.first_name().map(str::to_owned))
    }
}
