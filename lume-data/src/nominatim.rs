//! Free-text geocoding through Nominatim.
//!
//! [`NominatimGeocoder`] implements [`lume_core::Geocoder`] with a single
//! search request limited to one result. Pair it with
//! [`lume_core::resolve_location`] so literal `lat,lon` input never leaves
//! the process.

use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;
use log::debug;
use lume_core::{Geocoder, LookupError};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{
    ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, build_client, get_json, parse_base_url,
};

/// Public Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Countries searched when none are configured.
pub const DEFAULT_COUNTRY_CODES: &[&str] = &["de"];

/// One search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl Place {
    fn coordinate(&self) -> Result<Coord<f64>, LookupError> {
        let parse = |value: &str, axis: &str| {
            value.trim().parse::<f64>().map_err(|err| LookupError::Parse {
                message: format!("invalid {axis} {value:?} from Nominatim: {err}"),
            })
        };
        Ok(Coord {
            x: parse(&self.lon, "longitude")?,
            y: parse(&self.lat, "latitude")?,
        })
    }
}

/// Configuration for [`NominatimGeocoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominatimConfig {
    /// Search endpoint.
    pub base_url: String,
    /// ISO 3166-1 alpha-2 codes restricting the search; empty searches
    /// worldwide.
    pub country_codes: Vec<String>,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string; Nominatim's usage policy requires a meaningful one.
    pub user_agent: String,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_owned(),
            country_codes: DEFAULT_COUNTRY_CODES
                .iter()
                .map(|code| (*code).to_owned())
                .collect(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl NominatimConfig {
    /// Create a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Restrict the search to these countries; empty searches worldwide.
    #[must_use]
    pub fn with_country_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.country_codes = codes.into_iter().map(Into::into).collect();
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

/// Geocoder backed by a Nominatim search endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base: Url,
    config: NominatimConfig,
}

impl NominatimGeocoder {
    /// Create a geocoder against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_config(NominatimConfig::default())
    }

    /// Create a geocoder with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is unusable or the HTTP client fails
    /// to build.
    pub fn with_config(config: NominatimConfig) -> Result<Self, ClientBuildError> {
        let base = parse_base_url(&config.base_url)?;
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn build_search_url(&self, query: &str) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("format", "json")
                .append_pair("addressdetails", "1")
                .append_pair("limit", "1");
            if !self.config.country_codes.is_empty() {
                pairs.append_pair("countrycodes", &self.config.country_codes.join(","));
            }
            pairs.append_pair("q", query);
        }
        url
    }

    fn first_hit(query: &str, places: &[Place]) -> Result<Coord<f64>, LookupError> {
        let place = places.first().ok_or_else(|| LookupError::NotFound {
            query: query.to_owned(),
        })?;
        debug!("geocoded {query:?} to {}", place.display_name);
        place.coordinate()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coord<f64>, LookupError> {
        let url = self.build_search_url(query);
        let places: Vec<Place> = get_json(&self.client, url, self.config.timeout).await?;
        Self::first_hit(query, &places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn geocoder() -> NominatimGeocoder {
        NominatimGeocoder::with_config(NominatimConfig::new("http://nominatim.example.com/search"))
            .expect("geocoder should build")
    }

    #[rstest]
    fn search_url_restricts_country_and_limit(geocoder: NominatimGeocoder) {
        let url = geocoder.build_search_url("Brandenburger Tor, Berlin");

        assert_eq!(
            url.as_str(),
            "http://nominatim.example.com/search?format=json&addressdetails=1&limit=1&countrycodes=de&q=Brandenburger+Tor%2C+Berlin"
        );
    }

    #[rstest]
    fn worldwide_search_omits_country_codes() {
        let config = NominatimConfig::new("http://nominatim.example.com/search")
            .with_country_codes(Vec::<String>::new());
        let geocoder = NominatimGeocoder::with_config(config).expect("geocoder should build");

        let url = geocoder.build_search_url("Paris");

        assert!(url.query_pairs().all(|(key, _)| key != "countrycodes"));
    }

    #[rstest]
    fn first_hit_parses_string_coordinates() {
        let places: Vec<Place> = serde_json::from_str(
            r#"[{"lat": "52.5162746", "lon": "13.3777041", "display_name": "Brandenburger Tor"}]"#,
        )
        .expect("should deserialise");

        let coord = NominatimGeocoder::first_hit("Brandenburger Tor", &places).expect("one hit");

        assert_eq!(coord, Coord { x: 13.377_704_1, y: 52.516_274_6 });
    }

    #[rstest]
    fn no_hits_are_not_found() {
        let err = NominatimGeocoder::first_hit("Atlantis", &[]).expect_err("nothing found");

        assert_eq!(
            err,
            LookupError::NotFound {
                query: "Atlantis".to_owned()
            }
        );
    }

    #[rstest]
    fn malformed_coordinates_are_parse_errors() {
        let places = vec![Place {
            lat: "north".to_owned(),
            lon: "13.4".to_owned(),
            display_name: String::new(),
        }];

        let err = NominatimGeocoder::first_hit("Somewhere", &places).expect_err("bad latitude");

        assert!(matches!(err, LookupError::Parse { .. }));
    }
}
