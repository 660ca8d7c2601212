//! Endpoint and routing-service settings shared by `plan` and `simulate`.

use geo::Coord;
use lume_core::{Geocoder, resolve_location};
use lume_data::nominatim::DEFAULT_COUNTRY_CODES;
use lume_data::routing::DEFAULT_PROFILE;
use lume_data::{NominatimConfig, NominatimGeocoder, OsrmConfig, OsrmRouteSource};

use crate::{ARG_FROM, ARG_TO, CliError};

/// Raw trip options as they come out of configuration merging.
#[derive(Debug, Clone, Default)]
pub(crate) struct TripFields {
    pub(crate) from: Option<String>,
    pub(crate) to: Option<String>,
    pub(crate) osrm_url: Option<String>,
    pub(crate) profile: Option<String>,
    pub(crate) nominatim_url: Option<String>,
    pub(crate) country_codes: Option<String>,
}

/// Environment variables naming the endpoints of one subcommand.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndpointEnv {
    pub(crate) from: &'static str,
    pub(crate) to: &'static str,
}

/// Resolved trip configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TripConfig {
    /// Start location as typed: a `lat,lon` literal or a place name.
    pub(crate) from: String,
    /// Destination, same format as `from`.
    pub(crate) to: String,
    pub(crate) osrm: OsrmConfig,
    pub(crate) nominatim: NominatimConfig,
}

impl TripConfig {
    pub(crate) fn from_fields(fields: TripFields, env: EndpointEnv) -> Result<Self, CliError> {
        let from = required(fields.from, ARG_FROM, env.from)?;
        let to = required(fields.to, ARG_TO, env.to)?;

        let mut osrm = fields.osrm_url.map(OsrmConfig::new).unwrap_or_default();
        osrm = osrm.with_profile(fields.profile.unwrap_or_else(|| DEFAULT_PROFILE.to_owned()));

        let mut nominatim = fields
            .nominatim_url
            .map(NominatimConfig::new)
            .unwrap_or_default();
        nominatim = nominatim.with_country_codes(
            fields
                .country_codes
                .as_deref()
                .map_or_else(default_country_codes, parse_country_codes),
        );

        Ok(Self {
            from,
            to,
            osrm,
            nominatim,
        })
    }

    pub(crate) fn route_source(&self) -> Result<OsrmRouteSource, CliError> {
        Ok(OsrmRouteSource::with_config(self.osrm.clone())?)
    }

    pub(crate) fn geocoder(&self) -> Result<NominatimGeocoder, CliError> {
        Ok(NominatimGeocoder::with_config(self.nominatim.clone())?)
    }

    /// Resolve both endpoints, geocoding only non-literal input.
    pub(crate) async fn resolve(
        &self,
        geocoder: &dyn Geocoder,
    ) -> Result<(Coord<f64>, Coord<f64>), CliError> {
        let from = resolve_endpoint(geocoder, &self.from, ARG_FROM).await?;
        let to = resolve_endpoint(geocoder, &self.to, ARG_TO).await?;
        Ok((from, to))
    }
}

async fn resolve_endpoint(
    geocoder: &dyn Geocoder,
    input: &str,
    field: &'static str,
) -> Result<Coord<f64>, CliError> {
    resolve_location(geocoder, input)
        .await
        .map_err(|source| CliError::Geocode {
            field,
            input: input.to_owned(),
            source,
        })
}

fn required(
    value: Option<String>,
    field: &'static str,
    env: &'static str,
) -> Result<String, CliError> {
    value
        .filter(|text| !text.trim().is_empty())
        .ok_or(CliError::MissingArgument { field, env })
}

fn default_country_codes() -> Vec<String> {
    DEFAULT_COUNTRY_CODES
        .iter()
        .map(|code| (*code).to_owned())
        .collect()
}

/// Split a comma-separated list such as `"de, AT"`; an empty list searches
/// worldwide.
pub(crate) fn parse_country_codes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}
