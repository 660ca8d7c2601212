//! `plan` command: fetch a route and print what a playback would use.

use std::io::Write;

use clap::Parser;
use geo::Coord;
use lume_core::maneuver::MAJOR_MANEUVER_MIN_DISTANCE;
use lume_core::sampler::KILOMETRE;
use lume_core::{
    Geocoder, Maneuver, PlanError, Route, RouteSource, major_maneuvers, narration_script,
    sample_points,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::trip::{EndpointEnv, TripConfig, TripFields};
use crate::{
    ARG_COUNTRY_CODES, ARG_FROM, ARG_NOMINATIM_URL, ARG_OSRM_URL, ARG_PROFILE, ARG_TO, CliError,
    ENV_PLAN_FROM, ENV_PLAN_TO,
};

/// CLI arguments for the `plan` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Resolve both endpoints, fetch a route from OSRM and print a \
                 JSON summary: total length, the narrated maneuver digest and \
                 the kilometre marks where points of interest are sampled.",
    about = "Plan a route and print its summary"
)]
#[ortho_config(prefix = "LUME")]
pub(crate) struct PlanArgs {
    /// Start location: `lat,lon` or a place name.
    #[arg(long = ARG_FROM, value_name = "location")]
    #[serde(default)]
    pub(crate) from: Option<String>,
    /// Destination: `lat,lon` or a place name.
    #[arg(long = ARG_TO, value_name = "location")]
    #[serde(default)]
    pub(crate) to: Option<String>,
    /// Base URL of the OSRM server.
    #[arg(long = ARG_OSRM_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) osrm_url: Option<String>,
    /// OSRM routing profile.
    #[arg(long = ARG_PROFILE, value_name = "name")]
    #[serde(default)]
    pub(crate) profile: Option<String>,
    /// Nominatim search endpoint.
    #[arg(long = ARG_NOMINATIM_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) nominatim_url: Option<String>,
    /// Comma-separated country codes limiting place-name search.
    #[arg(long = ARG_COUNTRY_CODES, value_name = "codes")]
    #[serde(default)]
    pub(crate) country_codes: Option<String>,
}

impl PlanArgs {
    pub(crate) fn into_config(self) -> Result<PlanConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PlanConfig::try_from(merged)
    }
}

/// Resolved `plan` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlanConfig {
    pub(crate) trip: TripConfig,
}

impl TryFrom<PlanArgs> for PlanConfig {
    type Error = CliError;

    fn try_from(args: PlanArgs) -> Result<Self, Self::Error> {
        let fields = TripFields {
            from: args.from,
            to: args.to,
            osrm_url: args.osrm_url,
            profile: args.profile,
            nominatim_url: args.nominatim_url,
            country_codes: args.country_codes,
        };
        let env = EndpointEnv {
            from: ENV_PLAN_FROM,
            to: ENV_PLAN_TO,
        };
        Ok(Self {
            trip: TripConfig::from_fields(fields, env)?,
        })
    }
}

/// A point in `lat`/`lon` order, as people read them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct LatLon {
    pub(crate) lat: f64,
    pub(crate) lon: f64,
}

impl From<Coord<f64>> for LatLon {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

/// Kilometre mark whose surroundings are searched for a point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct KilometreMark {
    pub(crate) kilometre: u32,
    #[serde(flatten)]
    pub(crate) location: LatLon,
}

/// Output of the `plan` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PlanSummary {
    pub(crate) from: LatLon,
    pub(crate) to: LatLon,
    pub(crate) total_length_m: f64,
    pub(crate) waypoints: usize,
    pub(crate) maneuvers: Vec<Maneuver>,
    pub(crate) narration: String,
    pub(crate) kilometres: Vec<KilometreMark>,
}

pub(super) fn run_plan(args: PlanArgs, runtime: &Runtime) -> Result<(), CliError> {
    let config = args.into_config()?;
    let source = config.trip.route_source()?;
    let geocoder = config.trip.geocoder()?;
    let summary = runtime.block_on(execute_plan(&config, &source, &geocoder))?;
    let mut stdout = std::io::stdout().lock();
    write_summary(&mut stdout, &summary)
}

pub(super) async fn execute_plan(
    config: &PlanConfig,
    source: &dyn RouteSource,
    geocoder: &dyn Geocoder,
) -> Result<PlanSummary, CliError> {
    let (from, to) = config.trip.resolve(geocoder).await?;
    let plan = source
        .fetch_route(from, to)
        .await
        .map_err(PlanError::Source)?;
    let waypoints = plan.waypoints.len();
    let route = Route::new(plan.waypoints).map_err(PlanError::InvalidRoute)?;
    let major = major_maneuvers(&plan.maneuvers, MAJOR_MANEUVER_MIN_DISTANCE);
    let narration = narration_script(&major);
    let kilometres = sample_points(&route, KILOMETRE)
        .into_iter()
        .map(|sample| KilometreMark {
            kilometre: sample.kilometre,
            location: sample.location.into(),
        })
        .collect();

    Ok(PlanSummary {
        from: from.into(),
        to: to.into(),
        total_length_m: route.total_length(),
        waypoints,
        maneuvers: major,
        narration,
        kilometres,
    })
}

pub(super) fn write_summary(writer: &mut dyn Write, summary: &PlanSummary) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, summary).map_err(CliError::Serialize)?;
    writeln!(writer).map_err(CliError::Output)
}
