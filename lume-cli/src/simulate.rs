//! `simulate` command: drive a playback in real time and stream its events.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;
use lume_core::{
    Geocoder, PlaceDescriber, PlaybackConfig, PlaybackController, PlaybackState, PoiLookup,
    RouteSource,
};
use lume_data::{OverpassConfig, OverpassPoiLookup, WikipediaConfig, WikipediaDescriber};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::time::{Instant, MissedTickBehavior};

use crate::sink::{JsonLinesSink, LogNarrator};
use crate::trip::{EndpointEnv, TripConfig, TripFields};
use crate::{
    ARG_COUNTRY_CODES, ARG_FROM, ARG_NOMINATIM_URL, ARG_OSRM_URL, ARG_PROFILE, ARG_TO, CliError,
    ENV_SIMULATE_FROM, ENV_SIMULATE_TO,
};

/// Default spacing of playback frames.
pub(crate) const DEFAULT_FRAME_MS: u64 = 100;

/// CLI arguments for the `simulate` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Plan a route, then move an agent along it in real time. \
                 Every playback event is printed to stdout as one JSON \
                 object per line until the agent arrives. Ctrl-C stops \
                 the playback early.",
    about = "Play a route back and stream its events"
)]
#[ortho_config(prefix = "LUME")]
pub(crate) struct SimulateArgs {
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
    /// Overpass interpreter endpoint.
    #[arg(long = "overpass-url", value_name = "url")]
    #[serde(default)]
    pub(crate) overpass_url: Option<String>,
    /// Search radius around each kilometre mark, in metres.
    #[arg(long = "radius", value_name = "metres")]
    #[serde(default)]
    pub(crate) radius_m: Option<u32>,
    /// Travel speed in metres per second.
    #[arg(long = "speed", value_name = "m/s")]
    #[serde(default)]
    pub(crate) speed: Option<f64>,
    /// Milliseconds between two frames.
    #[arg(long = "frame-ms", value_name = "ms")]
    #[serde(default)]
    pub(crate) frame_ms: Option<u64>,
    /// Countdown before the agent starts moving, in milliseconds.
    #[arg(long = "warm-up-ms", value_name = "ms")]
    #[serde(default)]
    pub(crate) warm_up_ms: Option<u64>,
    /// Minimum spacing of telemetry events, in milliseconds.
    #[arg(long = "telemetry-ms", value_name = "ms")]
    #[serde(default)]
    pub(crate) telemetry_ms: Option<u64>,
    /// Narrate a Wikipedia summary of every announced place.
    #[arg(
        long = "describe",
        value_name = "bool",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    #[serde(default)]
    pub(crate) describe: Option<bool>,
    /// Wikipedia language asked first when describing places.
    #[arg(long = "language", value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
}

impl SimulateArgs {
    pub(crate) fn into_config(self) -> Result<SimulateConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SimulateConfig::try_from(merged)
    }
}

/// Resolved `simulate` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SimulateConfig {
    pub(crate) trip: TripConfig,
    pub(crate) overpass: OverpassConfig,
    pub(crate) playback: PlaybackConfig,
    pub(crate) frame: Duration,
    pub(crate) describe: Option<WikipediaConfig>,
}

impl TryFrom<SimulateArgs> for SimulateConfig {
    type Error = CliError;

    fn try_from(args: SimulateArgs) -> Result<Self, Self::Error> {
        let fields = TripFields {
            from: args.from,
            to: args.to,
            osrm_url: args.osrm_url,
            profile: args.profile,
            nominatim_url: args.nominatim_url,
            country_codes: args.country_codes,
        };
        let env = EndpointEnv {
            from: ENV_SIMULATE_FROM,
            to: ENV_SIMULATE_TO,
        };
        let trip = TripConfig::from_fields(fields, env)?;

        let mut overpass = args
            .overpass_url
            .map(OverpassConfig::new)
            .unwrap_or_default();
        if let Some(radius) = args.radius_m {
            overpass = overpass.with_radius(radius);
        }

        let frame_ms = args.frame_ms.unwrap_or(DEFAULT_FRAME_MS);
        if frame_ms == 0 {
            return Err(CliError::FrameInterval);
        }

        let mut playback = PlaybackConfig::default();
        if let Some(speed) = args.speed {
            playback = playback.with_speed(speed);
        }
        if let Some(ms) = args.warm_up_ms {
            playback = playback.with_warm_up(Duration::from_millis(ms));
        }
        if let Some(ms) = args.telemetry_ms {
            playback = playback.with_telemetry_interval(Duration::from_millis(ms));
        }
        playback.validate()?;

        let describe = args.describe.unwrap_or(false).then(|| {
            let config = WikipediaConfig::default();
            match args.language {
                Some(language) => config.with_language(language),
                None => config,
            }
        });

        Ok(Self {
            trip,
            overpass,
            playback,
            frame: Duration::from_millis(frame_ms),
            describe,
        })
    }
}

pub(super) fn run_simulate(args: SimulateArgs, runtime: &Runtime) -> Result<(), CliError> {
    let config = args.into_config()?;
    let source = config.trip.route_source()?;
    let geocoder = config.trip.geocoder()?;
    let lookup = Arc::new(OverpassPoiLookup::with_config(config.overpass.clone())?);
    let describer = match config.describe.clone() {
        Some(wikipedia) => {
            Some(Arc::new(WikipediaDescriber::with_config(wikipedia)?) as Arc<dyn PlaceDescriber>)
        }
        None => None,
    };
    let mut stdout = std::io::stdout().lock();
    let state = runtime.block_on(execute_simulation(
        &config,
        &source,
        &geocoder,
        lookup,
        describer,
        &mut stdout,
        async { tokio::signal::ctrl_c().await.map_err(CliError::Runtime) },
    ))?;
    info!("simulation finished in state {state:?}");
    Ok(())
}

/// Plan, start and tick a playback until it arrives or `shutdown` resolves.
///
/// After arrival, ticking goes on while announcements or descriptions are
/// pending, for at most twice the lookup timeout. Returns the state the
/// controller ended in.
pub(super) async fn execute_simulation<F>(
    config: &SimulateConfig,
    source: &dyn RouteSource,
    geocoder: &dyn Geocoder,
    lookup: Arc<dyn PoiLookup>,
    describer: Option<Arc<dyn PlaceDescriber>>,
    writer: &mut dyn Write,
    shutdown: F,
) -> Result<PlaybackState, CliError>
where
    F: Future<Output = Result<(), CliError>>,
{
    let (from, to) = config.trip.resolve(geocoder).await?;
    let mut controller = PlaybackController::with_lookup(
        config.playback.clone(),
        lookup,
        JsonLinesSink::new(writer),
        LogNarrator,
    )?;
    if let Some(describer) = describer {
        controller = controller.with_describer(describer);
    }
    controller.plan_from_source(source, from, to).await?;
    controller.narrate_directions();
    controller.start()?;

    let origin = Instant::now();
    // A late announcement can start one more description.
    let grace = config.playback.lookup_timeout * 2;
    let mut arrived_at: Option<Instant> = None;
    let mut frames = tokio::time::interval(config.frame);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                controller.tick(origin.elapsed());
                if controller.state() == PlaybackState::Arrived {
                    let since = *arrived_at.get_or_insert_with(Instant::now);
                    if !controller.has_pending_work() || since.elapsed() >= grace {
                        break;
                    }
                }
            }
            result = &mut shutdown => {
                result?;
                info!("interrupted, stopping playback");
                if controller.state().is_active() {
                    controller.stop()?;
                }
                break;
            }
        }
    }

    controller.sink_mut().finish()?;
    Ok(controller.state())
}
