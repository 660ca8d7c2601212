//! Focused unit tests covering argument parsing and configuration merging.

use super::*;
use crate::plan::PlanConfig;
use crate::simulate::{DEFAULT_FRAME_MS, SimulateConfig};
use crate::trip::parse_country_codes;
use lume_core::ConfigError;
use lume_data::nominatim::DEFAULT_COUNTRY_CODES;
use lume_data::overpass::DEFAULT_RADIUS_M;
use lume_data::routing::{DEFAULT_OSRM_URL, DEFAULT_PROFILE};
use rstest::rstest;
use std::time::Duration;

fn plan_args(from: Option<&str>, to: Option<&str>) -> PlanArgs {
    PlanArgs {
        from: from.map(str::to_owned),
        to: to.map(str::to_owned),
        ..PlanArgs::default()
    }
}

fn simulate_args() -> SimulateArgs {
    SimulateArgs {
        from: Some("52.52,13.405".to_owned()),
        to: Some("Alexanderplatz".to_owned()),
        ..SimulateArgs::default()
    }
}

#[rstest]
#[case(None, Some("Alexanderplatz"), ARG_FROM, ENV_PLAN_FROM)]
#[case(Some("52.52,13.405"), None, ARG_TO, ENV_PLAN_TO)]
#[case(Some("   "), Some("Alexanderplatz"), ARG_FROM, ENV_PLAN_FROM)]
fn plan_without_endpoints_errors(
    #[case] from: Option<&str>,
    #[case] to: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let err = PlanConfig::try_from(plan_args(from, to)).expect_err("missing endpoint");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn simulate_reports_its_own_environment_variable() {
    let args = SimulateArgs {
        to: None,
        ..simulate_args()
    };

    let err = SimulateConfig::try_from(args).expect_err("missing destination");

    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_TO);
            assert_eq!(env, ENV_SIMULATE_TO);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn plan_config_falls_back_to_public_services() {
    let config = PlanConfig::try_from(plan_args(Some("52.52,13.405"), Some("Alexanderplatz")))
        .expect("config should build");

    assert_eq!(config.trip.from, "52.52,13.405");
    assert_eq!(config.trip.osrm.base_url, DEFAULT_OSRM_URL);
    assert_eq!(config.trip.osrm.profile, DEFAULT_PROFILE);
    assert_eq!(config.trip.nominatim.country_codes, DEFAULT_COUNTRY_CODES);
}

#[rstest]
fn plan_config_applies_service_overrides() {
    let args = PlanArgs {
        osrm_url: Some("http://localhost:5000".to_owned()),
        profile: Some("walking".to_owned()),
        nominatim_url: Some("http://localhost:8080/search".to_owned()),
        country_codes: Some("DE,at".to_owned()),
        ..plan_args(Some("Brandenburger Tor"), Some("Alexanderplatz"))
    };

    let config = PlanConfig::try_from(args).expect("config should build");

    assert_eq!(config.trip.osrm.base_url, "http://localhost:5000");
    assert_eq!(config.trip.osrm.profile, "walking");
    assert_eq!(config.trip.nominatim.base_url, "http://localhost:8080/search");
    assert_eq!(config.trip.nominatim.country_codes, vec!["de", "at"]);
}

#[rstest]
#[case("de", vec!["de"])]
#[case(" de , AT,,", vec!["de", "at"])]
#[case("", Vec::new())]
fn country_codes_are_normalised(#[case] list: &str, #[case] expected: Vec<&str>) {
    assert_eq!(parse_country_codes(list), expected);
}

#[rstest]
fn simulate_defaults_match_the_engine() {
    let config = SimulateConfig::try_from(simulate_args()).expect("config should build");

    assert_eq!(config.frame, Duration::from_millis(DEFAULT_FRAME_MS));
    assert_eq!(config.playback, lume_core::PlaybackConfig::default());
    assert_eq!(config.overpass.radius_m, DEFAULT_RADIUS_M);
    assert_eq!(config.describe, None);
}

#[rstest]
#[case(Some("en"), &["en", "de"])]
#[case(None, &["de", "en"])]
fn describing_asks_the_chosen_language_first(
    #[case] language: Option<&str>,
    #[case] expected: &[&str],
) {
    let args = SimulateArgs {
        describe: Some(true),
        language: language.map(str::to_owned),
        ..simulate_args()
    };

    let config = SimulateConfig::try_from(args).expect("config should build");

    let wikipedia = config.describe.expect("describing is enabled");
    assert_eq!(wikipedia.languages(), expected);
}

#[rstest]
fn a_language_alone_does_not_enable_describing() {
    let args = SimulateArgs {
        language: Some("en".to_owned()),
        ..simulate_args()
    };

    let config = SimulateConfig::try_from(args).expect("config should build");

    assert_eq!(config.describe, None);
}

#[rstest]
fn simulate_applies_playback_overrides() {
    let args = SimulateArgs {
        speed: Some(50.0),
        frame_ms: Some(40),
        warm_up_ms: Some(0),
        telemetry_ms: Some(1_000),
        radius_m: Some(150),
        overpass_url: Some("http://localhost:12345/api/interpreter".to_owned()),
        ..simulate_args()
    };

    let config = SimulateConfig::try_from(args).expect("config should build");

    assert_eq!(config.frame, Duration::from_millis(40));
    assert_eq!(config.playback.speed, 50.0);
    assert_eq!(config.playback.warm_up, Duration::ZERO);
    assert_eq!(config.playback.telemetry_interval, Duration::from_secs(1));
    assert_eq!(config.overpass.radius_m, 150);
    assert_eq!(
        config.overpass.base_url,
        "http://localhost:12345/api/interpreter"
    );
}

#[rstest]
fn simulate_rejects_a_zero_frame_interval() {
    let args = SimulateArgs {
        frame_ms: Some(0),
        ..simulate_args()
    };

    let err = SimulateConfig::try_from(args).expect_err("zero frame");

    assert!(matches!(err, CliError::FrameInterval), "got {err:?}");
}

#[rstest]
#[case(0.0)]
#[case(-3.0)]
fn simulate_rejects_unusable_speeds(#[case] speed: f64) {
    let args = SimulateArgs {
        speed: Some(speed),
        ..simulate_args()
    };

    let err = SimulateConfig::try_from(args).expect_err("bad speed");

    match err {
        CliError::Playback(ConfigError::Speed(rejected)) => assert_eq!(rejected, speed),
        other => panic!("expected a speed error, found {other:?}"),
    }
}

#[rstest]
fn parses_the_plan_subcommand() {
    let cli = Cli::try_parse_from([
        "lume",
        "plan",
        "--from",
        "52.52,13.405",
        "--to",
        "Alexanderplatz",
        "--profile",
        "driving",
    ])
    .expect("arguments should parse");

    match cli.command {
        Command::Plan(args) => {
            assert_eq!(args.from.as_deref(), Some("52.52,13.405"));
            assert_eq!(args.to.as_deref(), Some("Alexanderplatz"));
            assert_eq!(args.profile.as_deref(), Some("driving"));
        }
        other => panic!("expected plan, found {other:?}"),
    }
}

#[rstest]
fn parses_simulation_tunables() {
    let cli = Cli::try_parse_from([
        "lume",
        "simulate",
        "--from",
        "Brandenburger Tor",
        "--to",
        "Alexanderplatz",
        "--speed",
        "12.5",
        "--frame-ms",
        "50",
        "--describe",
    ])
    .expect("arguments should parse");

    match cli.command {
        Command::Simulate(args) => {
            assert_eq!(args.speed, Some(12.5));
            assert_eq!(args.frame_ms, Some(50));
            assert_eq!(args.warm_up_ms, None);
            assert_eq!(args.describe, Some(true));
        }
        other => panic!("expected simulate, found {other:?}"),
    }
}

#[rstest]
#[case(&["lume"])]
#[case(&["lume", "navigate"])]
#[case(&["lume", "simulate", "--speed", "fast"])]
fn rejects_malformed_invocations(#[case] argv: &[&str]) {
    let err = Cli::try_parse_from(argv).map_err(CliError::from);

    assert!(matches!(err, Err(CliError::ArgumentParsing(_))));
}
