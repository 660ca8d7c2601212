//! Command pipelines exercised against stub collaborators.

use super::helpers::{alexanderplatz, equator_plan, event_names, json_lines};
use super::*;
use crate::plan::{PlanConfig, PlanSummary, execute_plan, write_summary};
use crate::simulate::{SimulateConfig, execute_simulation};
use crate::sink::JsonLinesSink;
use lume_core::test_support::{
    StubDescriber, StubPoiLookup, StubRouteSource, equator_waypoints,
};
use lume_core::{
    EventSink, LookupError, PlanError, PlaybackEvent, PlaybackState, RoutePlan, RouteError,
};
use rstest::{fixture, rstest};
use std::io::{self, Write};
use std::sync::Arc;

#[fixture]
fn plan_config() -> PlanConfig {
    PlanConfig::try_from(PlanArgs {
        from: Some("0.0,0.0".to_owned()),
        to: Some("Alexanderplatz".to_owned()),
        ..PlanArgs::default()
    })
    .expect("config should build")
}

fn simulate_config(speed: f64) -> SimulateConfig {
    SimulateConfig::try_from(SimulateArgs {
        from: Some("0.0,0.0".to_owned()),
        to: Some("0.0,0.05".to_owned()),
        speed: Some(speed),
        ..SimulateArgs::default()
    })
    .expect("config should build")
}

#[rstest]
#[tokio::test]
async fn plan_summarises_route_and_digest(plan_config: PlanConfig) {
    let source = StubRouteSource::with_plan(equator_plan());

    let summary = execute_plan(&plan_config, &source, &alexanderplatz())
        .await
        .expect("plan should succeed");

    assert_eq!((summary.from.lat, summary.from.lon), (0.0, 0.0));
    assert_eq!((summary.to.lat, summary.to.lon), (52.5219, 13.4132));
    assert!((summary.total_length_m - 2_500.0).abs() < 1e-6);
    assert_eq!(summary.waypoints, 3);
    assert_eq!(summary.maneuvers.len(), 1);
    assert_eq!(summary.narration, "1. Head east. ");
    let marks: Vec<u32> = summary.kilometres.iter().map(|mark| mark.kilometre).collect();
    assert_eq!(marks, vec![1, 2]);
}

#[rstest]
#[tokio::test]
async fn unknown_places_name_the_failing_endpoint() {
    let config = PlanConfig::try_from(PlanArgs {
        from: Some("0.0,0.0".to_owned()),
        to: Some("Atlantis".to_owned()),
        ..PlanArgs::default()
    })
    .expect("config should build");
    let source = StubRouteSource::with_plan(equator_plan());

    let err = execute_plan(&config, &source, &alexanderplatz())
        .await
        .expect_err("geocoding should fail");

    match err {
        CliError::Geocode { field, input, .. } => {
            assert_eq!(field, ARG_TO);
            assert_eq!(input, "Atlantis");
        }
        other => panic!("expected Geocode, found {other:?}"),
    }
}

#[rstest]
#[case::service(
    StubRouteSource::with_error(LookupError::Service {
        code: "NoRoute".to_owned(),
        message: "Impossible route".to_owned(),
    })
)]
#[case::degenerate(
    StubRouteSource::with_plan(RoutePlan {
        waypoints: equator_waypoints(&[]),
        maneuvers: Vec::new(),
    })
)]
#[tokio::test]
async fn route_failures_are_plan_errors(
    plan_config: PlanConfig,
    #[case] source: StubRouteSource,
) {
    let err = execute_plan(&plan_config, &source, &alexanderplatz())
        .await
        .expect_err("planning should fail");

    assert!(
        matches!(
            err,
            CliError::Plan(
                PlanError::Source(_)
                    | PlanError::InvalidRoute(RouteError::InvalidRoute { .. })
            )
        ),
        "got {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn summary_is_written_as_json(plan_config: PlanConfig) {
    let source = StubRouteSource::with_plan(equator_plan());
    let summary: PlanSummary = execute_plan(&plan_config, &source, &alexanderplatz())
        .await
        .expect("plan should succeed");
    let mut out = Vec::new();

    write_summary(&mut out, &summary).expect("write should succeed");

    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid JSON");
    assert_eq!(value["narration"], "1. Head east. ");
    assert_eq!(value["kilometres"][0]["kilometre"], 1);
    assert_eq!(value["kilometres"][0]["lat"], 0.0);
    assert_eq!(value["maneuvers"][0]["instruction"], "Head east");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn simulation_streams_events_until_arrival() {
    let config = simulate_config(500.0);
    let source = StubRouteSource::with_plan(equator_plan());
    let lookup = Arc::new(StubPoiLookup::named("Fernsehturm"));
    let mut out = Vec::new();

    let state = execute_simulation(
        &config,
        &source,
        &alexanderplatz(),
        lookup,
        None,
        &mut out,
        std::future::pending(),
    )
    .await
    .expect("simulation should finish");

    assert_eq!(state, PlaybackState::Arrived);
    let events = json_lines(&out);
    let names = event_names(&events);
    assert_eq!(names.first().map(String::as_str), Some("route_planned"));
    assert_eq!(names.last().map(String::as_str), Some("agent_removed"));
    assert_eq!(names.iter().filter(|name| *name == "kilometre_reached").count(), 2);
    assert_eq!(names.iter().filter(|name| *name == "arrived").count(), 1);
    let announced: Vec<&serde_json::Value> = events
        .iter()
        .filter(|event| event["event"] == "poi_announced")
        .collect();
    assert_eq!(announced.len(), 2);
    assert_eq!(announced[0]["name"], "Fernsehturm");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn simulation_describes_announced_places() {
    let config = simulate_config(500.0);
    let source = StubRouteSource::with_plan(equator_plan());
    let lookup = Arc::new(StubPoiLookup::named("Fernsehturm"));
    let describer = Arc::new(StubDescriber::with_summaries([(
        "Fernsehturm",
        "Der Berliner Fernsehturm ist das höchste Bauwerk Deutschlands.",
    )]));
    let mut out = Vec::new();

    let state = execute_simulation(
        &config,
        &source,
        &alexanderplatz(),
        lookup,
        Some(describer.clone()),
        &mut out,
        std::future::pending(),
    )
    .await
    .expect("simulation should finish");

    assert_eq!(state, PlaybackState::Arrived);
    assert_eq!(describer.calls(), 2);
    let described: Vec<serde_json::Value> = json_lines(&out)
        .into_iter()
        .filter(|event| event["event"] == "poi_described")
        .collect();
    assert_eq!(described.len(), 2);
    assert_eq!(described[0]["kilometre"], 1);
    assert_eq!(described[0]["name"], "Fernsehturm");
    assert_eq!(described[0]["language"], "de");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_playback() {
    let config = simulate_config(1.0);
    let source = StubRouteSource::with_plan(equator_plan());
    let lookup = Arc::new(StubPoiLookup::nothing());
    let mut out = Vec::new();

    let state = execute_simulation(
        &config,
        &source,
        &alexanderplatz(),
        lookup,
        None,
        &mut out,
        async { Ok(()) },
    )
    .await
    .expect("simulation should stop cleanly");

    assert_eq!(state, PlaybackState::Stopped);
    let names = event_names(&json_lines(&out));
    assert_eq!(names.last().map(String::as_str), Some("state_changed"));
    assert!(names.iter().any(|name| name == "agent_removed"));
    assert!(!names.iter().any(|name| name == "arrived"));
}

#[derive(Debug)]
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[rstest]
fn sink_keeps_the_first_write_error() {
    let mut sink = JsonLinesSink::new(BrokenPipe);

    sink.emit(PlaybackEvent::AgentRemoved);
    sink.emit(PlaybackEvent::AgentRemoved);

    assert_eq!(sink.written(), 0);
    let err = sink.finish().expect_err("write failure should surface");
    assert!(
        matches!(err, CliError::Serialize(_) | CliError::Output(_)),
        "got {err:?}"
    );
}

#[rstest]
fn sink_writes_one_object_per_line() {
    let mut out = Vec::new();
    let mut sink = JsonLinesSink::new(&mut out);

    sink.emit(PlaybackEvent::KilometreReached { kilometre: 3 });
    sink.emit(PlaybackEvent::AgentRemoved);
    sink.finish().expect("flush should succeed");
    assert_eq!(sink.written(), 2);

    let events = json_lines(&out);
    assert_eq!(events[0]["event"], "kilometre_reached");
    assert_eq!(events[0]["kilometre"], 3);
    assert_eq!(events[1]["event"], "agent_removed");
}
