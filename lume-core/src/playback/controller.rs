//! The playback state machine.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use geo::Coord;
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::progress::{Progress, Step};
use super::{
    ARRIVED, Command, CommandError, ConfigError, EventSink, LETS_GO, Narrator, PlanError,
    PlaybackConfig, PlaybackEvent, PlaybackState, ROUTE_READY, RecentPois, Telemetry, nearby,
};
use crate::maneuver::{MAJOR_MANEUVER_MIN_DISTANCE, Maneuver, major_maneuvers, narration_script};
use crate::poi_cache::PoiCache;
use crate::route::{Route, RouteError};
use crate::sampler::{PoiSample, PoiSampler, Resolution, UpcomingPoiTable, sample_points};
use crate::services::{PlaceDescriber, PlaceDescription, PoiLookup, RouteSource};

/// Timestamps the controller keeps between ticks.
#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    /// First tick seen while starting.
    warm_up_origin: Option<Duration>,
    /// Previous frame while playing; `None` re-anchors on the next tick.
    last_frame: Option<Duration>,
    /// Motion time of the last telemetry event.
    last_telemetry: Option<Duration>,
    /// Time spent moving since the start.
    motion: Duration,
}

/// A finished description, tagged like sampler resolutions.
#[derive(Debug)]
struct Described {
    generation: u64,
    kilometre: u32,
    name: String,
    description: PlaceDescription,
}

/// Drives an agent along a planned route.
///
/// The controller is synchronous: hosts call [`tick`](Self::tick) with a
/// monotonic timestamp once per frame. POI lookups run on the ambient Tokio
/// runtime and their results are collected at the start of every tick.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use geo::Coord;
/// use lume_core::{PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackState};
/// use lume_core::{EventSink, Narrator, PoiLookup, LookupError};
///
/// struct Quiet;
/// impl EventSink for Quiet {
///     fn emit(&mut self, _: PlaybackEvent) {}
/// }
/// impl Narrator for Quiet {
///     fn say(&mut self, _: &str) {}
/// }
///
/// struct Nowhere;
/// #[async_trait::async_trait]
/// impl PoiLookup for Nowhere {
///     async fn nearest_name(&self, _: Coord<f64>) -> Result<Option<String>, LookupError> {
///         Ok(None)
///     }
/// }
///
/// let mut playback = PlaybackController::with_lookup(
///     PlaybackConfig::default().with_warm_up(Duration::ZERO),
///     Arc::new(Nowhere),
///     Quiet,
///     Quiet,
/// )
/// .expect("default config is valid");
/// playback
///     .plan_route(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.01, y: 0.0 }], Vec::new())
///     .expect("two waypoints form a route");
/// playback.start().expect("a route is planned");
/// playback.tick(Duration::ZERO);
/// assert_eq!(playback.state(), PlaybackState::Playing);
/// ```
pub struct PlaybackController<S, N> {
    config: PlaybackConfig,
    sampler: PoiSampler,
    resolutions: UnboundedReceiver<Resolution>,
    describer: Option<Arc<dyn PlaceDescriber>>,
    describing: Arc<AtomicUsize>,
    described_tx: UnboundedSender<Described>,
    described: UnboundedReceiver<Described>,
    route: Option<Arc<Route>>,
    maneuvers: Vec<Maneuver>,
    samples: Vec<PoiSample>,
    upcoming: UpcomingPoiTable,
    /// Reached kilometres whose POI is still being looked up.
    awaiting: HashSet<u32>,
    state: PlaybackState,
    progress: Progress,
    clock: Clock,
    recent: RecentPois,
    sink: S,
    narrator: N,
}

impl<S, N> std::fmt::Debug for PlaybackController<S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("generation", &self.sampler.generation())
            .field("samples", &self.samples.len())
            .field("describes", &self.describer.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: EventSink, N: Narrator> PlaybackController<S, N> {
    /// Create a stopped controller without a route, sharing `cache`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn new(
        config: PlaybackConfig,
        cache: Arc<PoiCache>,
        sink: S,
        narrator: N,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (results, resolutions) = mpsc::unbounded_channel();
        let sampler = PoiSampler::new(cache, config.sampler_pacing, results);
        let recent = RecentPois::new(config.recent_capacity);
        let (described_tx, described) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            sampler,
            resolutions,
            describer: None,
            describing: Arc::new(AtomicUsize::new(0)),
            described_tx,
            described,
            route: None,
            maneuvers: Vec::new(),
            samples: Vec::new(),
            upcoming: UpcomingPoiTable::default(),
            awaiting: HashSet::new(),
            state: PlaybackState::Stopped,
            progress: Progress::default(),
            clock: Clock::default(),
            recent,
            sink,
            narrator,
        })
    }

    /// Create a controller with its own cache in front of `lookup`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when `config` fails validation.
    pub fn with_lookup(
        config: PlaybackConfig,
        lookup: Arc<dyn PoiLookup>,
        sink: S,
        narrator: N,
    ) -> Result<Self, ConfigError> {
        let cache = Arc::new(PoiCache::with_timeout(lookup, config.lookup_timeout));
        Self::new(config, cache, sink, narrator)
    }

    /// Describe every announced place through `describer`.
    ///
    /// Descriptions arrive as [`PlaybackEvent::PoiDescribed`] and are
    /// narrated. Failures are logged and dropped.
    #[must_use]
    pub fn with_describer(mut self, describer: Arc<dyn PlaceDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    /// Whether announcements or descriptions are still on their way.
    ///
    /// Hosts that exit on arrival can keep ticking until this turns false.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.awaiting.is_empty()
            || self.describing.load(Ordering::SeqCst) > 0
            || !self.described.is_empty()
    }

    /// Current playback state.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Tunables this controller was built with.
    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Position along the route of the current playback.
    #[must_use]
    pub const fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Metres travelled in the current playback; zero when not active.
    #[must_use]
    pub fn travelled(&self) -> f64 {
        self.progress.travelled()
    }

    /// The planned route, if any.
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// Maneuvers delivered with the current route.
    #[must_use]
    pub fn maneuvers(&self) -> &[Maneuver] {
        &self.maneuvers
    }

    /// Kilometre samples of the current route.
    #[must_use]
    pub fn samples(&self) -> &[PoiSample] {
        &self.samples
    }

    /// POI names resolved so far for the current route.
    #[must_use]
    pub const fn upcoming(&self) -> &UpcomingPoiTable {
        &self.upcoming
    }

    /// Names announced in the current playback, newest first.
    #[must_use]
    pub const fn recent_pois(&self) -> &RecentPois {
        &self.recent
    }

    /// Sampler generation of the current route.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.sampler.generation()
    }

    /// POI cache shared with the sampler.
    #[must_use]
    pub fn cache(&self) -> &Arc<PoiCache> {
        self.sampler.cache()
    }

    /// Event sink receiving playback events.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the event sink, e.g. to flush it.
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Narrator receiving spoken texts.
    #[must_use]
    pub const fn narrator(&self) -> &N {
        &self.narrator
    }

    /// Replace the route and start sampling its kilometres.
    ///
    /// Any playback in progress is stopped first. Sampling runs of earlier
    /// routes are superseded and their late answers are discarded.
    ///
    /// # Errors
    /// Returns [`RouteError::InvalidRoute`] for fewer than two waypoints. The
    /// controller is then stopped and keeps its previous route.
    pub fn plan_route(
        &mut self,
        waypoints: Vec<Coord<f64>>,
        maneuvers: Vec<Maneuver>,
    ) -> Result<(), RouteError> {
        self.reset_to_stopped();
        let route = Route::new(waypoints)?;

        let generation = self.sampler.next_generation();
        let samples = sample_points(&route, self.config.kilometre);
        info!(
            "planned route of {:.0} m with {} kilometre samples (generation {generation})",
            route.total_length(),
            samples.len()
        );

        self.upcoming.clear();
        self.recent.clear();
        self.sink.emit(PlaybackEvent::RoutePlanned {
            total_length: route.total_length(),
            samples: samples.len(),
            maneuvers: maneuvers.len(),
        });
        self.sampler.spawn(generation, samples.clone());

        self.route = Some(Arc::new(route));
        self.maneuvers = maneuvers;
        self.samples = samples;
        self.narrator.say(ROUTE_READY);
        Ok(())
    }

    /// Fetch a route between two points and plan it.
    ///
    /// # Errors
    /// Returns [`PlanError::Source`] when the route service fails and
    /// [`PlanError::InvalidRoute`] when it returns an unusable polyline. In
    /// both cases the controller is stopped and keeps its previous route.
    pub async fn plan_from_source(
        &mut self,
        source: &dyn RouteSource,
        from: Coord<f64>,
        to: Coord<f64>,
    ) -> Result<(), PlanError> {
        let plan = match source.fetch_route(from, to).await {
            Ok(plan) => plan,
            Err(err) => {
                self.reset_to_stopped();
                return Err(PlanError::Source(err));
            }
        };
        self.plan_route(plan.waypoints, plan.maneuvers)?;
        Ok(())
    }

    /// Narrate the major maneuvers of the current route and return the
    /// script.
    pub fn narrate_directions(&mut self) -> String {
        let script = narration_script(&major_maneuvers(
            &self.maneuvers,
            MAJOR_MANEUVER_MIN_DISTANCE,
        ));
        self.narrator.say(&script);
        script
    }

    /// Apply a host command.
    ///
    /// # Errors
    /// See [`start`](Self::start), [`pause`](Self::pause),
    /// [`resume`](Self::resume) and [`stop`](Self::stop).
    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
        }
    }

    /// Place the agent at the start of the route and begin the warm-up.
    ///
    /// # Errors
    /// [`CommandError::InvalidTransition`] unless stopped or arrived, and
    /// [`CommandError::NoRoute`] before any route was planned.
    pub fn start(&mut self) -> Result<(), CommandError> {
        self.expect_state(Command::Start, &[PlaybackState::Stopped, PlaybackState::Arrived])?;
        let start = self.route.as_ref().ok_or(CommandError::NoRoute)?.start();

        self.progress = Progress::default();
        self.clock = Clock::default();
        self.awaiting.clear();
        self.recent.clear();
        self.transition(PlaybackState::Starting);
        self.sink.emit(PlaybackEvent::AgentPlaced { position: start });
        self.narrator.say(LETS_GO);
        Ok(())
    }

    /// Freeze a running playback.
    ///
    /// # Errors
    /// [`CommandError::InvalidTransition`] unless playing.
    pub fn pause(&mut self) -> Result<(), CommandError> {
        self.expect_state(Command::Pause, &[PlaybackState::Playing])?;
        self.clock.last_frame = None;
        self.transition(PlaybackState::Paused);
        Ok(())
    }

    /// Continue a paused playback. The next tick re-anchors the clock, so
    /// time spent paused never turns into motion.
    ///
    /// # Errors
    /// [`CommandError::InvalidTransition`] unless paused.
    pub fn resume(&mut self) -> Result<(), CommandError> {
        self.expect_state(Command::Resume, &[PlaybackState::Paused])?;
        self.clock.last_frame = None;
        self.transition(PlaybackState::Playing);
        Ok(())
    }

    /// Abandon the playback; the route stays planned.
    ///
    /// # Errors
    /// [`CommandError::InvalidTransition`] unless starting, playing or paused.
    pub fn stop(&mut self) -> Result<(), CommandError> {
        self.expect_state(
            Command::Stop,
            &[PlaybackState::Starting, PlaybackState::Playing, PlaybackState::Paused],
        )?;
        self.reset_to_stopped();
        Ok(())
    }

    /// Process one frame at host time `now`.
    ///
    /// Collects finished POI lookups, completes the warm-up once it has
    /// elapsed, and advances the agent by the time since the previous frame.
    pub fn tick(&mut self, now: Duration) {
        self.collect_resolutions();
        self.collect_descriptions();
        match self.state {
            PlaybackState::Starting => {
                let origin = *self.clock.warm_up_origin.get_or_insert(now);
                if now.saturating_sub(origin) >= self.config.warm_up {
                    self.clock.last_frame = Some(now);
                    self.transition(PlaybackState::Playing);
                }
            }
            PlaybackState::Playing => {
                if let Some(last) = self.clock.last_frame.replace(now) {
                    self.advance(now.saturating_sub(last));
                }
            }
            PlaybackState::Stopped | PlaybackState::Paused | PlaybackState::Arrived => {}
        }
    }

    /// Move the agent by `elapsed` of travel time. Does nothing unless
    /// playing.
    ///
    /// Broken progress stops the playback instead of failing.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(route) = self.route.clone() else {
            warn!("playing without a route; stopping");
            self.reset_to_stopped();
            return;
        };

        self.clock.motion += elapsed;
        let distance = self.config.speed * elapsed.as_secs_f64();
        match self.progress.advance(&route, distance) {
            Ok(Step::Moving) => {}
            Ok(Step::Arrived) => {
                self.arrive(&route);
                return;
            }
            Err(err) => {
                warn!("playback progress is broken ({err}); stopping");
                self.reset_to_stopped();
                return;
            }
        }

        let Some(position) = self.progress.position(&route) else {
            warn!("no position for segment {}; stopping", self.progress.segment());
            self.reset_to_stopped();
            return;
        };
        self.sink.emit(PlaybackEvent::Position { position });
        self.report_telemetry(&route);

        let travelled = self.progress.travelled();
        for kilometre in self.progress.take_kilometres(travelled, self.config.kilometre) {
            self.reach_kilometre(kilometre, position);
        }
    }

    fn reach_kilometre(&mut self, kilometre: u32, position: Coord<f64>) {
        self.sink.emit(PlaybackEvent::KilometreReached { kilometre });
        match self.upcoming.get(kilometre) {
            Some(Some(name)) => {
                let name = name.to_owned();
                self.announce(kilometre, name);
            }
            Some(None) => debug!("nothing named near kilometre {kilometre}"),
            None => {
                debug!("kilometre {kilometre} not sampled yet; looking up on the spot");
                if self
                    .sampler
                    .lookup_now(self.sampler.generation(), kilometre, position)
                    .is_some()
                {
                    self.awaiting.insert(kilometre);
                }
            }
        }
    }

    fn announce(&mut self, kilometre: u32, name: String) {
        self.recent.push(name.clone());
        self.narrator.say(&nearby(&name));
        self.sink.emit(PlaybackEvent::PoiAnnounced {
            kilometre,
            name: name.clone(),
            recent: self.recent.to_vec(),
        });
        self.request_description(kilometre, name);
    }

    fn request_description(&self, kilometre: u32, name: String) {
        let Some(describer) = self.describer.clone() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!("no Tokio runtime available; not describing {name:?}");
            return;
        };
        let generation = self.sampler.generation();
        let timeout = self.config.lookup_timeout;
        let results = self.described_tx.clone();
        let describing = Arc::clone(&self.describing);
        describing.fetch_add(1, Ordering::SeqCst);
        handle.spawn(async move {
            match tokio::time::timeout(timeout, describer.describe(&name)).await {
                Ok(Ok(description)) => {
                    let described = Described {
                        generation,
                        kilometre,
                        name,
                        description,
                    };
                    if results.send(described).is_err() {
                        debug!("controller dropped; discarding description");
                    }
                }
                Ok(Err(err)) => debug!("no description for {name:?}: {err}"),
                Err(_) => debug!("describing {name:?} timed out"),
            }
            // Only after sending, so the result is visible as pending first.
            describing.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn report_telemetry(&mut self, route: &Route) {
        let due = self.clock.last_telemetry.is_none_or(|last| {
            self.clock.motion.saturating_sub(last) >= self.config.telemetry_interval
        });
        if !due {
            return;
        }
        self.clock.last_telemetry = Some(self.clock.motion);
        let travelled = self.progress.travelled();
        self.sink.emit(PlaybackEvent::Telemetry(Telemetry {
            travelled,
            remaining: (route.total_length() - travelled).max(0.0),
            speed: self.config.speed,
        }));
    }

    fn arrive(&mut self, route: &Route) {
        let total = route.total_length();
        // Kilometres crossed by the final frame. Unsampled ones are looked up
        // at the destination and announced once that lookup resolves.
        for kilometre in self.progress.take_kilometres(total, self.config.kilometre) {
            self.reach_kilometre(kilometre, route.end());
        }

        self.sink.emit(PlaybackEvent::Position {
            position: route.end(),
        });
        self.sink.emit(PlaybackEvent::Telemetry(Telemetry {
            travelled: total,
            remaining: 0.0,
            speed: 0.0,
        }));
        self.narrator.say(ARRIVED);
        self.sink.emit(PlaybackEvent::Arrived {
            total_length: total,
        });
        self.sink.emit(PlaybackEvent::AgentRemoved);
        info!("arrived after {total:.0} m");

        self.progress = Progress::default();
        self.clock = Clock::default();
        self.recent.clear();
        self.transition(PlaybackState::Arrived);
    }

    /// Drain finished lookups into the upcoming table.
    ///
    /// Answers from superseded generations are dropped. Kilometres that were
    /// reached before their POI was known are announced now, including after
    /// arrival.
    fn collect_resolutions(&mut self) {
        while let Ok(resolution) = self.resolutions.try_recv() {
            let Resolution {
                generation,
                kilometre,
                name,
                origin,
            } = resolution;
            if !self.sampler.is_current(generation) {
                debug!(
                    "dropping {origin:?} POI for kilometre {kilometre} from generation {generation}"
                );
                continue;
            }
            if self.awaiting.remove(&kilometre)
                && let Some(name) = &name
            {
                self.announce(kilometre, name.clone());
            }
            self.upcoming.record(kilometre, name);
        }
    }

    /// Emit and narrate finished descriptions of the current route.
    fn collect_descriptions(&mut self) {
        while let Ok(described) = self.described.try_recv() {
            let Described {
                generation,
                kilometre,
                name,
                description,
            } = described;
            if !self.sampler.is_current(generation) {
                debug!("dropping description of {name:?} from generation {generation}");
                continue;
            }
            self.narrator.say(&description.summary);
            self.sink.emit(PlaybackEvent::PoiDescribed {
                kilometre,
                name,
                summary: description.summary,
                language: description.language,
            });
        }
    }

    fn reset_to_stopped(&mut self) {
        if self.state.is_active() {
            self.sink.emit(PlaybackEvent::AgentRemoved);
        }
        self.progress = Progress::default();
        self.clock = Clock::default();
        self.awaiting.clear();
        self.recent.clear();
        if self.state != PlaybackState::Stopped {
            self.transition(PlaybackState::Stopped);
        }
    }

    fn transition(&mut self, to: PlaybackState) {
        let from = self.state;
        debug!("playback {from} -> {to}");
        self.state = to;
        self.sink.emit(PlaybackEvent::StateChanged { from, to });
    }

    fn expect_state(
        &self,
        command: Command,
        allowed: &[PlaybackState],
    ) -> Result<(), CommandError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CommandError::InvalidTransition {
                command,
                state: self.state,
            })
        }
    }
}
