//! Clock-driven playback of a planned route.
//!
//! The [`PlaybackController`] owns the route, the upcoming-POI table and the
//! playback state machine. Hosts feed it frame timestamps through
//! [`PlaybackController::tick`]; everything the controller wants the outside
//! world to know leaves through an [`EventSink`] and a [`Narrator`].

mod controller;
mod progress;

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use geo::Coord;
use thiserror::Error;

use crate::poi_cache::DEFAULT_LOOKUP_TIMEOUT;
use crate::route::RouteError;
use crate::sampler::{DEFAULT_PACING, KILOMETRE};
use crate::services::LookupError;

pub use controller::PlaybackController;
pub use progress::{Progress, ProgressError, Step};

/// Spoken once a route has been planned.
pub const ROUTE_READY: &str = "Route ready. Press Go to start.";
/// Spoken when playback starts its warm-up.
pub const LETS_GO: &str = "Let's go!";
/// Spoken on arrival.
pub const ARRIVED: &str = "Arrived.";

/// Narration line for a POI announcement.
#[must_use]
pub fn nearby(name: &str) -> String {
    format!("Nearby: {name}")
}

/// Lifecycle of a playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PlaybackState {
    /// Nothing is moving; progress is cleared.
    #[default]
    Stopped,
    /// Warm-up countdown before motion begins.
    Starting,
    /// Advancing along the route on every tick.
    Playing,
    /// Progress is frozen until resumed.
    Paused,
    /// The end of the route was reached; behaves like `Stopped`.
    Arrived,
}

impl PlaybackState {
    /// Whether progress fields carry meaning in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Playing | Self::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Arrived => "arrived",
        };
        f.write_str(name)
    }
}

/// Host commands that change the playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin the warm-up from the start of the route.
    Start,
    /// Freeze a running playback.
    Pause,
    /// Continue a paused playback.
    Resume,
    /// Abandon the playback and clear progress.
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Rejected playback commands. The state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command is not allowed in the current state.
    #[error("cannot {command} while {state}")]
    InvalidTransition {
        /// Command that was issued.
        command: Command,
        /// State the controller was in.
        state: PlaybackState,
    },
    /// `start` was issued before any route was planned.
    #[error("no route has been planned")]
    NoRoute,
}

/// Failures while planning through a [`RouteSource`](crate::RouteSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The route service failed.
    #[error("route service failed: {0}")]
    Source(#[from] LookupError),
    /// The service returned an unusable polyline.
    #[error(transparent)]
    InvalidRoute(#[from] RouteError),
}

/// Invalid [`PlaybackConfig`] values.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// Speed must be a positive, finite number.
    #[error("speed must be positive and finite, got {0}")]
    Speed(f64),
    /// The kilometre interval must be a positive, finite number.
    #[error("kilometre interval must be positive and finite, got {0}")]
    Interval(f64),
    /// The recent-POI ring needs room for at least one name.
    #[error("recent POI capacity must be at least one")]
    RecentCapacity,
}

/// Tunables for a playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Travel speed in metres per second.
    pub speed: f64,
    /// Countdown between `start` and the first motion.
    pub warm_up: Duration,
    /// Minimum time between two telemetry events.
    pub telemetry_interval: Duration,
    /// Distance between two announced kilometres, in metres.
    pub kilometre: f64,
    /// How many recently announced POI names are kept.
    pub recent_capacity: usize,
    /// Delay between two sampler dispatches.
    pub sampler_pacing: Duration,
    /// Upper bound for a single POI lookup.
    pub lookup_timeout: Duration,
}

/// Default travel speed, roughly 75 km/h.
pub const DEFAULT_SPEED: f64 = 20.8;

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            warm_up: Duration::from_millis(1_500),
            telemetry_interval: Duration::from_secs(5),
            kilometre: KILOMETRE,
            recent_capacity: 3,
            sampler_pacing: DEFAULT_PACING,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl PlaybackConfig {
    /// Set the travel speed in metres per second.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the warm-up countdown.
    #[must_use]
    pub fn with_warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up = warm_up;
        self
    }

    /// Set the minimum spacing of telemetry events.
    #[must_use]
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Set the kilometre interval in metres.
    #[must_use]
    pub fn with_kilometre(mut self, kilometre: f64) -> Self {
        self.kilometre = kilometre;
        self
    }

    /// Set the sampler pacing.
    #[must_use]
    pub fn with_sampler_pacing(mut self, pacing: Duration) -> Self {
        self.sampler_pacing = pacing;
        self
    }

    /// Set the POI lookup timeout.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::Speed(self.speed));
        }
        if !(self.kilometre.is_finite() && self.kilometre > 0.0) {
            return Err(ConfigError::Interval(self.kilometre));
        }
        if self.recent_capacity == 0 {
            return Err(ConfigError::RecentCapacity);
        }
        Ok(())
    }
}

/// Distance and speed figures reported at a throttled cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Telemetry {
    /// Metres travelled since the start of the route.
    pub travelled: f64,
    /// Metres left to the end of the route.
    pub remaining: f64,
    /// Current speed in metres per second.
    pub speed: f64,
}

/// Notifications pushed to the host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "event", rename_all = "snake_case")
)]
pub enum PlaybackEvent {
    /// A new route replaced the previous one.
    RoutePlanned {
        total_length: f64,
        samples: usize,
        maneuvers: usize,
    },
    /// The state machine moved.
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    /// The agent marker appeared at the start of the route.
    AgentPlaced { position: Coord<f64> },
    /// The agent moved.
    Position { position: Coord<f64> },
    /// Throttled distance and speed report.
    Telemetry(Telemetry),
    /// A kilometre boundary was crossed. Emitted once per index, in order.
    KilometreReached { kilometre: u32 },
    /// A named place near a kilometre boundary.
    PoiAnnounced {
        kilometre: u32,
        name: String,
        /// Most recent names, newest first.
        recent: Vec<String>,
    },
    /// A description of an announced place arrived.
    PoiDescribed {
        kilometre: u32,
        name: String,
        summary: String,
        language: String,
    },
    /// The end of the route was reached.
    Arrived { total_length: f64 },
    /// The agent marker was removed.
    AgentRemoved,
}

/// Receives playback events. Implementations must not block.
pub trait EventSink {
    /// Accept one event.
    fn emit(&mut self, event: PlaybackEvent);
}

/// Receives text for out-of-band narration. Fire-and-forget.
pub trait Narrator {
    /// Speak or otherwise present `text`.
    fn say(&mut self, text: &str);
}

/// Bounded ring of recently announced POI names, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPois {
    names: VecDeque<String>,
    capacity: usize,
}

impl RecentPois {
    /// Create an empty ring holding at most `capacity` names.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            names: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Put `name` in front, evicting the oldest name when full.
    pub fn push(&mut self, name: String) {
        self.names.push_front(name);
        self.names.truncate(self.capacity);
    }

    /// Names, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Owned copy of the names, newest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    /// Number of names held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no name is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Drop every name.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}
