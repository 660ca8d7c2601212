//! Turn-by-turn maneuvers and the spoken route digest.
//!
//! Routing services report every bend in the road. For narration only the
//! long legs matter, so [`major_maneuvers`] drops "continue" steps and short
//! hops before [`narration_script`] numbers what is left.

/// Minimum step length, in metres, for a maneuver to be narrated.
pub const MAJOR_MANEUVER_MIN_DISTANCE: f64 = 10_000.0;

/// Digest read out when no maneuver survives filtering.
pub const NO_MAJOR_TURNS: &str = "No major turns.";

/// A single instruction paired with the distance of the step it opens.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Maneuver {
    /// Human-readable instruction, e.g. "Turn left onto Hauptstraße".
    pub instruction: String,
    /// Length of the step in metres.
    pub distance: f64,
}

impl Maneuver {
    /// Construct a maneuver.
    pub fn new(instruction: impl Into<String>, distance: f64) -> Self {
        Self {
            instruction: instruction.into(),
            distance,
        }
    }

    fn is_major(&self, min_distance: f64) -> bool {
        !self.instruction.trim().eq_ignore_ascii_case("continue") && self.distance > min_distance
    }
}

/// Keep maneuvers longer than `min_distance` that are not plain "continue".
///
/// # Examples
/// ```
/// use lume_core::{Maneuver, major_maneuvers};
///
/// let steps = vec![
///     Maneuver::new("Head north", 12_000.0),
///     Maneuver::new("Continue", 40_000.0),
///     Maneuver::new("Turn left", 300.0),
/// ];
/// let major = major_maneuvers(&steps, 10_000.0);
/// assert_eq!(major, vec![Maneuver::new("Head north", 12_000.0)]);
/// ```
#[must_use]
pub fn major_maneuvers(maneuvers: &[Maneuver], min_distance: f64) -> Vec<Maneuver> {
    maneuvers
        .iter()
        .filter(|m| m.is_major(min_distance))
        .cloned()
        .collect()
}

/// Number the maneuvers into a single narration string.
///
/// Produces `"1. <first>. 2. <second>. "`, or [`NO_MAJOR_TURNS`] when the
/// list is empty.
#[must_use]
pub fn narration_script(maneuvers: &[Maneuver]) -> String {
    if maneuvers.is_empty() {
        return NO_MAJOR_TURNS.to_owned();
    }
    maneuvers
        .iter()
        .enumerate()
        .map(|(index, m)| format!("{}. {}. ", index + 1, m.instruction))
        .collect()
}
