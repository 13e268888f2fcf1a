use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use spotwatch_common::SpotRecord;
use tracing::{debug, warn};

/// Spots older than this (by their own timestamp) are ignored outright.
const MAX_SPOT_AGE_MINUTES: i64 = 31;
/// Tracked state with no sighting for this long is dropped.
const STATE_TTL_MINUTES: i64 = 30;
/// Minimum retune, in MHz, that counts as a new frequency.
const RETUNE_THRESHOLD_MHZ: f64 = 0.2;
/// Absorbs binary rounding, e.g. 14.285 - 14.085 = 0.19999999999999929.
const FREQ_EPSILON: f64 = 1e-6;

/// Per-activator state, keyed by the raw identifier.
#[derive(Debug, Clone)]
pub struct TrackedState {
    pub last_spot: SpotRecord,
    /// Wall-clock time of the last create/update, not the spot's timestamp
    pub last_seen_at: DateTime<Utc>,
    /// Set once the QRT notice for `last_spot` has gone out
    pub ended_flagged: bool,
}

impl TrackedState {
    fn new(spot: SpotRecord, now: DateTime<Utc>) -> Self {
        Self {
            last_spot: spot,
            last_seen_at: now,
            ended_flagged: false,
        }
    }
}

/// Outcome of evaluating one spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotChange {
    /// First sighting of this identifier
    New,
    Retuned,
    ModeChanged,
    /// QRT comment seen for the first time in this session
    Ended,
    /// Nothing material changed
    Repeat,
    /// Spot timestamp too old to act on
    Stale,
    /// First sighting already carries QRT
    EndedBeforeSeen,
}

impl SpotChange {
    pub fn should_notify(&self) -> bool {
        matches!(
            self,
            SpotChange::New | SpotChange::Retuned | SpotChange::ModeChanged | SpotChange::Ended
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpotChange::New => "new",
            SpotChange::Retuned => "retuned",
            SpotChange::ModeChanged => "mode changed",
            SpotChange::Ended => "qrt",
            SpotChange::Repeat => "repeat",
            SpotChange::Stale => "stale",
            SpotChange::EndedBeforeSeen => "qrt before first sighting",
        }
    }
}

impl std::fmt::Display for SpotChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the dedup map. Evaluation is sequential; the poller holds it by `&mut`.
#[derive(Debug, Default)]
pub struct SpotTracker {
    states: HashMap<String, TrackedState>,
}

impl SpotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `spot` is worth a notification.
    pub fn evaluate(&mut self, spot: &SpotRecord, now: DateTime<Utc>) -> bool {
        self.classify(spot, now).should_notify()
    }

    /// Same as [`evaluate`](Self::evaluate) but reports why.
    pub fn classify(&mut self, spot: &SpotRecord, now: DateTime<Utc>) -> SpotChange {
        if now - spot.timestamp > Duration::minutes(MAX_SPOT_AGE_MINUTES) {
            debug!(
                "Ignoring stale spot for {} from {}",
                spot.identifier, spot.timestamp
            );
            return SpotChange::Stale;
        }

        let Some(state) = self.states.get_mut(&spot.identifier) else {
            if spot.is_qrt() {
                return SpotChange::EndedBeforeSeen;
            }
            self.states
                .insert(spot.identifier.clone(), TrackedState::new(spot.clone(), now));
            return SpotChange::New;
        };

        // Frequency and mode changes start a new session and clear the QRT flag.
        if !spot.is_ft_mode() && is_retune(&state.last_spot, spot) {
            *state = TrackedState::new(spot.clone(), now);
            return SpotChange::Retuned;
        }

        if state.last_spot.mode != spot.mode {
            *state = TrackedState::new(spot.clone(), now);
            return SpotChange::ModeChanged;
        }

        if spot.is_qrt() {
            if state.ended_flagged {
                return SpotChange::Repeat;
            }
            state.ended_flagged = true;
            return SpotChange::Ended;
        }

        SpotChange::Repeat
    }

    /// Drop every state not refreshed within the TTL. Returns how many were removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = Duration::minutes(STATE_TTL_MINUTES);
        let before = self.states.len();
        self.states.retain(|_, state| now - state.last_seen_at <= ttl);
        before - self.states.len()
    }

    pub fn get(&self, identifier: &str) -> Option<&TrackedState> {
        self.states.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A malformed frequency on either side never counts as a retune.
fn is_retune(old: &SpotRecord, new: &SpotRecord) -> bool {
    match (old.frequency_mhz, new.frequency_mhz) {
        (Some(old_mhz), Some(new_mhz)) if old_mhz.is_finite() && new_mhz.is_finite() => {
            (old_mhz - new_mhz).abs() + FREQ_EPSILON >= RETUNE_THRESHOLD_MHZ
        }
        _ => {
            warn!(
                "Cannot compare frequencies for {}: '{}' vs '{}'",
                new.identifier, old.raw_frequency, new.raw_frequency
            );
            false
        }
    }
}
