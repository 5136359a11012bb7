//! Mismatch Tracker
//!
//! Debounce/hysteresis machine comparing the automatic environment reading
//! with the user's declaration.
//!
//! ```text
//!   Agreeing ──disagree──▶ Mismatching ──disagree, elapsed > threshold──▶ MismatchAlerted
//!      ▲                        │                                              │
//!      └──────agree (silent)────┘                agree (MismatchResolved) ─────┘
//! ```
//!
//! An Unknown automatic reading or a missing declaration is "not comparable":
//! the state resets and nothing is signalled. At most one LongMismatch and one
//! MismatchResolved are raised per disagreement episode.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use envsense_common::events::{AlertKind, EnvironmentCategory};
use tracing::{debug, info};

/// Automatic reading fed to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReading {
    /// Category derived from scene labels
    Category(EnvironmentCategory),
    /// Activity classifier reports being in a vehicle
    InVehicle,
}

impl AutoReading {
    /// Category used for comparison; a vehicle counts as Inside
    pub fn coerced(self) -> EnvironmentCategory {
        match self {
            AutoReading::Category(category) => category,
            AutoReading::InVehicle => EnvironmentCategory::Inside,
        }
    }
}

impl From<EnvironmentCategory> for AutoReading {
    fn from(category: EnvironmentCategory) -> Self {
        AutoReading::Category(category)
    }
}

/// Tracker state
///
/// Invariants: `alert_sent` implies `count > 0`; `started_at` is None iff
/// `count == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MismatchState {
    pub count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub alert_sent: bool,
}

/// Named phase of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPhase {
    Agreeing,
    Mismatching,
    MismatchAlerted,
}

impl MismatchState {
    pub fn phase(&self) -> MismatchPhase {
        match (self.count, self.alert_sent) {
            (0, _) => MismatchPhase::Agreeing,
            (_, false) => MismatchPhase::Mismatching,
            (_, true) => MismatchPhase::MismatchAlerted,
        }
    }
}

/// Deterministic alert identity: the disagreement episode plus the alert kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId {
    pub episode: u64,
    pub kind: AlertKind,
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mismatch-{}-{}", self.episode, self.kind)
    }
}

/// Outcome of one [`MismatchTracker::evaluate`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub alert: Option<AlertId>,
    pub state_after: MismatchState,
}

impl Evaluation {
    pub fn alert_kind(&self) -> Option<AlertKind> {
        self.alert.map(|id| id.kind)
    }
}

/// Stateful mismatch detector
#[derive(Debug)]
pub struct MismatchTracker {
    threshold: Duration,
    state: MismatchState,
    /// Incremented each time a new disagreement episode starts
    episode: u64,
}

impl MismatchTracker {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold: Duration::milliseconds(threshold_ms.min(i64::MAX as u64) as i64),
            state: MismatchState::default(),
            episode: 0,
        }
    }

    pub fn state(&self) -> MismatchState {
        self.state
    }

    /// Number of disagreement episodes seen so far
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Discard in-flight state (episode numbering continues)
    pub fn reset(&mut self) {
        self.state = MismatchState::default();
    }

    /// Advance the state machine with one automatic reading
    ///
    /// `manual` of None or Unknown means there is no ground truth to compare
    /// against.
    pub fn evaluate(
        &mut self,
        auto: AutoReading,
        manual: Option<EnvironmentCategory>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let manual = match manual {
            Some(EnvironmentCategory::Unknown) | None => {
                debug!("Mismatch check skipped: no manual declaration");
                return self.reset_with(None);
            }
            Some(m) => m,
        };

        let auto = auto.coerced();
        if auto == EnvironmentCategory::Unknown {
            debug!("Mismatch check skipped: automatic reading is Unknown");
            return self.reset_with(None);
        }

        if auto == manual {
            let resolved = if self.state.alert_sent {
                info!(
                    "Mismatch episode {} resolved after {} ticks",
                    self.episode, self.state.count
                );
                Some(AlertId {
                    episode: self.episode,
                    kind: AlertKind::MismatchResolved,
                })
            } else {
                None
            };
            return self.reset_with(resolved);
        }

        let alert = match self.state.started_at {
            None => {
                self.episode += 1;
                self.state = MismatchState {
                    count: 1,
                    started_at: Some(now),
                    alert_sent: false,
                };
                debug!(
                    "Mismatch episode {} started: auto={} manual={}",
                    self.episode, auto, manual
                );
                None
            }
            Some(started_at) => {
                self.state.count = self.state.count.saturating_add(1);
                if !self.state.alert_sent && now - started_at > self.threshold {
                    self.state.alert_sent = true;
                    info!(
                        "Mismatch episode {} exceeded {}ms (auto={} manual={})",
                        self.episode,
                        self.threshold.num_milliseconds(),
                        auto,
                        manual
                    );
                    Some(AlertId {
                        episode: self.episode,
                        kind: AlertKind::LongMismatch,
                    })
                } else {
                    None
                }
            }
        };

        Evaluation {
            alert,
            state_after: self.state,
        }
    }

    fn reset_with(&mut self, alert: Option<AlertId>) -> Evaluation {
        self.state = MismatchState::default();
        Evaluation {
            alert,
            state_after: self.state,
        }
    }
}
