//! Timestamps and the profile visit block (`spec.md` §3 `Profile`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three-deep visit history a profile carries, plus its timezone.
///
/// Updated only on the first event of a new session (`spec.md` §4.3
/// step 1): `third_to_last ← second_to_last`, `second_to_last ← last`,
/// `last ← now`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileVisit {
    /// Total number of visits (sessions) recorded for this profile.
    pub count: u32,
    /// Most recent visit time.
    pub last: Option<DateTime<Utc>>,
    /// Second most recent visit time.
    pub second_to_last: Option<DateTime<Utc>>,
    /// Third most recent visit time.
    pub third_to_last: Option<DateTime<Utc>>,
    /// Timezone copied from the session context on the visit that set `last`.
    pub tz: Option<String>,
}

impl ProfileVisit {
    /// Shift the visit window and record a new visit at `now`, bumping
    /// the visit count.
    pub fn record_visit(&mut self, now: DateTime<Utc>) {
        self.third_to_last = self.second_to_last.take();
        self.second_to_last = self.last.take();
        self.last = Some(now);
        self.count += 1;
    }
}

/// `Profile.metadata` — insert time plus the visit block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMetadata {
    /// When the profile document was first created.
    pub insert: DateTime<Utc>,
    /// Visit history.
    pub visit: ProfileVisit,
}

impl ProfileMetadata {
    /// A fresh metadata block for a profile created right now.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            insert: now,
            visit: ProfileVisit::default(),
        }
    }
}

/// `Session.metadata.time` — insert time, last-timestamp and duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTime {
    /// When the session document was first created.
    pub insert: DateTime<Utc>,
    /// Wall-clock time of the most recent payload touching this session.
    pub timestamp: DateTime<Utc>,
    /// Cumulative session duration in seconds.
    pub duration: f64,
}

impl SessionTime {
    /// A fresh time block for a session created right now.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            insert: now,
            timestamp: now,
            duration: 0.0,
        }
    }
}

/// `Session.metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Time block.
    pub time: SessionTime,
}

impl SessionMetadata {
    /// A fresh metadata block for a session created right now.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            time: SessionTime::new(now),
        }
    }
}

/// `EventPayloadMetadata` / `Event.metadata.time` — insert and
/// (once persisted) process time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTime {
    /// When the event was collected.
    pub insert: DateTime<Utc>,
    /// Seconds between collection and persistence, set by the
    /// persistence coordinator (`spec.md` §4.4).
    pub process_time: Option<f64>,
}

impl EventTime {
    /// A fresh time block for an event collected right now.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            insert: now,
            process_time: None,
        }
    }
}
