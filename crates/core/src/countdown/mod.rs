//! Countdown derivation for banners and version phases.
//!
//! Nothing here is decremented between ticks: every value is recomputed from
//! absolute instants, so missed or late ticks never accumulate drift.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Banner, VersionPhase};

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// Remaining time split into whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Remaining {
    /// Whole days.
    pub days: u64,
    /// Hours past the last whole day.
    pub hours: u64,
    /// Minutes past the last whole hour.
    pub minutes: u64,
    /// Seconds past the last whole minute.
    pub seconds: u64,
}

impl Remaining {
    /// Decompose a count of seconds; negative inputs clamp to zero.
    pub fn from_seconds(total: i64) -> Self {
        let total = u64::try_from(total).unwrap_or(0);
        Self {
            days: total / SECONDS_PER_DAY,
            hours: total % SECONDS_PER_DAY / SECONDS_PER_HOUR,
            minutes: total % SECONDS_PER_HOUR / SECONDS_PER_MINUTE,
            seconds: total % SECONDS_PER_MINUTE,
        }
    }

    /// Whole seconds between `now` and `target`, truncated, never negative.
    pub fn between(now: DateTime<Utc>, target: DateTime<Utc>) -> Self {
        Self::from_seconds((target - now).num_seconds())
    }

    /// Total seconds represented.
    pub fn total_seconds(&self) -> u64 {
        self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }

    /// Whether no time remains.
    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    /// Clock-style rendering such as `3D 04:05:06`.
    pub fn clock(&self) -> String {
        format!(
            "{}D {:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {}h {}m {}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Position of a time window relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lifecycle {
    /// Open; remaining time counts down to the end.
    Active,
    /// Not open yet; remaining time counts down to the start.
    Upcoming,
    /// Closed; remaining time is zero.
    Finished,
}

/// Classify a window and compute the relevant remaining time.
pub fn classify(
    now: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
) -> (Lifecycle, Remaining) {
    if now >= end {
        return (Lifecycle::Finished, Remaining::default());
    }
    match start {
        Some(start) if now < start => (Lifecycle::Upcoming, Remaining::between(now, start)),
        _ => (Lifecycle::Active, Remaining::between(now, end)),
    }
}

/// Derived per-tick view of one banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerCountdown {
    /// The banner itself.
    pub banner: Banner,
    /// Where `now` falls in the banner window.
    pub lifecycle: Lifecycle,
    /// Time to the next boundary of the window.
    pub remaining: Remaining,
}

/// Derived per-tick view of one version phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCountdown {
    /// The version phase.
    pub phase: VersionPhase,
    /// Where `now` falls in the phase window.
    pub lifecycle: Lifecycle,
    /// Time to the next boundary of the phase.
    pub remaining: Remaining,
}

/// Output of a single [`CountdownEngine::tick`].
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// One entry per distinct banner id, in first-seen order.
    pub banners: Vec<BannerCountdown>,
    /// Ids of banners that went from active to finished on this tick.
    pub expired: Vec<String>,
}

/// Recomputes banner countdowns each tick and detects expiry transitions.
#[derive(Debug, Default)]
pub struct CountdownEngine {
    previous: HashMap<String, Lifecycle>,
}

impl CountdownEngine {
    /// Engine with no recorded lifecycles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every banner against `now`.
    ///
    /// Transition detection is keyed by banner id, so reordering or
    /// replacing the snapshot between ticks does not produce spurious events.
    pub fn tick(&mut self, banners: &[Banner], now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut current = HashMap::with_capacity(banners.len());

        for banner in dedup_by_id(banners) {
            let (lifecycle, remaining) = classify(now, banner.start_date, banner.end_date);
            if lifecycle == Lifecycle::Finished
                && self.previous.get(&banner.id) == Some(&Lifecycle::Active)
            {
                debug!(banner = %banner.id, "banner expired");
                report.expired.push(banner.id.clone());
            }
            current.insert(banner.id.clone(), lifecycle);
            report.banners.push(BannerCountdown {
                banner: banner.clone(),
                lifecycle,
                remaining,
            });
        }

        self.previous = current;
        report
    }

    /// Lifecycle recorded for `id` on the last tick.
    pub fn last_state(&self, id: &str) -> Option<Lifecycle> {
        self.previous.get(id).copied()
    }
}

/// Collapse duplicate ids, keeping the first position and the last-seen value.
///
/// Duplicates violate the data contract; this only keeps the view sane if the
/// server sends them anyway.
pub fn dedup_by_id(banners: &[Banner]) -> Vec<&Banner> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(banners.len());
    let mut unique: Vec<&Banner> = Vec::with_capacity(banners.len());
    for banner in banners {
        match positions.get(banner.id.as_str()) {
            Some(&index) => unique[index] = banner,
            None => {
                positions.insert(banner.id.as_str(), unique.len());
                unique.push(banner);
            }
        }
    }
    unique
}

/// Countdown view for a list of version phases.
pub fn phase_countdowns(phases: &[VersionPhase], now: DateTime<Utc>) -> Vec<PhaseCountdown> {
    phases
        .iter()
        .map(|phase| {
            let (lifecycle, remaining) = classify(now, Some(phase.start_date), phase.end_date);
            PhaseCountdown {
                phase: phase.clone(),
                lifecycle,
                remaining,
            }
        })
        .collect()
}
