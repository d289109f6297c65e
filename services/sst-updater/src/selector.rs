//! Timestamp selection over a dataset's time axis.

use chrono::{DateTime, Duration, Utc};
use sst_common::LookbackConfig;

/// Which axis entries a run processes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSelector {
    /// One known timestamp. Needs no axis query.
    Explicit(DateTime<Utc>),
    /// Newest axis entry.
    Latest,
    /// Entries no older than `now - duration`.
    Within(Duration),
    /// Trailing `n` entries, however far apart.
    LastN(usize),
}

impl TimeSelector {
    pub fn from_lookback(lookback: &LookbackConfig) -> Self {
        match lookback.count {
            Some(n) => TimeSelector::LastN(n),
            None => TimeSelector::Within(lookback.duration()),
        }
    }

    pub fn needs_axis(&self) -> bool {
        !matches!(self, TimeSelector::Explicit(_))
    }

    /// Pick timestamps from an ascending `axis`, oldest first.
    pub fn select(&self, axis: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        match *self {
            TimeSelector::Explicit(ts) => vec![ts],
            TimeSelector::Latest => axis.last().copied().into_iter().collect(),
            TimeSelector::Within(window) => {
                let cutoff = now - window;
                axis.iter().copied().filter(|ts| *ts >= cutoff).collect()
            }
            TimeSelector::LastN(n) => axis[axis.len().saturating_sub(n)..].to_vec(),
        }
    }
}
