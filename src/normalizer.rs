use chrono::{NaiveDateTime, TimeDelta, Timelike};
use log::debug;

use crate::config::{Config, Reading};

/// Chronologically sorted readings with one entry per distinct timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSeries {
    readings: Vec<Reading>,
}

impl MergedSeries {
    /// Wrap already ordered readings. `None` unless timestamps strictly increase.
    pub fn new(readings: Vec<Reading>) -> Option<Self> {
        readings
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
            .then_some(Self { readings })
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn first(&self) -> Option<&Reading> {
        self.readings.first()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.last()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub sources: usize,
    pub readings_in: usize,
    pub readings_out: usize,
    /// Readings absorbed into another reading at the same timestamp.
    pub duplicates_collapsed: usize,
}

/// Merge per-file readings into one series, averaging readings that share a timestamp.
pub fn merge(parts: Vec<Vec<Reading>>, config: &Config) -> (MergedSeries, MergeStats) {
    let sources = parts.len();
    let mut all: Vec<Reading> = parts.into_iter().flatten().collect();
    let readings_in = all.len();

    if config.round_seconds {
        for r in &mut all {
            r.timestamp = round_to_second(r.timestamp);
        }
    }

    // power as tie-break so equal keys always sum in the same order
    all.sort_unstable_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.power.total_cmp(&b.power))
    });

    let mut readings: Vec<Reading> = Vec::with_capacity(all.len());
    let mut i = 0;
    while i < all.len() {
        let key = all[i].timestamp;
        let mut sum = 0.0;
        let mut count = 0usize;
        while i < all.len() && all[i].timestamp == key {
            sum += all[i].power;
            count += 1;
            i += 1;
        }
        let mean = sum / count as f64;
        readings.push(Reading::new(key, config.precision.apply(mean)));
    }

    let stats = MergeStats {
        sources,
        readings_in,
        readings_out: readings.len(),
        duplicates_collapsed: readings_in - readings.len(),
    };
    debug!(
        "merged {} readings from {} sources into {} ({} duplicates)",
        stats.readings_in, stats.sources, stats.readings_out, stats.duplicates_collapsed
    );

    (MergedSeries { readings }, stats)
}

/// Nearest whole second; half a second and above rounds up.
pub fn round_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = ts.nanosecond();
    let truncated = ts.with_nanosecond(0).unwrap_or(ts);
    if nanos >= 500_000_000 {
        truncated + TimeDelta::seconds(1)
    } else {
        truncated
    }
}
