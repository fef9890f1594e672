use chrono::{NaiveDateTime, TimeDelta};
use log::{info, warn};
use serde::Serialize;

use crate::config::{Config, serialize_secs};
use crate::normalizer::MergedSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapKind {
    Short,
    Long,
}

/// Two adjacent samples further apart than one sample period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(rename = "seconds", serialize_with = "serialize_secs")]
    pub duration: TimeDelta,
    pub missing_samples: i64,
    pub kind: GapKind,
}

pub fn detect_gaps(series: &MergedSeries, config: &Config) -> Vec<Gap> {
    let period = config.sample_period;
    series
        .readings()
        .windows(2)
        .filter_map(|w| {
            let (start, end) = (w[0].timestamp, w[1].timestamp);
            let duration = end - start;
            (duration > period).then(|| Gap {
                start,
                end,
                duration,
                missing_samples: missing_samples(duration, period),
                kind: if duration < config.short_gap {
                    GapKind::Short
                } else {
                    GapKind::Long
                },
            })
        })
        .collect()
}

/// Sample slots that fit strictly between both ends of the gap.
fn missing_samples(duration: TimeDelta, period: TimeDelta) -> i64 {
    let (d, p) = match (duration.num_nanoseconds(), period.num_nanoseconds()) {
        (Some(d), Some(p)) if p > 0 => (d, p),
        _ => return duration.num_seconds().max(1) - 1,
    };
    (d + p - 1) / p - 1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapSummary {
    pub count: usize,
    pub short: usize,
    pub long: usize,
    pub missing_samples: i64,
    pub longest: Option<Gap>,
}

impl GapSummary {
    pub fn from_gaps(gaps: &[Gap]) -> Self {
        let short = gaps.iter().filter(|g| g.kind == GapKind::Short).count();
        Self {
            count: gaps.len(),
            short,
            long: gaps.len() - short,
            missing_samples: gaps.iter().map(|g| g.missing_samples).sum(),
            longest: gaps.iter().max_by_key(|g| g.duration).cloned(),
        }
    }
}

/// Log every gap; long ones as warnings.
pub fn log_gaps(gaps: &[Gap]) {
    for gap in gaps {
        let secs = gap.duration.num_milliseconds() as f64 / 1000.0;
        match gap.kind {
            GapKind::Long => warn!(
                "gap of {secs}s between {} and {} ({} samples missing)",
                gap.start, gap.end, gap.missing_samples
            ),
            GapKind::Short => info!(
                "short gap of {secs}s between {} and {}",
                gap.start, gap.end
            ),
        }
    }
}
