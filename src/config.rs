use chrono::{NaiveDateTime, TimeDelta};
use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;

pub use crate::parsers::LogFormat;

/// Legacy recorders write exactly one reading per this many seconds.
pub const SAMPLE_PERIOD_SECS: i64 = 1;

/// Gaps shorter than this are reported as short dropouts.
pub const SHORT_GAP_SECS: i64 = 3;

/// Serialized timestamp layout; the fraction is only written when non-zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One logged measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub power: f64,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, power: f64) -> Self {
        Self { timestamp, power }
    }
}

/// An input file together with the format it was parsed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub format: LogFormat,
}

/// Numeric precision of the stored power values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Keep full `f64` precision.
    #[default]
    Full,
    /// Round every value through `f32` to save space downstream.
    Single,
}

impl Precision {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Precision::Full => value,
            Precision::Single => value as f32 as f64,
        }
    }
}

/// How each input file is assigned a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DetectMode {
    /// Inspect the content, falling back to the file name when inconclusive.
    #[default]
    Auto,
    /// Use the `power_log` naming convention, rejecting files whose content disagrees.
    Name,
    /// Treat every file as a directly timestamped power log.
    PowerLog,
    /// Treat every file as a header-timestamped legacy log.
    Legacy,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(serialize_with = "serialize_secs")]
    pub sample_period: TimeDelta,
    #[serde(serialize_with = "serialize_secs")]
    pub short_gap: TimeDelta,
    pub precision: Precision,
    pub detect: DetectMode,
    pub round_seconds: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_period: TimeDelta::seconds(SAMPLE_PERIOD_SECS),
            short_gap: TimeDelta::seconds(SHORT_GAP_SECS),
            precision: Precision::default(),
            detect: DetectMode::default(),
            round_seconds: false,
        }
    }
}

pub(crate) fn serialize_secs<S>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let secs = delta.num_milliseconds() as f64 / 1000.0;
    serializer.serialize_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_precision_rounds_through_f32() {
        let v = 0.1_f64;
        assert_eq!(Precision::Full.apply(v), 0.1);
        assert_eq!(Precision::Single.apply(v), 0.1_f32 as f64);
        assert_ne!(Precision::Single.apply(v), v);
    }

    #[test]
    fn default_config_uses_one_second_period() {
        let cfg = Config::default();
        assert_eq!(cfg.sample_period, TimeDelta::seconds(1));
        assert_eq!(cfg.short_gap, TimeDelta::seconds(3));
        assert_eq!(cfg.detect, DetectMode::Auto);
        assert!(!cfg.round_seconds);
    }

    #[test]
    fn config_dumps_as_json() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"sample_period\":1.0"));
        assert!(json.contains("\"detect\":\"auto\""));
    }
}
