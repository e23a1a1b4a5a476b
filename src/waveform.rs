//! The uniform in-memory waveform.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::channel::ChannelIdentity;

/// Sample value marking a position with no recorded data.
pub const NO_DATA: i32 = i32::MIN;

/// Waveforms of one file, one per channel.
pub type ChannelMap = BTreeMap<ChannelIdentity, Waveform>;

/// An evenly sampled integer time series.
///
/// `start` is the timestamp of `samples[0]`. The sample count is always
/// `samples.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub start: DateTime<Utc>,
    /// Samples per second.
    pub sample_rate: f64,
    pub samples: Vec<i32>,
}

impl Waveform {
    pub fn new(start: DateTime<Utc>, sample_rate: f64, samples: Vec<i32>) -> Self {
        Self {
            start,
            sample_rate,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Seconds between samples.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Sample period rounded to whole nanoseconds.
    pub fn period_nanos(&self) -> i64 {
        period_nanos(self.sample_rate)
    }

    /// Timestamp of sample `index`.
    pub fn time_of(&self, index: usize) -> DateTime<Utc> {
        self.start + TimeDelta::nanoseconds(self.period_nanos() * index as i64)
    }

    /// Time just past the last sample.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time_of(self.samples.len())
    }

    /// Number of samples holding [`NO_DATA`].
    pub fn gap_count(&self) -> usize {
        self.samples.iter().filter(|&&s| s == NO_DATA).count()
    }

    /// Cut into consecutive pieces of at most `max_samples` samples.
    pub fn split(&self, max_samples: usize) -> Vec<Waveform> {
        if max_samples == 0 {
            return vec![self.clone()];
        }
        self.samples
            .chunks(max_samples)
            .enumerate()
            .map(|(i, chunk)| Waveform {
                start: self.time_of(i * max_samples),
                sample_rate: self.sample_rate,
                samples: chunk.to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} Hz | {} samples",
            self.start.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
            self.sample_rate,
            self.samples.len()
        )
    }
}

/// Sample period in nanoseconds for a rate in Hz.
pub fn period_nanos(sample_rate: f64) -> i64 {
    (1e9 / sample_rate).round() as i64
}
