//! Timestamps used on disk and conversions to absolute UTC instants.
//!
//! Waveforms carry a [`chrono::DateTime<Utc>`]. File headers store time as
//! calendar fields instead: [`NanoTime`] (year + day-of-year + time) is the
//! general form, and [`BTime`] is the 10-byte SEED representation with
//! 0.0001-second resolution.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, TimeZone, Timelike, Utc};

use crate::{DataFileError, Result};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanosecond-precision calendar timestamp (year + day-of-year + time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanoTime {
    pub year: u16,
    pub day: u16,        // 1-366
    pub hour: u8,        // 0-23
    pub minute: u8,      // 0-59
    pub second: u8,      // 0-60
    pub nanosecond: u32, // 0-999_999_999
}

impl NanoTime {
    /// Create a NanoTime with default epoch (1970-001 00:00:00.000000000).
    pub fn epoch() -> Self {
        Self {
            year: 1970,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
        }
    }

    /// Create a NanoTime from a [`BTime`] value.
    pub fn from_btime(bt: &BTime) -> Self {
        Self {
            year: bt.year,
            day: bt.day,
            hour: bt.hour,
            minute: bt.minute,
            second: bt.second,
            nanosecond: bt.fract as u32 * 100_000, // 0.0001s = 100_000ns
        }
    }

    /// Convert to a [`BTime`], truncating to 0.0001-second units.
    pub fn to_btime(self) -> BTime {
        BTime {
            year: self.year,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            fract: (self.nanosecond / 100_000) as u16,
        }
    }

    /// Break an absolute instant into calendar fields.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year() as u16,
            day: dt.ordinal() as u16,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            nanosecond: dt.nanosecond().min(999_999_999),
        }
    }

    /// Resolve the calendar fields to an absolute instant.
    ///
    /// A leap second (`second == 60`) rolls over into the next minute.
    pub fn to_datetime(self) -> Result<DateTime<Utc>> {
        let date = NaiveDate::from_yo_opt(self.year as i32, self.day as u32).ok_or_else(|| {
            DataFileError::InvalidHeader(format!("invalid date {}-{:03}", self.year, self.day))
        })?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| DataFileError::InvalidHeader(format!("invalid time {self}")))?;
        let offset = TimeDelta::hours(self.hour as i64)
            + TimeDelta::minutes(self.minute as i64)
            + TimeDelta::seconds(self.second as i64)
            + TimeDelta::nanoseconds(self.nanosecond as i64);
        Ok(Utc.from_utc_datetime(&midnight) + offset)
    }
}

impl Default for NanoTime {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for NanoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:09}",
            self.year, self.day, self.hour, self.minute, self.second, self.nanosecond
        )
    }
}

impl From<BTime> for NanoTime {
    fn from(bt: BTime) -> Self {
        Self::from_btime(&bt)
    }
}

impl From<NanoTime> for BTime {
    fn from(nt: NanoTime) -> Self {
        nt.to_btime()
    }
}

/// BTIME timestamp (10 bytes in the SEED fixed header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTime {
    pub year: u16,
    pub day: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub fract: u16, // 0.0001 second units
}

impl fmt::Display for BTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:04}",
            self.year, self.day, self.hour, self.minute, self.second, self.fract
        )
    }
}

/// Nanoseconds since the Unix epoch.
pub fn epoch_nanos(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp() * NANOS_PER_SECOND + dt.timestamp_subsec_nanos() as i64
}

/// Inverse of [`epoch_nanos`].
pub fn from_epoch_nanos(nanos: i64) -> DateTime<Utc> {
    let secs = nanos.div_euclid(NANOS_PER_SECOND);
    let nsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    DateTime::from_timestamp(secs, nsec).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Instant from fractional milliseconds since the Unix epoch.
pub fn from_epoch_millis(millis: f64) -> DateTime<Utc> {
    from_epoch_nanos((millis * 1_000_000.0).round() as i64)
}

/// Round an instant to the nearest millisecond.
pub fn round_to_millis(dt: &DateTime<Utc>) -> DateTime<Utc> {
    let millis = (epoch_nanos(dt) + 500_000).div_euclid(1_000_000);
    from_epoch_nanos(millis * 1_000_000)
}

/// Fractional seconds since the Unix epoch.
pub fn epoch_seconds(dt: &DateTime<Utc>) -> f64 {
    epoch_nanos(dt) as f64 / NANOS_PER_SECOND as f64
}
