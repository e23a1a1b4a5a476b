//! A single SEED data record.
//!
//! [`MseedRecord`] is what [`decode`](crate::decode::decode) produces and
//! [`encode`](crate::encode::encode) consumes. The archive assembler in
//! [`seed`](crate::seed) joins many of them into one waveform per channel.

use std::fmt;

use crate::channel::ChannelIdentity;
use crate::time::NanoTime;
use crate::types::{ByteOrder, EncodingFormat};

/// A decoded SEED v2 data record.
#[derive(Debug, Clone, PartialEq)]
pub struct MseedRecord {
    // --- Identification ---
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,

    // --- Time + Data ---
    pub start_time: NanoTime,
    pub sample_rate: f64,
    pub encoding: EncodingFormat,
    pub samples: Samples,

    // --- Framing ---
    pub sequence_number: String,
    pub quality: char,
    pub byte_order: ByteOrder,
    /// Record length in bytes, a power of two.
    pub record_length: u32,
}

impl MseedRecord {
    /// Create a new `MseedRecord`.
    ///
    /// Defaults: sequence "000001", quality 'D', empty NSLC,
    /// big-endian, 4096-byte records, Steim2, no samples.
    pub fn new() -> Self {
        Self {
            network: String::new(),
            station: String::new(),
            location: String::new(),
            channel: String::new(),
            start_time: NanoTime::epoch(),
            sample_rate: 1.0,
            encoding: EncodingFormat::Steim2,
            samples: Samples::Int(vec![]),
            sequence_number: "000001".into(),
            quality: 'D',
            byte_order: ByteOrder::Big,
            record_length: 4096,
        }
    }

    /// Set network, station, location, and channel codes.
    pub fn with_nslc(
        mut self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
    ) -> Self {
        self.network = network.into();
        self.station = station.into();
        self.location = location.into();
        self.channel = channel.into();
        self
    }

    /// Set the codes from a [`ChannelIdentity`].
    pub fn with_identity(self, id: &ChannelIdentity) -> Self {
        self.with_nslc(id.network(), id.station(), id.location(), id.component())
    }

    /// Set the six-digit sequence number.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence_number = format!("{:06}", sequence % 1_000_000);
        self
    }

    pub fn with_start_time(mut self, time: NanoTime) -> Self {
        self.start_time = time;
        self
    }

    /// Set the sample rate in Hz.
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_encoding(mut self, enc: EncodingFormat) -> Self {
        self.encoding = enc;
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_samples(mut self, samples: Samples) -> Self {
        self.samples = samples;
        self
    }

    /// Set the record length (power of 2).
    pub fn with_record_length(mut self, len: u32) -> Self {
        self.record_length = len;
        self
    }

    /// The channel identity of this record.
    pub fn identity(&self) -> ChannelIdentity {
        ChannelIdentity::new(&self.station, &self.channel, &self.network, &self.location)
    }

    /// Return the NSLC identifier: `"NET.STA.LOC.CHA"`.
    pub fn nslc(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl Default for MseedRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MseedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} Hz | {} samples ({})",
            self.nslc(),
            self.start_time,
            self.sample_rate,
            self.samples.len(),
            self.encoding,
        )
    }
}

/// Decoded sample data.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer view of the samples. Float samples are rounded.
    pub fn into_ints(self) -> Vec<i32> {
        match self {
            Samples::Int(v) => v,
            Samples::Float(v) => v.into_iter().map(|x| x.round() as i32).collect(),
            Samples::Double(v) => v.into_iter().map(|x| x.round() as i32).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        let id = ChannelIdentity::new("ANMO", "BHZ", "IU", "00");
        let record = MseedRecord::new().with_identity(&id);
        assert_eq!(record.nslc(), "IU.ANMO.00.BHZ");
        assert_eq!(record.identity(), id);
    }

    #[test]
    fn test_sequence_number_padding() {
        let record = MseedRecord::new().with_sequence(42);
        assert_eq!(record.sequence_number, "000042");
        let record = MseedRecord::new().with_sequence(1_000_001);
        assert_eq!(record.sequence_number, "000001");
    }

    #[test]
    fn test_float_samples_into_ints() {
        let s = Samples::Float(vec![1.4, -2.6]);
        assert_eq!(s.into_ints(), vec![1, -3]);
    }
}
