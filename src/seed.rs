//! SEED / miniSEED archives.
//!
//! An archive is a stream of fixed-length data records, usually many per
//! channel. Reading assembles each channel's records into one continuous
//! [`Waveform`], filling holes with [`NO_DATA`]. Writing cuts waveforms back
//! into records.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::{debug, warn};

use crate::channel::ChannelIdentity;
use crate::encode::encode;
use crate::reader::{DEFAULT_RECORD_LENGTH, SeedReader};
use crate::record::{MseedRecord, Samples};
use crate::time::{NanoTime, from_epoch_nanos};
use crate::types::{ByteOrder, EncodingFormat};
use crate::waveform::{ChannelMap, NO_DATA, Waveform, period_nanos};
use crate::{DataFileError, Result};

/// Record layout used when reading and writing archives.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedOptions {
    /// Most samples packed into one written record.
    pub samples_per_record: usize,
    /// Written record length in bytes, a power of two.
    pub record_length: u32,
    pub encoding: EncodingFormat,
    pub byte_order: ByteOrder,
    /// How far the reader skips past an unreadable record header before it
    /// has seen a good record.
    pub fallback_record_length: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            samples_per_record: 512,
            record_length: 4096,
            encoding: EncodingFormat::Steim2,
            byte_order: ByteOrder::Big,
            fallback_record_length: DEFAULT_RECORD_LENGTH,
        }
    }
}

impl SeedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples_per_record(mut self, n: usize) -> Self {
        self.samples_per_record = n.max(1);
        self
    }

    pub fn with_record_length(mut self, len: u32) -> Self {
        self.record_length = len;
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

    pub fn with_fallback_record_length(mut self, len: usize) -> Self {
        self.fallback_record_length = len;
        self
    }
}

/// Most samples a joined waveform may hold (one GiB of `i32`).
pub const MAX_JOINED_SAMPLES: usize = 1 << 28;

/// The record segments of one channel, keyed by start time in epoch
/// nanoseconds.
///
/// A segment with the same start as an earlier one replaces it.
#[derive(Debug, Default, Clone)]
pub struct Segments {
    segments: BTreeMap<i64, Vec<i32>>,
    /// Rate of the most recently added segment.
    sample_rate: f64,
}

impl Segments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, start_ns: i64, sample_rate: f64, samples: Vec<i32>) {
        self.sample_rate = sample_rate;
        self.segments.insert(start_ns, samples);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Remove segments starting too far from the median start to be
    /// joined with it, returning their start times.
    ///
    /// A single record with a damaged year would otherwise stretch the
    /// joined waveform over decades.
    pub fn drop_outliers(&mut self) -> Vec<i64> {
        let starts: Vec<i64> = self.segments.keys().copied().collect();
        let Some(&median) = starts.get(starts.len() / 2) else {
            return Vec::new();
        };
        let reach = period_nanos(self.sample_rate) as f64 * (MAX_JOINED_SAMPLES / 4) as f64;
        let outliers: Vec<i64> = starts
            .into_iter()
            .filter(|&start| (start as i128 - median as i128).abs() as f64 > reach)
            .collect();
        for start in &outliers {
            self.segments.remove(start);
        }
        outliers
    }

    /// Merge all segments into one waveform.
    ///
    /// Each segment lands at the sample index nearest its start. Positions
    /// no segment covers hold [`NO_DATA`]. Where segments overlap, the one
    /// starting later wins. A join longer than [`MAX_JOINED_SAMPLES`] fails
    /// with [`DataFileError::InvalidHeader`] before anything is allocated.
    pub fn join(&self) -> Result<Option<Waveform>> {
        let Some((&first, _)) = self.segments.first_key_value() else {
            return Ok(None);
        };
        let period = period_nanos(self.sample_rate) as f64;
        let offset_of = |start: i64| ((start as i128 - first as i128) as f64 / period).round();

        let span = self
            .segments
            .iter()
            .map(|(&start, samples)| offset_of(start) + samples.len() as f64)
            .fold(0.0, f64::max);
        if span > MAX_JOINED_SAMPLES as f64 {
            return Err(DataFileError::InvalidHeader(format!(
                "joined span of {span} samples exceeds {MAX_JOINED_SAMPLES}"
            )));
        }
        let index_of = |start: i64| offset_of(start) as usize;

        let mut buffer = vec![NO_DATA; span as usize];
        for (&start, samples) in &self.segments {
            let at = index_of(start);
            buffer[at..at + samples.len()].copy_from_slice(samples);
        }
        Ok(Some(Waveform::new(
            from_epoch_nanos(first),
            self.sample_rate,
            buffer,
        )))
    }
}

/// Read every data record of an archive and join them per channel.
///
/// Bad records are logged and skipped; reading never fails.
pub fn read_archive(data: &[u8], options: &SeedOptions) -> ChannelMap {
    let mut segments: BTreeMap<ChannelIdentity, Segments> = BTreeMap::new();
    let reader = SeedReader::new(data).with_fallback_record_length(options.fallback_record_length);

    for (index, result) in reader.enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(DataFileError::UnexpectedEndOfInput { expected, actual }) => {
                warn!(index, expected, actual, "archive ends inside a record");
                continue;
            }
            Err(e) => {
                warn!(index, error = %e, "skipping unreadable record");
                continue;
            }
        };
        if let Err(e) = add_record(&mut segments, record) {
            warn!(index, error = %e, "skipping record");
        }
    }

    let mut channels = ChannelMap::new();
    for (id, mut segs) in segments {
        for start in segs.drop_outliers() {
            warn!(
                channel = %id,
                start = %from_epoch_nanos(start),
                "dropping record far from the rest of its channel"
            );
        }
        match segs.join() {
            Ok(Some(wave)) => {
                channels.insert(id, wave);
            }
            Ok(None) => {}
            Err(e) => warn!(channel = %id, error = %e, "skipping channel"),
        }
    }
    debug!(channels = channels.len(), "assembled archive");
    channels
}

fn add_record(
    segments: &mut BTreeMap<ChannelIdentity, Segments>,
    record: MseedRecord,
) -> Result<()> {
    if record.samples.is_empty() {
        return Ok(());
    }
    if !(record.sample_rate > 0.0) {
        return Err(DataFileError::InvalidHeader(format!(
            "sample rate {} in record {}",
            record.sample_rate, record.sequence_number
        )));
    }
    let start = record
        .start_time
        .to_datetime()?
        .timestamp_nanos_opt()
        .ok_or_else(|| {
            DataFileError::InvalidHeader(format!("start time {} out of range", record.start_time))
        })?;
    segments.entry(record.identity()).or_default().insert(
        start,
        record.sample_rate,
        record.samples.into_ints(),
    );
    Ok(())
}

/// Cut a waveform into record-sized pieces, leaving out gaps.
fn record_chunks(wave: &Waveform, samples_per_record: usize) -> Vec<Waveform> {
    let mut chunks = Vec::new();
    let mut run_start = None;
    for i in 0..=wave.len() {
        let is_data = i < wave.len() && wave.samples[i] != NO_DATA;
        match (run_start, is_data) {
            (None, true) => run_start = Some(i),
            (Some(s), false) => {
                let run = Waveform::new(
                    wave.time_of(s),
                    wave.sample_rate,
                    wave.samples[s..i].to_vec(),
                );
                chunks.extend(run.split(samples_per_record));
                run_start = None;
            }
            _ => {}
        }
    }
    chunks
}

/// Write all channels as data records.
///
/// Every record that can be encoded is written. If any could not be,
/// the remaining records are still flushed and the loss is reported as
/// [`DataFileError::RecordsDropped`].
pub fn write_archive<W: Write>(
    out: &mut W,
    channels: &ChannelMap,
    options: &SeedOptions,
) -> Result<()> {
    let mut sequence = 1u32;
    let mut total = 0;
    let mut dropped = 0;

    for (identity, wave) in channels {
        let chunks = record_chunks(wave, options.samples_per_record);
        if chunks.is_empty() {
            warn!(
                channel = %identity,
                samples = wave.len(),
                "channel has no data to write"
            );
        }
        for chunk in chunks {
            total += 1;
            let record = MseedRecord::new()
                .with_identity(identity)
                .with_sequence(sequence)
                .with_start_time(NanoTime::from_datetime(&chunk.start))
                .with_sample_rate(chunk.sample_rate)
                .with_encoding(options.encoding)
                .with_byte_order(options.byte_order)
                .with_record_length(options.record_length)
                .with_samples(samples_for(options.encoding, chunk.samples));
            match encode(&record) {
                Ok(bytes) => {
                    out.write_all(&bytes)?;
                    sequence += 1;
                }
                Err(e) => {
                    warn!(
                        channel = %identity,
                        start = %record.start_time,
                        error = %e,
                        "dropping record"
                    );
                    dropped += 1;
                }
            }
        }
    }
    out.flush()?;

    debug!(written = total - dropped, "wrote archive");
    if dropped > 0 {
        return Err(DataFileError::RecordsDropped { dropped, total });
    }
    Ok(())
}

fn samples_for(encoding: EncodingFormat, ints: Vec<i32>) -> Samples {
    match encoding {
        EncodingFormat::Float32 => Samples::Float(ints.into_iter().map(|v| v as f32).collect()),
        EncodingFormat::Float64 => Samples::Double(ints.into_iter().map(f64::from).collect()),
        _ => Samples::Int(ints),
    }
}
