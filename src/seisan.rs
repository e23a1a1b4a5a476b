//! Seisan event files.
//!
//! An event file is a sequence of Fortran unformatted records, each framed
//! as `[len][payload][len]`. The integer width and byte order of the length
//! words depend on the machine that wrote the file and are detected from
//! the first record, whose payload is always 80 bytes long.
//!
//! Layout: an event header of at least 12 lines, then for each channel one
//! 1040-byte channel header followed by sample records.

use std::io::Write;
use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc};
use tracing::debug;

use crate::channel::ChannelIdentity;
use crate::time::{epoch_seconds, round_to_millis};
use crate::types::ByteOrder;
use crate::waveform::{ChannelMap, Waveform};
use crate::{DataFileError, Result};

/// Length of an event header line.
pub const LINE_LENGTH: usize = 80;

/// Length of a channel header as written.
pub const CHANNEL_HEADER_LENGTH: usize = 1040;

/// Shortest channel header the reader accepts: through the width digit.
const MIN_CHANNEL_HEADER: usize = 77;

const MIN_HEADER_LINES: usize = 12;
const SLOTS_PER_LINE: usize = 3;
const SLOT_WIDTH: usize = 26;

/// Byte order and integer width of the Fortran record length words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    pub byte_order: ByteOrder,
    pub int_width: usize,
}

impl Architecture {
    /// What the writer always emits.
    pub const CANONICAL: Architecture = Architecture {
        byte_order: ByteOrder::Big,
        int_width: 4,
    };

    /// Detect the architecture from the first 8 bytes of a file.
    ///
    /// The first record is an 80-byte line, so its length word is `0x50`
    /// in one of four encodings. A little-endian word starts with `0x50`.
    /// In an 8-byte file, byte 7 is either the low byte of a big-endian
    /// length or the high zero byte of a little-endian one.
    pub fn detect(head: &[u8]) -> Result<Self> {
        if head.len() < 8 {
            return Err(DataFileError::UnexpectedEndOfInput {
                expected: 8,
                actual: head.len(),
            });
        }
        let byte_order = if head[0] == 0x50 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        let int_width = if head[7] == 0x50 || head[7] == 0x00 {
            8
        } else {
            4
        };
        Ok(Self {
            byte_order,
            int_width,
        })
    }

    fn length_word(self, len: usize) -> Result<Vec<u8>> {
        let too_long = || DataFileError::EncodeError(format!("record of {len} bytes is too long"));
        match self.int_width {
            8 => {
                let v = i64::try_from(len).map_err(|_| too_long())?;
                Ok(match self.byte_order {
                    ByteOrder::Big => v.to_be_bytes().to_vec(),
                    ByteOrder::Little => v.to_le_bytes().to_vec(),
                })
            }
            _ => {
                let v = i32::try_from(len).map_err(|_| too_long())?;
                Ok(self.byte_order.i32_bytes(v).to_vec())
            }
        }
    }
}

/// Cursor over the Fortran records of an event file.
pub struct RecordReader<'a> {
    data: &'a [u8],
    offset: usize,
    arch: Architecture,
}

impl<'a> RecordReader<'a> {
    /// Detect the architecture and position at the first record.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let arch = Architecture::detect(data)?;
        Ok(Self::with_architecture(data, arch))
    }

    pub fn with_architecture(data: &'a [u8], arch: Architecture) -> Self {
        Self {
            data,
            offset: 0,
            arch,
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    /// Read one record and return its payload.
    pub fn read_record(&mut self) -> Result<&'a [u8]> {
        let leading = self.read_length()?;
        let len = usize::try_from(leading).map_err(|_| {
            DataFileError::InvalidHeader(format!("negative record length {leading}"))
        })?;
        let available = self.data.len() - self.offset;
        if available < len {
            return Err(DataFileError::UnexpectedEndOfInput {
                expected: len,
                actual: available,
            });
        }
        let payload = &self.data[self.offset..self.offset + len];
        self.offset += len;

        let trailing = self.read_length()?;
        if trailing != leading {
            return Err(DataFileError::CorruptRecord {
                leading: leading as u64,
                trailing: trailing as u64,
            });
        }
        Ok(payload)
    }

    fn read_length(&mut self) -> Result<i64> {
        let width = self.arch.int_width;
        let available = self.data.len() - self.offset;
        if available < width {
            return Err(DataFileError::UnexpectedEndOfInput {
                expected: width,
                actual: available,
            });
        }
        let value = self
            .arch
            .byte_order
            .read_int(&self.data[self.offset..self.offset + width])?;
        self.offset += width;
        Ok(value)
    }
}

/// Write one Fortran record.
pub fn write_record<W: Write>(out: &mut W, payload: &[u8], arch: Architecture) -> Result<()> {
    let word = arch.length_word(payload.len())?;
    out.write_all(&word)?;
    out.write_all(payload)?;
    out.write_all(&word)?;
    Ok(())
}

/// Number of event header lines for a channel count.
///
/// One line per three channels after two fixed lines, never fewer than 12.
pub fn header_line_count(channel_count: usize) -> usize {
    (2 + (channel_count + 2) / SLOTS_PER_LINE).max(MIN_HEADER_LINES)
}

/// Decoded fields of a channel header.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHeader {
    pub identity: ChannelIdentity,
    pub start: DateTime<Utc>,
    pub sample_rate: f64,
    pub sample_count: usize,
    /// Bytes per sample in the data records.
    pub sample_width: usize,
}

impl ChannelHeader {
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < MIN_CHANNEL_HEADER {
            return Err(DataFileError::UnexpectedEndOfInput {
                expected: MIN_CHANNEL_HEADER,
                actual: header.len(),
            });
        }

        let sample_rate: f64 = field(header, 36..43, "sample rate")?;
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(DataFileError::InvalidHeader(format!(
                "sample rate {sample_rate} is not positive"
            )));
        }

        let sample_width = match header[76] {
            b' ' | b'2' => 2,
            b'4' => 4,
            b'8' => 8,
            other => {
                return Err(DataFileError::InvalidHeader(format!(
                    "sample width {:?}",
                    other as char
                )));
            }
        };

        Ok(Self {
            identity: channel_identity(header),
            start: start_time(header)?,
            sample_rate,
            sample_count: field(header, 43..50, "sample count")?,
            sample_width,
        })
    }

    fn for_waveform(identity: &ChannelIdentity, wave: &Waveform) -> Self {
        Self {
            identity: identity.clone(),
            start: wave.start,
            sample_rate: wave.sample_rate,
            sample_count: wave.len(),
            sample_width: 4,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![b' '; CHANNEL_HEADER_LENGTH];
        let id = &self.identity;
        put_code(&mut buf, "station", id.station(), &[0, 1, 2, 3, 4])?;
        put_code(&mut buf, "component", id.component(), &[5, 6, 8])?;
        put_code(&mut buf, "network", id.network(), &[16, 19])?;
        put_code(&mut buf, "location", id.location(), &[7, 12])?;

        let t = round_to_millis(&self.start);
        put(&mut buf, 9, 3, "year", &format!("{:>3}", t.year() - 1900))?;
        put(&mut buf, 13, 3, "day of year", &format!("{:>3}", t.ordinal()))?;
        put(&mut buf, 17, 2, "month", &format!("{:>2}", t.month()))?;
        put(&mut buf, 20, 2, "day", &format!("{:>2}", t.day()))?;
        put(&mut buf, 23, 2, "hour", &format!("{:>2}", t.hour()))?;
        put(&mut buf, 26, 2, "minute", &format!("{:>2}", t.minute()))?;
        put(&mut buf, 29, 6, "seconds", &format!("{:>6.3}", seconds_of(&t)))?;
        put_float(&mut buf, 36, 7, 3, "sample rate", self.sample_rate)?;
        put(&mut buf, 43, 7, "sample count", &format!("{:>7}", self.sample_count))?;
        buf[76] = b'0' + self.sample_width as u8;
        Ok(buf)
    }
}

/// True when byte 7 holds the third component character.
///
/// Earthworm before 7.7 wrote it there instead of at byte 8. A slice too
/// short to hold byte 8 never has the legacy layout.
pub fn has_legacy_component_layout(header: &[u8]) -> bool {
    let orientation = |b: u8| matches!(b, b'E' | b'Z' | b'N');
    match header.get(7..9) {
        Some(&[at7, at8]) => orientation(at7) && !orientation(at8),
        _ => false,
    }
}

fn channel_identity(header: &[u8]) -> ChannelIdentity {
    let (component, location) = if has_legacy_component_layout(header) {
        (
            ascii(&[header[5], header[6], header[7]]),
            ascii(&[header[8], header[12]]),
        )
    } else {
        (
            ascii(&[header[5], header[6], header[8]]),
            ascii(&[header[7], header[12]]),
        )
    };
    let location = if location.trim() == "--" { "" } else { location.as_str() };

    ChannelIdentity::builder()
        .station(&ascii(&header[0..5]))
        .component(&component)
        .network(&ascii(&[header[16], header[19]]))
        .location(location)
        .build()
}

fn start_time(header: &[u8]) -> Result<DateTime<Utc>> {
    let year: i32 = field(header, 9..12, "year")?;
    let month: u32 = field(header, 17..19, "month")?;
    let day: u32 = field(header, 20..22, "day")?;
    let hour: i64 = field(header, 23..25, "hour")?;
    let minute: i64 = field(header, 26..28, "minute")?;
    let seconds: f64 = field(header, 29..35, "seconds")?;

    let date = NaiveDate::from_ymd_opt(year + 1900, month, day).ok_or_else(|| {
        DataFileError::InvalidHeader(format!("date {}-{month}-{day}", year + 1900))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DataFileError::InvalidHeader("midnight".into()))?
        .and_utc();
    Ok(midnight
        + TimeDelta::hours(hour)
        + TimeDelta::minutes(minute)
        + TimeDelta::milliseconds((seconds * 1000.0).round() as i64))
}

fn ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn field<T: FromStr>(header: &[u8], range: Range<usize>, name: &str) -> Result<T> {
    let text = ascii(&header[range]);
    text.trim()
        .parse()
        .map_err(|_| DataFileError::InvalidHeader(format!("{name}: {text:?}")))
}

/// Copy a pre-formatted value into a fixed-width field.
fn put(buf: &mut [u8], at: usize, width: usize, name: &'static str, text: &str) -> Result<()> {
    if text.len() > width {
        return Err(DataFileError::FieldOverflow {
            field: name,
            width,
            value: text.to_string(),
        });
    }
    buf[at..at + text.len()].copy_from_slice(text.as_bytes());
    Ok(())
}

/// Right-align a float, giving up decimals until it fits.
fn put_float(
    buf: &mut [u8],
    at: usize,
    width: usize,
    decimals: usize,
    name: &'static str,
    value: f64,
) -> Result<()> {
    let text = (0..=decimals)
        .rev()
        .map(|p| format!("{value:>width$.p$}"))
        .find(|s| s.len() <= width)
        .unwrap_or_else(|| format!("{value:.0}"));
    put(buf, at, width, name, &text)
}

/// Scatter the characters of a code over the given byte positions.
fn put_code(buf: &mut [u8], name: &'static str, code: &str, positions: &[usize]) -> Result<()> {
    if code.len() > positions.len() || !code.is_ascii() {
        return Err(DataFileError::FieldOverflow {
            field: name,
            width: positions.len(),
            value: code.to_string(),
        });
    }
    for (&pos, b) in positions.iter().zip(code.bytes()) {
        buf[pos] = b;
    }
    Ok(())
}

fn seconds_of(t: &DateTime<Utc>) -> f64 {
    t.second() as f64 + t.timestamp_subsec_millis() as f64 / 1000.0
}

/// Read a whole event file.
pub fn read_event(data: &[u8]) -> Result<ChannelMap> {
    let mut reader = RecordReader::new(data)?;
    let arch = reader.architecture();
    debug!(
        byte_order = %arch.byte_order,
        int_width = arch.int_width,
        "detected event file architecture"
    );

    let first = reader.read_record()?;
    if first.len() < 33 {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: 33,
            actual: first.len(),
        });
    }
    let channel_count: usize = field(first, 30..33, "channel count")?;
    debug!(channels = channel_count, "read event header");
    for _ in 1..header_line_count(channel_count) {
        reader.read_record()?;
    }

    let mut channels = ChannelMap::new();
    for _ in 0..channel_count {
        let header = ChannelHeader::parse(reader.read_record()?)?;
        let samples = read_samples(&mut reader, &header)?;
        channels.insert(
            header.identity,
            Waveform::new(header.start, header.sample_rate, samples),
        );
    }
    Ok(channels)
}

fn read_samples(reader: &mut RecordReader<'_>, header: &ChannelHeader) -> Result<Vec<i32>> {
    let count = header.sample_count;
    let width = header.sample_width;
    let byte_order = reader.architecture().byte_order;
    let mut samples = Vec::with_capacity(count);

    while samples.len() < count {
        let record = reader.read_record()?;
        if record.len() % width != 0 {
            return Err(DataFileError::InvalidHeader(format!(
                "data record of {} bytes holds partial {width}-byte samples",
                record.len()
            )));
        }
        let total = samples.len() + record.len() / width;
        if total > count {
            return Err(DataFileError::SampleCountMismatch {
                expected: count,
                actual: total,
            });
        }
        for chunk in record.chunks_exact(width) {
            samples.push(byte_order.read_int(chunk)? as i32);
        }
    }
    Ok(samples)
}

/// Write an event file in the canonical architecture.
///
/// Output is assembled in memory first, so a field that does not fit
/// leaves `out` untouched.
pub fn write_event<W: Write>(out: &mut W, channels: &ChannelMap) -> Result<()> {
    let bytes = encode_event(channels, Architecture::CANONICAL)?;
    out.write_all(&bytes)?;
    Ok(())
}

pub(crate) fn encode_event(channels: &ChannelMap, arch: Architecture) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for line in event_header(channels)? {
        write_record(&mut buf, &line, arch)?;
    }
    for (identity, wave) in channels {
        let header = ChannelHeader::for_waveform(identity, wave);
        write_record(&mut buf, &header.to_bytes()?, arch)?;
        if !wave.is_empty() {
            let payload: Vec<u8> = wave
                .samples
                .iter()
                .flat_map(|&s| arch.byte_order.i32_bytes(s))
                .collect();
            write_record(&mut buf, &payload, arch)?;
        }
    }
    Ok(buf)
}

fn event_header(channels: &ChannelMap) -> Result<Vec<Vec<u8>>> {
    let blank = vec![b' '; LINE_LENGTH];
    let mut first = blank.clone();
    put(&mut first, 30, 3, "channel count", &format!("{:>3}", channels.len()))?;

    let file_start = channels.values().map(|w| w.start).min();
    let file_end = channels.values().map(|w| w.end_time()).max();
    if let (Some(start), Some(end)) = (file_start, file_end) {
        let t = round_to_millis(&start);
        put(&mut first, 33, 3, "year", &format!("{:>3}", t.year() - 1900))?;
        put(&mut first, 37, 3, "day of year", &format!("{:>3}", t.ordinal()))?;
        put(&mut first, 41, 2, "month", &format!("{:>2}", t.month()))?;
        put(&mut first, 44, 2, "day", &format!("{:>2}", t.day()))?;
        put(&mut first, 47, 2, "hour", &format!("{:>2}", t.hour()))?;
        put(&mut first, 50, 2, "minute", &format!("{:>2}", t.minute()))?;
        put(&mut first, 53, 6, "seconds", &format!("{:>6.3}", seconds_of(&t)))?;
        let span = epoch_seconds(&end) - epoch_seconds(&start);
        put_float(&mut first, 60, 9, 3, "file span", span)?;
    }

    let mut lines = vec![first, blank.clone()];
    let file_start = file_start.unwrap_or_default();
    for row in channels.iter().collect::<Vec<_>>().chunks(SLOTS_PER_LINE) {
        let mut line = blank.clone();
        for (slot, (identity, wave)) in row.iter().enumerate() {
            let base = slot * SLOT_WIDTH;
            let station_at = [base + 1, base + 2, base + 3, base + 4, base + 9];
            put_code(&mut line, "station", identity.station(), &station_at)?;
            let component_at = [base + 5, base + 6, base + 8];
            put_code(&mut line, "component", identity.component(), &component_at)?;

            let offset = epoch_seconds(&wave.start) - epoch_seconds(&file_start);
            put_float(&mut line, base + 10, 7, 2, "start offset", offset)?;
            let duration = wave.len().saturating_sub(1) as f64 * wave.sample_period();
            put_float(&mut line, base + 18, 8, 2, "duration", duration)?;
        }
        lines.push(line);
    }

    lines.resize(header_line_count(channels.len()), blank);
    Ok(lines)
}
