//! SAC binary files.
//!
//! A SAC file holds a single evenly sampled trace: a 632-byte header of 70
//! floats, 40 integers and 24 character fields, followed by `npts` 32-bit
//! float samples. Files are written in either byte order; the header
//! version word tells which.

use std::io::Write;

use chrono::{Datelike, NaiveDate, TimeDelta, Timelike};
use tracing::debug;

use crate::channel::ChannelIdentity;
use crate::time::round_to_millis;
use crate::types::ByteOrder;
use crate::waveform::Waveform;
use crate::{DataFileError, Result};

pub const HEADER_LENGTH: usize = 632;
pub const HEADER_VERSION: i32 = 6;

/// Value of any undefined numeric header field.
pub const UNDEFINED: i32 = -12345;
const UNDEFINED_TEXT: &str = "-12345";

// Byte offsets of the fields this crate uses.
const DELTA: usize = 0;
const DEPMIN: usize = 4;
const DEPMAX: usize = 8;
const B: usize = 20;
const E: usize = 24;
const DEPMEN: usize = 224;
const NZYEAR: usize = 280;
const NZJDAY: usize = 284;
const NZHOUR: usize = 288;
const NZMIN: usize = 292;
const NZSEC: usize = 296;
const NZMSEC: usize = 300;
const NVHDR: usize = 304;
const NPTS: usize = 316;
const IFTYPE: usize = 340;
const IDEP: usize = 344;
const IZTYPE: usize = 348;
const LEVEN: usize = 420;
const LPSPOL: usize = 424;
const LOVROK: usize = 428;
const LCALDA: usize = 432;
const KSTNM: usize = 440;
const KHOLE: usize = 464;
const KCMPNM: usize = 600;
const KNETWK: usize = 608;

const FLOATS_END: usize = 280;
const INTS_END: usize = 440;

const ITIME: i32 = 1;
const IUNKN: i32 = 5;
const IB: i32 = 9;

struct Header<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl Header<'_> {
    fn float(&self, at: usize) -> f32 {
        self.order.read_f32(&self.data[at..at + 4])
    }

    fn int(&self, at: usize) -> Result<i32> {
        Ok(self.order.read_int(&self.data[at..at + 4])? as i32)
    }

    /// A defined integer field.
    fn required(&self, at: usize, name: &str) -> Result<i32> {
        match self.int(at)? {
            UNDEFINED => Err(DataFileError::InvalidHeader(format!("{name} is undefined"))),
            v => Ok(v),
        }
    }

    fn text(&self, at: usize) -> String {
        let raw: String = self.data[at..at + 8].iter().map(|&b| b as char).collect();
        let trimmed = raw.trim_end_matches(['\0', ' ']).trim();
        if trimmed == UNDEFINED_TEXT {
            String::new()
        } else {
            trimmed.to_string()
        }
    }
}

fn detect_byte_order(data: &[u8]) -> Result<ByteOrder> {
    for order in [ByteOrder::Big, ByteOrder::Little] {
        if order.read_int(&data[NVHDR..NVHDR + 4])? == HEADER_VERSION as i64 {
            return Ok(order);
        }
    }
    Err(DataFileError::InvalidHeader(
        "header version is not 6 in either byte order".into(),
    ))
}

/// Read the single trace of a SAC file.
pub fn read_sac(data: &[u8]) -> Result<(ChannelIdentity, Waveform)> {
    if data.len() < HEADER_LENGTH {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: HEADER_LENGTH,
            actual: data.len(),
        });
    }
    let header = Header {
        data,
        order: detect_byte_order(data)?,
    };
    debug!(byte_order = %header.order, "reading SAC header");

    if header.int(LEVEN)? == 0 {
        return Err(DataFileError::InvalidHeader(
            "unevenly sampled traces are not supported".into(),
        ));
    }
    let delta = header.float(DELTA) as f64;
    if !(delta > 0.0) {
        return Err(DataFileError::InvalidHeader(format!("delta {delta}")));
    }

    let npts = usize::try_from(header.required(NPTS, "npts")?)
        .map_err(|_| DataFileError::InvalidHeader("negative npts".into()))?;
    let needed = HEADER_LENGTH + npts * 4;
    if data.len() < needed {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: needed,
            actual: data.len(),
        });
    }

    let year = header.required(NZYEAR, "nzyear")?;
    let jday = header.required(NZJDAY, "nzjday")?;
    let reference = NaiveDate::from_yo_opt(year, jday as u32)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DataFileError::InvalidHeader(format!("reference date {year}-{jday}")))?
        .and_utc()
        + TimeDelta::hours(header.required(NZHOUR, "nzhour")? as i64)
        + TimeDelta::minutes(header.required(NZMIN, "nzmin")? as i64)
        + TimeDelta::seconds(header.required(NZSEC, "nzsec")? as i64)
        + TimeDelta::milliseconds(header.required(NZMSEC, "nzmsec")? as i64);
    let begin = match header.float(B) {
        b if b == UNDEFINED as f32 => 0.0,
        b => b as f64,
    };
    let start = reference + TimeDelta::nanoseconds((begin * 1e9).round() as i64);

    let samples = data[HEADER_LENGTH..needed]
        .chunks_exact(4)
        .map(|b| header.order.read_f32(b).round() as i32)
        .collect();

    let identity = ChannelIdentity::builder()
        .station(&header.text(KSTNM))
        .component(&header.text(KCMPNM))
        .network(&header.text(KNETWK))
        .location(&header.text(KHOLE))
        .build();
    Ok((identity, Waveform::new(start, 1.0 / delta, samples)))
}

/// Big-endian header under construction, all fields undefined.
struct HeaderWriter {
    buf: Vec<u8>,
}

impl HeaderWriter {
    const ORDER: ByteOrder = ByteOrder::Big;

    fn new() -> Self {
        let mut buf = Vec::with_capacity(HEADER_LENGTH);
        for _ in (0..FLOATS_END).step_by(4) {
            buf.extend(Self::ORDER.f32_bytes(UNDEFINED as f32));
        }
        for _ in (FLOATS_END..INTS_END).step_by(4) {
            buf.extend(Self::ORDER.i32_bytes(UNDEFINED));
        }
        buf.extend(format!("{UNDEFINED_TEXT:<8}").bytes());
        buf.extend(format!("{UNDEFINED_TEXT:<16}").bytes());
        for _ in (KHOLE..HEADER_LENGTH).step_by(8) {
            buf.extend(format!("{UNDEFINED_TEXT:<8}").bytes());
        }
        Self { buf }
    }

    fn float(&mut self, at: usize, value: f32) {
        self.buf[at..at + 4].copy_from_slice(&Self::ORDER.f32_bytes(value));
    }

    fn int(&mut self, at: usize, value: i32) {
        self.buf[at..at + 4].copy_from_slice(&Self::ORDER.i32_bytes(value));
    }

    fn text(&mut self, at: usize, name: &'static str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if value.len() > 8 || !value.is_ascii() {
            return Err(DataFileError::FieldOverflow {
                field: name,
                width: 8,
                value: value.to_string(),
            });
        }
        self.buf[at..at + 8].copy_from_slice(format!("{value:<8}").as_bytes());
        Ok(())
    }
}

/// Write one trace as a big-endian SAC file.
pub fn write_sac<W: Write>(
    out: &mut W,
    identity: &ChannelIdentity,
    wave: &Waveform,
) -> Result<()> {
    let npts = i32::try_from(wave.len()).map_err(|_| {
        DataFileError::EncodeError(format!("{} samples exceed the SAC npts range", wave.len()))
    })?;
    let delta = wave.sample_period() as f32;
    let mut h = HeaderWriter::new();

    h.float(DELTA, delta);
    h.float(B, 0.0);
    h.float(E, delta * wave.len().saturating_sub(1) as f32);
    let data: Vec<f32> = wave.samples.iter().map(|&s| s as f32).collect();
    if !data.is_empty() {
        let min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64;
        h.float(DEPMIN, min);
        h.float(DEPMAX, max);
        h.float(DEPMEN, mean as f32);
    }

    let t = round_to_millis(&wave.start);
    h.int(NZYEAR, t.year());
    h.int(NZJDAY, t.ordinal() as i32);
    h.int(NZHOUR, t.hour() as i32);
    h.int(NZMIN, t.minute() as i32);
    h.int(NZSEC, t.second() as i32);
    h.int(NZMSEC, t.timestamp_subsec_millis() as i32);
    h.int(NVHDR, HEADER_VERSION);
    h.int(NPTS, npts);
    h.int(IFTYPE, ITIME);
    h.int(IDEP, IUNKN);
    h.int(IZTYPE, IB);
    h.int(LEVEN, 1);
    h.int(LPSPOL, 0);
    h.int(LOVROK, 1);
    h.int(LCALDA, 1);

    h.text(KSTNM, "kstnm", identity.station())?;
    h.text(KCMPNM, "kcmpnm", identity.component())?;
    h.text(KNETWK, "knetwk", identity.network())?;
    h.text(KHOLE, "khole", identity.location())?;

    let mut bytes = h.buf;
    bytes.reserve(data.len() * 4);
    for v in data {
        bytes.extend(HeaderWriter::ORDER.f32_bytes(v));
    }
    out.write_all(&bytes)?;
    Ok(())
}
