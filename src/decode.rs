//! Decode SEED v2 data records from raw bytes.
//!
//! The main entry point is [`decode()`], which parses one complete record
//! into an [`MseedRecord`]. For a stream of records, see
//! [`SeedReader`](crate::reader::SeedReader).

use crate::record::{MseedRecord, Samples};
use crate::steim;
use crate::time::BTime;
use crate::types::{ByteOrder, EncodingFormat};
use crate::{DataFileError, Result};

/// Size of the SEED fixed section of data header.
pub const FIXED_HEADER_SIZE: usize = 48;

/// Decode a single SEED v2 data record from raw bytes.
///
/// `data` must hold the whole record; its length is taken from
/// Blockette 1000.
pub fn decode(data: &[u8]) -> Result<MseedRecord> {
    if data.len() < FIXED_HEADER_SIZE {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: FIXED_HEADER_SIZE,
            actual: data.len(),
        });
    }

    // Fixed header (48 bytes)
    let sequence_number = header_str(&data[0..6])?.to_string();
    let quality = data[6] as char;
    let station = header_str(&data[8..13])?.trim().to_string();
    let location = header_str(&data[13..15])?.trim().to_string();
    let channel = header_str(&data[15..18])?.trim().to_string();
    let network = header_str(&data[18..20])?.trim().to_string();

    // BTIME (bytes 20-29), always big-endian in records we accept
    let start_time = BTime {
        year: u16::from_be_bytes([data[20], data[21]]),
        day: u16::from_be_bytes([data[22], data[23]]),
        hour: data[24],
        minute: data[25],
        second: data[26],
        // byte 27 is unused
        fract: u16::from_be_bytes([data[28], data[29]]),
    };

    let num_samples = u16::from_be_bytes([data[30], data[31]]) as usize;
    let sample_rate_factor = i16::from_be_bytes([data[32], data[33]]);
    let sample_rate_multiplier = i16::from_be_bytes([data[34], data[35]]);
    let sample_rate = compute_sample_rate(sample_rate_factor, sample_rate_multiplier);

    let data_offset = u16::from_be_bytes([data[44], data[45]]) as usize;
    let first_blockette = u16::from_be_bytes([data[46], data[47]]) as usize;

    let (encoding, byte_order_val, record_length_power) =
        find_blockette_1000(data, first_blockette)?;

    let byte_order = if byte_order_val == 1 {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };
    let record_length = 1u32 << record_length_power;
    if data.len() < record_length as usize {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: record_length as usize,
            actual: data.len(),
        });
    }
    if data_offset > record_length as usize {
        return Err(DataFileError::InvalidHeader(format!(
            "data offset {data_offset} beyond record length {record_length}"
        )));
    }

    let encoding_format = EncodingFormat::from_code(encoding)?;

    let samples = if num_samples == 0 {
        Samples::Int(vec![])
    } else {
        let data_section = &data[data_offset..record_length as usize];
        decode_data(data_section, encoding_format, num_samples, byte_order)?
    };

    Ok(MseedRecord {
        network,
        station,
        location,
        channel,
        start_time: start_time.into(),
        sample_rate,
        encoding: encoding_format,
        samples,
        sequence_number,
        quality,
        byte_order,
        record_length,
    })
}

fn header_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|_| DataFileError::InvalidHeader("non-ASCII fixed header field".into()))
}

/// Sample rate in Hz from the SEED factor/multiplier pair.
pub(crate) fn compute_sample_rate(factor: i16, multiplier: i16) -> f64 {
    if factor == 0 || multiplier == 0 {
        return 0.0;
    }
    let f = factor as f64;
    let m = multiplier as f64;
    match (factor > 0, multiplier > 0) {
        (true, true) => f * m,
        (true, false) => -f / m,
        (false, true) => -m / f,
        (false, false) => 1.0 / (f * m),
    }
}

/// Walk the blockette chain to Blockette 1000.
/// Returns (encoding, word order, record length power).
pub(crate) fn find_blockette_1000(data: &[u8], mut offset: usize) -> Result<(u8, u8, u8)> {
    // Guards against chains that point backwards.
    let mut hops = 0;
    loop {
        if offset < FIXED_HEADER_SIZE || offset + 4 > data.len() || hops > 32 {
            return Err(DataFileError::MissingBlockette1000);
        }
        let blockette_type = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let next_offset = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;

        if blockette_type == 1000 {
            if offset + 8 > data.len() {
                return Err(DataFileError::MissingBlockette1000);
            }
            let encoding = data[offset + 4];
            let byte_order = data[offset + 5];
            let record_length_power = data[offset + 6];
            if !(7..=16).contains(&record_length_power) {
                return Err(DataFileError::InvalidHeader(format!(
                    "record length power {record_length_power} out of range"
                )));
            }
            return Ok((encoding, byte_order, record_length_power));
        }

        if next_offset == 0 {
            return Err(DataFileError::MissingBlockette1000);
        }
        offset = next_offset;
        hops += 1;
    }
}

pub(crate) fn decode_data(
    data: &[u8],
    encoding: EncodingFormat,
    num_samples: usize,
    byte_order: ByteOrder,
) -> Result<Samples> {
    match encoding {
        EncodingFormat::Int16 => decode_fixed(data, num_samples, 2, |b| {
            byte_order.read_int(b).map(|v| v as i32)
        })
        .map(Samples::Int),
        EncodingFormat::Int32 => decode_fixed(data, num_samples, 4, |b| {
            byte_order.read_int(b).map(|v| v as i32)
        })
        .map(Samples::Int),
        EncodingFormat::Float32 => {
            decode_fixed(data, num_samples, 4, |b| Ok(byte_order.read_f32(b))).map(Samples::Float)
        }
        EncodingFormat::Float64 => decode_fixed(data, num_samples, 8, |b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(b);
            Ok(match byte_order {
                ByteOrder::Big => f64::from_be_bytes(buf),
                ByteOrder::Little => f64::from_le_bytes(buf),
            })
        })
        .map(Samples::Double),
        EncodingFormat::Steim1 => {
            let samples = steim::decode_steim1(trim_frames(data), num_samples, byte_order)?;
            Ok(Samples::Int(samples))
        }
        EncodingFormat::Steim2 => {
            let samples = steim::decode_steim2(trim_frames(data), num_samples, byte_order)?;
            Ok(Samples::Int(samples))
        }
    }
}

/// Steim data runs to the end of the record; drop any partial trailing frame.
fn trim_frames(data: &[u8]) -> &[u8] {
    &data[..data.len() - data.len() % steim::FRAME_SIZE]
}

fn decode_fixed<T>(
    data: &[u8],
    num_samples: usize,
    width: usize,
    read: impl Fn(&[u8]) -> Result<T>,
) -> Result<Vec<T>> {
    let needed = num_samples * width;
    if data.len() < needed {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: needed,
            actual: data.len(),
        });
    }
    data[..needed].chunks_exact(width).map(read).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::time::NanoTime;

    fn int32_record(samples: Vec<i32>) -> MseedRecord {
        MseedRecord::new()
            .with_nslc("XX", "TEST", "00", "BHZ")
            .with_start_time(NanoTime {
                year: 2025,
                day: 100,
                hour: 12,
                minute: 30,
                second: 45,
                nanosecond: 123_400_000,
            })
            .with_sample_rate(20.0)
            .with_encoding(EncodingFormat::Int32)
            .with_record_length(512)
            .with_samples(Samples::Int(samples))
    }

    #[test]
    fn test_header_parsing() {
        let bytes = encode(&int32_record(vec![1, 2, 3])).unwrap();
        let record = decode(&bytes).unwrap();
        assert_eq!(record.network, "XX");
        assert_eq!(record.station, "TEST");
        assert_eq!(record.location, "00");
        assert_eq!(record.channel, "BHZ");
        assert_eq!(record.sample_rate, 20.0);
        assert_eq!(record.start_time.day, 100);
        assert_eq!(record.start_time.nanosecond, 123_400_000);
        assert_eq!(record.record_length, 512);
        assert_eq!(record.samples, Samples::Int(vec![1, 2, 3]));
    }

    #[test]
    fn test_short_input() {
        let err = decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(
            err,
            DataFileError::UnexpectedEndOfInput {
                expected: 48,
                actual: 20
            }
        ));
    }

    #[test]
    fn test_truncated_record() {
        let bytes = encode(&int32_record(vec![1, 2, 3])).unwrap();
        let err = decode(&bytes[..100]).unwrap_err();
        assert!(matches!(err, DataFileError::UnexpectedEndOfInput { .. }));
    }

    #[test]
    fn test_missing_blockette_1000() {
        let mut bytes = encode(&int32_record(vec![1])).unwrap();
        // Blockette type 100 with no successor.
        bytes[48..50].copy_from_slice(&100u16.to_be_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(DataFileError::MissingBlockette1000)
        ));
    }

    #[test]
    fn test_unsupported_encoding() {
        let mut bytes = encode(&int32_record(vec![1])).unwrap();
        bytes[52] = 99;
        assert!(matches!(
            decode(&bytes),
            Err(DataFileError::UnsupportedEncoding(99))
        ));
    }

    #[test]
    fn test_sample_rate_factor_multiplier() {
        assert_eq!(compute_sample_rate(20, 1), 20.0);
        assert_eq!(compute_sample_rate(-10, 1), 0.1);
        assert_eq!(compute_sample_rate(1, -10), 0.1);
        assert_eq!(compute_sample_rate(0, 1), 0.0);
    }
}
