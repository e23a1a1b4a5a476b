//! Encode an [`MseedRecord`] into SEED v2 data record bytes.
//!
//! The main entry point is [`encode()`], which serializes a record
//! into a `Vec<u8>` of the configured record length.

use tracing::warn;

use crate::record::{MseedRecord, Samples};
use crate::steim;
use crate::time::BTime;
use crate::types::{ByteOrder, EncodingFormat};
use crate::{DataFileError, Result};

/// Encode a [`MseedRecord`] into SEED v2 data record bytes.
pub fn encode(record: &MseedRecord) -> Result<Vec<u8>> {
    let rec_len = record.record_length as usize;
    if !record.record_length.is_power_of_two() || rec_len < 128 {
        return Err(DataFileError::EncodeError(format!(
            "record_length must be a power of 2 of at least 128, got {rec_len}"
        )));
    }
    let rec_len_power = record.record_length.ilog2() as u8;

    let num_samples = u16::try_from(record.samples.len()).map_err(|_| {
        DataFileError::EncodeError(format!(
            "{} samples do not fit in one record",
            record.samples.len()
        ))
    })?;

    let mut buf = vec![0u8; rec_len];

    // --- Fixed header (48 bytes) ---

    // Sequence number (bytes 0-5)
    write_padded(&mut buf[0..6], &record.sequence_number);
    // Quality indicator (byte 6)
    buf[6] = record.quality as u8;
    // Reserved (byte 7)
    buf[7] = b' ';

    write_padded(&mut buf[8..13], &record.station);
    write_padded(&mut buf[13..15], &record.location);
    write_padded(&mut buf[15..18], &record.channel);
    write_padded(&mut buf[18..20], &record.network);

    // BTIME (bytes 20-29)
    write_btime(&mut buf[20..30], &record.start_time.to_btime());

    // Number of samples (bytes 30-31)
    buf[30..32].copy_from_slice(&num_samples.to_be_bytes());

    // Sample rate factor and multiplier (bytes 32-35)
    let (factor, multiplier) = decompose_sample_rate(record.sample_rate)?;
    buf[32..34].copy_from_slice(&factor.to_be_bytes());
    buf[34..36].copy_from_slice(&multiplier.to_be_bytes());

    // Flags (36-38) stay zero. One blockette follows.
    buf[39] = 1;

    // First blockette offset (bytes 46-47)
    buf[46..48].copy_from_slice(&48u16.to_be_bytes());

    // --- Blockette 1000 (8 bytes at offset 48) ---
    buf[48..50].copy_from_slice(&1000u16.to_be_bytes());
    buf[50..52].copy_from_slice(&0u16.to_be_bytes());
    buf[52] = record.encoding.to_code();
    // Word order (0=little, 1=big)
    buf[53] = match record.byte_order {
        ByteOrder::Big => 1,
        ByteOrder::Little => 0,
    };
    buf[54] = rec_len_power;
    buf[55] = 0;

    // --- Data section ---
    // Steim data starts on a 64-byte frame boundary.
    let data_offset: usize = if record.encoding.is_steim() { 64 } else { 56 };
    buf[44..46].copy_from_slice(&(data_offset as u16).to_be_bytes());

    if record.samples.is_empty() {
        return Ok(buf);
    }

    let encoded_data = encode_data(&record.samples, record.encoding, record.byte_order)?;

    if data_offset + encoded_data.len() > rec_len {
        return Err(DataFileError::EncodeError(format!(
            "encoded data ({} bytes) exceeds record capacity ({} bytes from offset {})",
            encoded_data.len(),
            rec_len - data_offset,
            data_offset,
        )));
    }

    buf[data_offset..data_offset + encoded_data.len()].copy_from_slice(&encoded_data);

    Ok(buf)
}

fn write_padded(dest: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = if i < bytes.len() { bytes[i] } else { b' ' };
    }
}

fn write_btime(dest: &mut [u8], bt: &BTime) {
    dest[0..2].copy_from_slice(&bt.year.to_be_bytes());
    dest[2..4].copy_from_slice(&bt.day.to_be_bytes());
    dest[4] = bt.hour;
    dest[5] = bt.minute;
    dest[6] = bt.second;
    dest[7] = 0; // unused
    dest[8..10].copy_from_slice(&bt.fract.to_be_bytes());
}

/// Decompose a sample rate (Hz) into a (factor, multiplier) pair.
///
/// Rates that no pair represents exactly are rounded with a warning.
fn decompose_sample_rate(rate: f64) -> Result<(i16, i16)> {
    if !(rate > 0.0) || !rate.is_finite() {
        return Err(DataFileError::EncodeError(format!(
            "sample rate must be positive, got {rate}"
        )));
    }
    let is_whole = |x: f64| (x - x.round()).abs() < 1e-6;

    if rate >= 1.0 {
        if is_whole(rate) && rate <= i16::MAX as f64 {
            return Ok((rate.round() as i16, 1));
        }
        // factor = rate * 10^k, multiplier = -10^k
        for divisor in [10i16, 100, 1000] {
            let scaled = rate * divisor as f64;
            if is_whole(scaled) && scaled <= i16::MAX as f64 {
                return Ok((scaled.round() as i16, -divisor));
            }
        }
        let factor = rate.round().min(i16::MAX as f64) as i16;
        warn!(rate, written = factor, "sample rate rounded");
        return Ok((factor, 1));
    }

    // Sub-hertz: a whole period in seconds is written as a negative factor.
    let period = 1.0 / rate;
    if is_whole(period) && period <= i16::MAX as f64 {
        return Ok((-(period.round() as i16), 1));
    }
    // Otherwise rate = factor / 10^k, e.g. 0.4 Hz as (4, -10).
    for divisor in [10i16, 100, 1000, 10000] {
        let scaled = rate * divisor as f64;
        if is_whole(scaled) && scaled >= 1.0 {
            return Ok((scaled.round() as i16, -divisor));
        }
    }
    let period = period.round().clamp(1.0, i16::MAX as f64) as i16;
    warn!(rate, written = 1.0 / period as f64, "sample rate rounded");
    Ok((-period, 1))
}

fn encode_data(
    samples: &Samples,
    encoding: EncodingFormat,
    byte_order: ByteOrder,
) -> Result<Vec<u8>> {
    match (encoding, samples) {
        (EncodingFormat::Int16, Samples::Int(ints)) => Ok(ints
            .iter()
            .flat_map(|&v| match byte_order {
                ByteOrder::Big => (v as i16).to_be_bytes(),
                ByteOrder::Little => (v as i16).to_le_bytes(),
            })
            .collect()),
        (EncodingFormat::Int32, Samples::Int(ints)) => Ok(ints
            .iter()
            .flat_map(|&v| byte_order.i32_bytes(v))
            .collect()),
        (EncodingFormat::Float32, Samples::Float(floats)) => Ok(floats
            .iter()
            .flat_map(|&v| byte_order.f32_bytes(v))
            .collect()),
        (EncodingFormat::Float64, Samples::Double(doubles)) => Ok(doubles
            .iter()
            .flat_map(|&v| match byte_order {
                ByteOrder::Big => v.to_be_bytes(),
                ByteOrder::Little => v.to_le_bytes(),
            })
            .collect()),
        (EncodingFormat::Steim1, Samples::Int(ints)) => steim::encode_steim1(ints, byte_order),
        (EncodingFormat::Steim2, Samples::Int(ints)) => steim::encode_steim2(ints, byte_order),
        (enc, _) => Err(DataFileError::EncodeError(format!(
            "{enc} encoding does not match the sample type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::time::NanoTime;

    fn record() -> MseedRecord {
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
    }

    #[test]
    fn test_encode_from_scratch() {
        let record = record()
            .with_encoding(EncodingFormat::Int32)
            .with_record_length(512)
            .with_samples(Samples::Int(vec![1, -2, 3, -4, 100000, -100000]));

        let encoded = encode(&record).unwrap();
        assert_eq!(encoded.len(), 512);
        assert_eq!(&encoded[0..6], b"000001");

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_encode_steim2_full_record() {
        let samples: Vec<i32> = (0..512).map(|i| (i * 37 % 1000) - 500).collect();
        let record = record().with_samples(Samples::Int(samples.clone()));
        let encoded = encode(&record).unwrap();
        assert_eq!(encoded.len(), 4096);
        assert_eq!(encoded[54], 12);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.samples, Samples::Int(samples));
        assert_eq!(decoded.encoding, EncodingFormat::Steim2);
    }

    #[test]
    fn test_little_endian_int16() {
        let record = record()
            .with_encoding(EncodingFormat::Int16)
            .with_byte_order(ByteOrder::Little)
            .with_record_length(256)
            .with_samples(Samples::Int(vec![-300, 0, 300]));
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.byte_order, ByteOrder::Little);
        assert_eq!(decoded.samples, Samples::Int(vec![-300, 0, 300]));
    }

    #[test]
    fn test_fractional_sample_rate() {
        let record = record()
            .with_sample_rate(12.5)
            .with_samples(Samples::Int(vec![1, 2]));
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.sample_rate, 12.5);
    }

    fn decoded_rate(rate: f64) -> f64 {
        let record = record()
            .with_sample_rate(rate)
            .with_samples(Samples::Int(vec![1, 2]));
        decode(&encode(&record).unwrap()).unwrap().sample_rate
    }

    #[test]
    fn test_sub_hertz_sample_rates() {
        assert_eq!(decompose_sample_rate(0.4).unwrap(), (4, -10));
        assert_eq!(decoded_rate(0.4), 0.4);
        assert_eq!(decoded_rate(0.1), 0.1);
        assert_eq!(decoded_rate(0.025), 0.025);
        assert_eq!(decoded_rate(1.0 / 7.0), 1.0 / 7.0);
    }

    #[test]
    fn test_unrepresentable_rate_is_rounded() {
        assert_eq!(decompose_sample_rate(0.123456789).unwrap(), (-8, 1));
        assert_eq!(decompose_sample_rate(20.123456).unwrap(), (20, 1));
    }

    #[test]
    fn test_rejects_bad_record_length() {
        let record = record().with_record_length(1000);
        assert!(matches!(encode(&record), Err(DataFileError::EncodeError(_))));
    }

    #[test]
    fn test_rejects_overflowing_payload() {
        let record = record()
            .with_encoding(EncodingFormat::Int32)
            .with_record_length(128)
            .with_samples(Samples::Int(vec![7; 64]));
        assert!(matches!(encode(&record), Err(DataFileError::EncodeError(_))));
    }

    #[test]
    fn test_rejects_mismatched_sample_type() {
        let record = record().with_samples(Samples::Float(vec![1.0]));
        assert!(matches!(encode(&record), Err(DataFileError::EncodeError(_))));
    }
}
