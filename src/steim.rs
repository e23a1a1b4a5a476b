//! Steim1 and Steim2 compression and decompression.
//!
//! These are differential integer compression schemes used in SEED data
//! records (see Appendix B of the SEED Manual v2.4). A payload is a run of
//! 64-byte frames; each frame holds a control word and fifteen data words.
//! Frame 0 words 1 and 2 carry the forward and reverse integration
//! constants.
//!
//! Every failure is reported as [`DataFileError::UnsupportedCompression`]
//! (or [`DataFileError::SampleCountMismatch`] when the frames hold fewer
//! samples than declared).

use tracing::warn;

use crate::types::ByteOrder;
use crate::{DataFileError, Result};

pub(crate) const FRAME_SIZE: usize = 64; // 16 x 32-bit words
const WORDS_PER_FRAME: usize = 16;

fn read_u32(data: &[u8], offset: usize, byte_order: ByteOrder) -> u32 {
    let bytes = [
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ];
    match byte_order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    }
}

fn extract_nibble(control_word: u32, word_index: usize) -> u8 {
    let shift = 30 - (word_index * 2);
    ((control_word >> shift) & 0x03) as u8
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value as i32).wrapping_shl(shift).wrapping_shr(shift)
}

/// Running sum of differences, stopping at the declared sample count.
///
/// The first sample is X0 itself. The first difference in the payload is
/// relative to the previous record's last sample and is skipped.
struct Integrator {
    acc: i32,
    samples: Vec<i32>,
    limit: usize,
    skip_next: bool,
}

impl Integrator {
    fn new(x0: i32, limit: usize) -> Self {
        let mut samples = Vec::with_capacity(limit);
        if limit > 0 {
            samples.push(x0);
        }
        Self {
            acc: x0,
            samples,
            limit,
            skip_next: true,
        }
    }

    fn full(&self) -> bool {
        self.samples.len() >= self.limit
    }

    /// Unpack `count` diffs of `bits` width, most significant first, the
    /// first starting `top` bits below bit 32.
    fn unpack(&mut self, word: u32, count: u32, bits: u32, top: u32) {
        let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
        for i in 0..count {
            if self.full() {
                break;
            }
            if self.skip_next {
                self.skip_next = false;
                continue;
            }
            let shift = 32 - top - bits * (i + 1);
            let diff = sign_extend((word >> shift) & mask, bits);
            self.acc = self.acc.wrapping_add(diff);
            self.samples.push(self.acc);
        }
    }
}

fn check_frames(data: &[u8]) -> Result<usize> {
    if !data.len().is_multiple_of(FRAME_SIZE) {
        return Err(DataFileError::UnsupportedCompression(format!(
            "data length {} not a multiple of frame size {}",
            data.len(),
            FRAME_SIZE
        )));
    }
    let num_frames = data.len() / FRAME_SIZE;
    if num_frames == 0 {
        return Err(DataFileError::UnsupportedCompression("no frames in data".into()));
    }
    Ok(num_frames)
}

/// Walk every data word with its 2-bit control code.
fn decode_frames(
    data: &[u8],
    num_samples: usize,
    byte_order: ByteOrder,
    mut apply: impl FnMut(&mut Integrator, u32, u8) -> Result<()>,
) -> Result<Vec<i32>> {
    let num_frames = check_frames(data)?;

    let x0 = read_u32(data, 4, byte_order) as i32;
    let xn = read_u32(data, 8, byte_order) as i32;
    let mut integrator = Integrator::new(x0, num_samples);

    'frames: for frame_idx in 0..num_frames {
        let frame_offset = frame_idx * FRAME_SIZE;
        let control_word = read_u32(data, frame_offset, byte_order);

        for word_idx in 1..WORDS_PER_FRAME {
            if integrator.full() {
                break 'frames;
            }
            // Skip X₀ and Xₙ in frame 0
            if frame_idx == 0 && (word_idx == 1 || word_idx == 2) {
                continue;
            }
            let word = read_u32(data, frame_offset + word_idx * 4, byte_order);
            let nibble = extract_nibble(control_word, word_idx);
            apply(&mut integrator, word, nibble)?;
        }
    }

    if integrator.samples.len() != num_samples {
        return Err(DataFileError::SampleCountMismatch {
            expected: num_samples,
            actual: integrator.samples.len(),
        });
    }
    match integrator.samples.last() {
        Some(&last) if last != xn => {
            warn!(last, xn, "last sample differs from reverse integration constant");
        }
        _ => {}
    }
    Ok(integrator.samples)
}

/// Decode Steim1 compressed data into i32 samples.
///
/// `data` must be frame-aligned (multiple of 64 bytes).
pub fn decode_steim1(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<Vec<i32>> {
    decode_frames(data, num_samples, byte_order, |int, word, nibble| {
        match nibble {
            0b00 => {}                           // no data
            0b01 => int.unpack(word, 4, 8, 0),   // four 8-bit diffs
            0b10 => int.unpack(word, 2, 16, 0),  // two 16-bit diffs
            _ => int.unpack(word, 1, 32, 0),     // one 32-bit diff
        }
        Ok(())
    })
}

/// Decode Steim2 compressed data into i32 samples.
///
/// Extends Steim1 with additional packings selected by the "dnib"
/// (bits 31-30 of the data word).
pub fn decode_steim2(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<Vec<i32>> {
    decode_frames(data, num_samples, byte_order, |int, word, nibble| {
        let dnib = ((word >> 30) & 0x03) as u8;
        match (nibble, dnib) {
            (0b00, _) => {}
            (0b01, _) => int.unpack(word, 4, 8, 0),
            (0b10, 0b01) => int.unpack(word, 1, 30, 2),
            (0b10, 0b10) => int.unpack(word, 2, 15, 2),
            (0b10, 0b11) => int.unpack(word, 3, 10, 2),
            (0b11, 0b00) => int.unpack(word, 5, 6, 2),
            (0b11, 0b01) => int.unpack(word, 6, 5, 2),
            (0b11, 0b10) => int.unpack(word, 7, 4, 4),
            _ => {
                return Err(DataFileError::UnsupportedCompression(format!(
                    "steim2 nibble={nibble:02b} invalid dnib={dnib:02b}"
                )));
            }
        }
        Ok(())
    })
}

/// Differences between consecutive samples; the first is zero.
fn differences(samples: &[i32]) -> Vec<i64> {
    let mut diffs = Vec::with_capacity(samples.len());
    diffs.push(0);
    diffs.extend(
        samples
            .windows(2)
            .map(|w| w[1] as i64 - w[0] as i64),
    );
    diffs
}

/// Lay out packed words into frames.
///
/// `pack` returns (packed_word, nibble, num_consumed) for the diffs at the
/// head of its argument.
fn encode_frames(
    samples: &[i32],
    byte_order: ByteOrder,
    pack: impl Fn(&[i64]) -> Result<(u32, u8, usize)>,
) -> Result<Vec<u8>> {
    let (Some(&x0), Some(&xn)) = (samples.first(), samples.last()) else {
        return Err(DataFileError::UnsupportedCompression(
            "no samples to encode".into(),
        ));
    };
    let diffs = differences(samples);

    let mut frames: Vec<[u32; WORDS_PER_FRAME]> = Vec::new();
    let mut diff_idx = 0;

    while diff_idx < diffs.len() {
        let mut frame = [0u32; WORDS_PER_FRAME];
        let mut control: u32 = 0;

        let start_word = if frames.is_empty() {
            frame[1] = x0 as u32;
            frame[2] = xn as u32;
            3
        } else {
            1
        };

        for (word_idx, slot) in frame.iter_mut().enumerate().skip(start_word) {
            if diff_idx >= diffs.len() {
                break;
            }
            let (packed_word, nibble, consumed) = pack(&diffs[diff_idx..])?;
            *slot = packed_word;
            control |= (nibble as u32) << (30 - word_idx * 2);
            diff_idx += consumed;
        }

        frame[0] = control;
        frames.push(frame);
    }

    let mut output = Vec::with_capacity(frames.len() * FRAME_SIZE);
    for word in frames.iter().flatten() {
        match byte_order {
            ByteOrder::Big => output.extend_from_slice(&word.to_be_bytes()),
            ByteOrder::Little => output.extend_from_slice(&word.to_le_bytes()),
        }
    }
    Ok(output)
}

fn fits(diffs: &[i64], count: usize, bits: u32) -> bool {
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    diffs.len() >= count && diffs[..count].iter().all(|&d| (min..=max).contains(&d))
}

fn pack_word(diffs: &[i64], count: usize, bits: u32, top: u32, dnib: u32) -> u32 {
    let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
    let mut word = dnib << 30;
    for (i, &d) in diffs[..count].iter().enumerate() {
        let shift = 32 - top - bits * (i as u32 + 1);
        word |= ((d as u32) & mask) << shift;
    }
    word
}

/// Encode i32 samples using Steim1 compression.
pub fn encode_steim1(samples: &[i32], byte_order: ByteOrder) -> Result<Vec<u8>> {
    encode_frames(samples, byte_order, |diffs| {
        if fits(diffs, 4, 8) {
            return Ok((pack_word(diffs, 4, 8, 0, 0), 0b01, 4));
        }
        if fits(diffs, 2, 16) {
            return Ok((pack_word(diffs, 2, 16, 0, 0), 0b10, 2));
        }
        if fits(diffs, 1, 32) {
            return Ok((diffs[0] as i32 as u32, 0b11, 1));
        }
        Err(DataFileError::UnsupportedCompression(format!(
            "difference {} exceeds 32 bits",
            diffs[0]
        )))
    })
}

/// Encode i32 samples using Steim2 compression.
///
/// A difference between neighbouring samples wider than 30 bits cannot be
/// represented and fails the whole payload.
pub fn encode_steim2(samples: &[i32], byte_order: ByteOrder) -> Result<Vec<u8>> {
    encode_frames(samples, byte_order, |diffs| {
        // (count, bits, top, dnib, nibble), densest first
        const PACKINGS: [(usize, u32, u32, u32, u8); 6] = [
            (7, 4, 4, 0b10, 0b11),
            (6, 5, 2, 0b01, 0b11),
            (5, 6, 2, 0b00, 0b11),
            (3, 10, 2, 0b11, 0b10),
            (2, 15, 2, 0b10, 0b10),
            (1, 30, 2, 0b01, 0b10),
        ];
        // 4 x 8-bit slots in between 5 x 6-bit and 3 x 10-bit
        for (i, &(count, bits, top, dnib, nibble)) in PACKINGS.iter().enumerate() {
            if i == 3 && fits(diffs, 4, 8) {
                return Ok((pack_word(diffs, 4, 8, 0, 0), 0b01, 4));
            }
            if fits(diffs, count, bits) {
                return Ok((pack_word(diffs, count, bits, top, dnib), nibble, count));
            }
        }
        Err(DataFileError::UnsupportedCompression(format!(
            "difference {} exceeds 30 bits",
            diffs[0]
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random(n: usize, spread: i32) -> Vec<i32> {
        let mut rng_state: u32 = 42;
        let mut samples = Vec::with_capacity(n);
        let mut val: i32 = 0;
        for _ in 0..n {
            rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
            let diff = (rng_state % spread as u32) as i32 - spread / 2;
            val = val.wrapping_add(diff);
            samples.push(val);
        }
        samples
    }

    #[test]
    fn test_steim1_roundtrip() {
        let samples: Vec<i32> = (0..100).collect();
        let encoded = encode_steim1(&samples, ByteOrder::Big).unwrap();
        let decoded = decode_steim1(&encoded, samples.len(), ByteOrder::Big).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_steim2_roundtrip() {
        let samples: Vec<i32> = (0..100).collect();
        let encoded = encode_steim2(&samples, ByteOrder::Big).unwrap();
        let decoded = decode_steim2(&encoded, samples.len(), ByteOrder::Big).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_steim1_roundtrip_random() {
        let samples = pseudo_random(200, 1000);
        let encoded = encode_steim1(&samples, ByteOrder::Big).unwrap();
        let decoded = decode_steim1(&encoded, samples.len(), ByteOrder::Big).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_steim2_roundtrip_every_width() {
        // Spreads chosen to exercise 4-, 5-, 6-, 8-, 10-, 15- and 30-bit packings.
        for spread in [10, 24, 50, 200, 1000, 30000, 10_000_000] {
            let samples = pseudo_random(300, spread);
            let encoded = encode_steim2(&samples, ByteOrder::Little).unwrap();
            let decoded = decode_steim2(&encoded, samples.len(), ByteOrder::Little).unwrap();
            assert_eq!(decoded, samples, "spread {spread}");
        }
    }

    #[test]
    fn test_steim2_rejects_wide_difference() {
        let samples = vec![0, i32::MIN, 0];
        assert!(matches!(
            encode_steim2(&samples, ByteOrder::Big),
            Err(DataFileError::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn test_steim2_constant_sentinel_run() {
        // A run of identical values compresses regardless of magnitude.
        let samples = vec![i32::MIN; 50];
        let encoded = encode_steim2(&samples, ByteOrder::Big).unwrap();
        let decoded = decode_steim2(&encoded, 50, ByteOrder::Big).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decode_rejects_unaligned() {
        assert!(matches!(
            decode_steim2(&[0u8; 63], 1, ByteOrder::Big),
            Err(DataFileError::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn test_decode_short_payload() {
        let encoded = encode_steim2(&[1, 2, 3], ByteOrder::Big).unwrap();
        assert!(matches!(
            decode_steim2(&encoded, 500, ByteOrder::Big),
            Err(DataFileError::SampleCountMismatch {
                expected: 500,
                actual: 3
            })
        ));
    }

    /// One frame: control word, X0, Xn, then `words` from word 3 on.
    fn frame(control: u32, x0: i32, xn: i32, words: &[u32]) -> Vec<u8> {
        let mut all = vec![control, x0 as u32, xn as u32];
        all.extend_from_slice(words);
        all.resize(WORDS_PER_FRAME, 0);
        all.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_first_difference_is_ignored() {
        // Four 8-bit diffs in word 3. The 100 is relative to the
        // previous record and must not shift the samples.
        let control = 0b01 << (30 - 3 * 2);
        let diffs = u32::from_be_bytes([100, 1, 1, 0]);
        let data = frame(control, 1000, 1002, &[diffs]);
        assert_eq!(
            decode_steim2(&data, 3, ByteOrder::Big).unwrap(),
            vec![1000, 1001, 1002]
        );
        assert_eq!(
            decode_steim1(&data, 3, ByteOrder::Big).unwrap(),
            vec![1000, 1001, 1002]
        );
    }

    #[test]
    fn test_first_difference_in_wide_packing() {
        // Steim2 7 x 4-bit diffs: dnib 10, first diff -5 ignored.
        let control = 0b11 << (30 - 3 * 2);
        let nibbles: [i32; 7] = [-5, 1, 2, 3, -1, 0, 1];
        let mut word = 0b10u32 << 30;
        for (i, &d) in nibbles.iter().enumerate() {
            word |= ((d as u32) & 0xF) << (28 - 4 * (i as u32 + 1));
        }
        let data = frame(control, -7, -1, &[word]);
        assert_eq!(
            decode_steim2(&data, 7, ByteOrder::Big).unwrap(),
            vec![-7, -6, -4, -1, -2, -2, -1]
        );
    }

    #[test]
    fn test_single_sample() {
        let encoded = encode_steim2(&[42], ByteOrder::Big).unwrap();
        assert_eq!(decode_steim2(&encoded, 1, ByteOrder::Big).unwrap(), vec![42]);
    }

    #[test]
    fn test_encode_empty() {
        assert!(encode_steim1(&[], ByteOrder::Big).is_err());
    }
}
