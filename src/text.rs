//! Two-column text files as exported from Matlab.
//!
//! Each line is `<epoch milliseconds> <sample>`. The sample rate is taken
//! from the spacing of the first two lines.

use std::io::Write;

use crate::time::{epoch_nanos, from_epoch_millis};
use crate::waveform::Waveform;
use crate::{DataFileError, Result};

fn parse_line(number: usize, line: &str) -> Result<(f64, i32)> {
    let malformed = || DataFileError::InvalidHeader(format!("line {number}: {line:?}"));
    let mut fields = line.split_whitespace();
    let (Some(time), Some(sample), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed());
    };
    let time: f64 = time.parse().map_err(|_| malformed())?;
    let sample: i32 = sample.parse().map_err(|_| malformed())?;
    Ok((time, sample))
}

pub fn read_text(text: &str) -> Result<Waveform> {
    let rows = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line))
        .collect::<Result<Vec<_>>>()?;

    let &[(t0, _), (t1, _), ..] = rows.as_slice() else {
        return Err(DataFileError::UnexpectedEndOfInput {
            expected: 2,
            actual: rows.len(),
        });
    };
    if !(t1 > t0) {
        return Err(DataFileError::InvalidHeader(format!(
            "second timestamp {t1} does not follow {t0}"
        )));
    }

    Ok(Waveform::new(
        from_epoch_millis(t0),
        1000.0 / (t1 - t0),
        rows.into_iter().map(|(_, sample)| sample).collect(),
    ))
}

pub fn write_text<W: Write>(out: &mut W, wave: &Waveform) -> Result<()> {
    let start_ms = epoch_nanos(&wave.start) as f64 / 1e6;
    let period_ms = 1000.0 / wave.sample_rate;
    for (i, sample) in wave.samples.iter().enumerate() {
        let t = (start_ms + i as f64 * period_ms).round() as i64;
        writeln!(out, "{t} {sample}")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_read() {
        let wave = read_text("1700000000000 5\n1700000000010 -3\n1700000000020 7\n").unwrap();
        assert_eq!(wave.start, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        assert_eq!(wave.sample_rate, 100.0);
        assert_eq!(wave.samples, vec![5, -3, 7]);
    }

    #[test]
    fn test_write_then_read() {
        let start = Utc.timestamp_millis_opt(1_600_000_000_250).unwrap();
        let wave = Waveform::new(start, 40.0, vec![1, 2, 3, 4]);
        let mut out = Vec::new();
        write_text(&mut out, &wave).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "1600000000250 1\n1600000000275 2\n1600000000300 3\n1600000000325 4\n"
        );
        assert_eq!(read_text(&text).unwrap(), wave);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            read_text("1700000000000 5\n"),
            Err(DataFileError::UnexpectedEndOfInput {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            read_text(""),
            Err(DataFileError::UnexpectedEndOfInput { actual: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_line() {
        let err = read_text("1700000000000 5\n1700000000010 x\n").unwrap_err();
        match err {
            DataFileError::InvalidHeader(msg) => assert!(msg.starts_with("line 2")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(read_text("1700000000000\n1700000000010 1\n").is_err());
    }

    #[test]
    fn test_timestamps_must_advance() {
        assert!(matches!(
            read_text("10 1\n10 2\n"),
            Err(DataFileError::InvalidHeader(_))
        ));
    }
}
