//! Iterator over the data records of a SEED / miniSEED byte stream.
//!
//! Use [`SeedReader`] to walk concatenated records in a byte slice. Unlike a
//! strict decoder, the reader keeps going after a bad record: each failure
//! is yielded as an `Err` item and the reader moves on to the next record.

use tracing::debug;

use crate::decode::{self, FIXED_HEADER_SIZE};
use crate::record::MseedRecord;
use crate::{DataFileError, Result};

/// Record length assumed when a header is too damaged to say.
pub const DEFAULT_RECORD_LENGTH: usize = 4096;

/// Iterator over SEED data records in a byte slice.
///
/// Runs of zero bytes between records are skipped. Archivers that
/// preallocate file space leave such runs behind after an unclean shutdown.
///
/// # Example
///
/// ```
/// use seisfile::{encode, MseedRecord, SeedReader, Samples};
///
/// let record = MseedRecord::new()
///     .with_nslc("XX", "TEST", "00", "BHZ")
///     .with_samples(Samples::Int(vec![1, 2, 3]));
/// let mut data = vec![0u8; 100];
/// data.extend(encode(&record).unwrap());
///
/// let records: Vec<_> = SeedReader::new(&data)
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// assert_eq!(records.len(), 1);
/// ```
pub struct SeedReader<'a> {
    data: &'a [u8],
    offset: usize,
    fallback_record_length: usize,
    /// Length of the last record whose header parsed.
    last_record_length: Option<usize>,
}

impl<'a> SeedReader<'a> {
    /// Create a new reader over the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            fallback_record_length: DEFAULT_RECORD_LENGTH,
            last_record_length: None,
        }
    }

    /// How far to jump past a record whose length cannot be read, until a
    /// good record has been seen. After that the last good record's length
    /// is used.
    pub fn with_fallback_record_length(mut self, len: usize) -> Self {
        self.fallback_record_length = len.max(1);
        self
    }

    /// Byte offset of the next unread record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Advance past a run of zero bytes.
    ///
    /// Returns `false` when the stream ends inside the run, which is a
    /// normal end of input.
    fn skip_null_padding(&mut self) -> bool {
        let mark = self.offset;
        let run = self.data[mark..].iter().take_while(|&&b| b == 0).count();
        // The first non-zero byte starts the next record.
        self.offset = mark + run;
        if run > 0 {
            debug!(offset = mark, length = run, "skipped zero padding");
        }
        self.offset < self.data.len()
    }

    fn skip(&mut self, len: usize) {
        self.offset = (self.offset + len).min(self.data.len());
    }

    /// Jump past a record whose own length is unknown.
    fn skip_unreadable(&mut self) {
        self.skip(self.last_record_length.unwrap_or(self.fallback_record_length));
    }
}

impl Iterator for SeedReader<'_> {
    type Item = Result<MseedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.skip_null_padding() {
                return None;
            }

            let remaining = &self.data[self.offset..];
            if remaining.len() < FIXED_HEADER_SIZE {
                self.offset = self.data.len();
                return Some(Err(DataFileError::UnexpectedEndOfInput {
                    expected: FIXED_HEADER_SIZE,
                    actual: remaining.len(),
                }));
            }

            if !is_data_record(remaining) {
                // Volume, abbreviation and station control headers carry no samples.
                debug!(
                    offset = self.offset,
                    kind = %(remaining[6] as char),
                    "skipping non-data record"
                );
                self.skip_unreadable();
                continue;
            }

            let record_length = match peek_record_length(remaining) {
                Ok(len) => len,
                Err(e) => {
                    self.skip_unreadable();
                    return Some(Err(e));
                }
            };
            self.last_record_length = Some(record_length);

            if remaining.len() < record_length {
                self.offset = self.data.len();
                return Some(Err(DataFileError::UnexpectedEndOfInput {
                    expected: record_length,
                    actual: remaining.len(),
                }));
            }

            let result = decode::decode(&remaining[..record_length]);
            self.skip(record_length);
            return Some(result);
        }
    }
}

/// Data records carry a quality indicator of D, R, Q or M at byte 6.
fn is_data_record(data: &[u8]) -> bool {
    matches!(data[6], b'D' | b'R' | b'Q' | b'M')
}

/// Peek at a record's Blockette 1000 to determine the record length.
fn peek_record_length(data: &[u8]) -> Result<usize> {
    let first_blockette = u16::from_be_bytes([data[46], data[47]]) as usize;
    let (_, _, power) = decode::find_blockette_1000(data, first_blockette)?;
    Ok(1usize << power)
}
