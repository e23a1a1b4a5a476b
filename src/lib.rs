//! Read and write seismic waveform files in several formats through one
//! in-memory model.
//!
//! Supported formats are Seisan event files, SEED/miniSEED archives, SAC
//! files and two-column text. Every format is read into a map from
//! [`ChannelIdentity`] to [`Waveform`], and any such map can be written
//! back out in any format.
//!
//! # Converting a file
//!
//! ```no_run
//! use seisfile::{DataFile, FileType};
//!
//! let archive = DataFile::open("2024-05-01.mseed")?;
//! let mut event = DataFile::create("2024-05-01-1200-00S.seisan", FileType::Seisan)?;
//! for (id, wave) in archive.waves() {
//!     event.put_wave(id.clone(), wave.clone());
//! }
//! event.write()?;
//! # Ok::<(), seisfile::DataFileError>(())
//! ```
//!
//! # Format detection
//!
//! ```
//! use seisfile::FileType;
//!
//! assert_eq!(FileType::from_file_name("ANMO.BHZ.SAC"), FileType::Sac);
//! assert_eq!(FileType::from_file_name("day.mseed"), FileType::Seed);
//! assert_eq!(FileType::from_file_name("notes.doc"), FileType::Unknown);
//! ```
//!
//! # Joining archive records
//!
//! Records of one channel are joined into a single waveform. Sample
//! positions no record covers hold [`NO_DATA`].
//!
//! ```
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use seisfile::{encode, read_archive, ChannelIdentity, MseedRecord, NanoTime, Samples, SeedOptions, NO_DATA};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let record = |at, samples: Vec<i32>| {
//!     let r = MseedRecord::new()
//!         .with_nslc("IU", "ANMO", "00", "BHZ")
//!         .with_start_time(NanoTime::from_datetime(&at))
//!         .with_sample_rate(1.0)
//!         .with_samples(Samples::Int(samples));
//!     encode(&r).unwrap()
//! };
//! let mut data = record(start, vec![1, 2]);
//! data.extend(record(start + TimeDelta::seconds(4), vec![5]));
//!
//! let channels = read_archive(&data, &SeedOptions::default());
//! let wave = &channels[&ChannelIdentity::new("ANMO", "BHZ", "IU", "00")];
//! assert_eq!(wave.samples, vec![1, 2, NO_DATA, NO_DATA, 5]);
//! ```
//!
//! # Building a record
//!
//! ```
//! use seisfile::{MseedRecord, Samples, EncodingFormat, BTime, NanoTime, encode, decode};
//!
//! let record = MseedRecord::new()
//!     .with_nslc("XX", "TEST", "00", "BHZ")
//!     .with_start_time(NanoTime::from_btime(&BTime {
//!         year: 2025, day: 100, hour: 12,
//!         minute: 30, second: 45, fract: 0,
//!     }))
//!     .with_sample_rate(20.0)
//!     .with_encoding(EncodingFormat::Int32)
//!     .with_record_length(512)
//!     .with_samples(Samples::Int(vec![1, -2, 3, -4]));
//!
//! let bytes = encode(&record).unwrap();
//! assert_eq!(bytes.len(), 512);
//! assert_eq!(decode(&bytes).unwrap().samples, record.samples);
//! ```

pub mod channel;
pub mod datafile;
pub mod decode;
pub mod encode;
pub mod error;
pub mod filetype;
pub mod reader;
pub mod record;
pub mod sac;
pub mod seed;
pub mod seisan;
pub mod steim;
pub mod text;
pub mod time;
pub mod types;
pub mod waveform;

pub use channel::{ChannelIdentity, ChannelIdentityBuilder};
pub use datafile::DataFile;
pub use error::{DataFileError, Result};
pub use filetype::FileType;
pub use reader::SeedReader;
pub use record::{MseedRecord, Samples};
pub use seed::{SeedOptions, read_archive, write_archive};
pub use time::{BTime, NanoTime};
pub use types::{ByteOrder, EncodingFormat};
pub use waveform::{ChannelMap, NO_DATA, Waveform};

pub use decode::decode;
pub use encode::encode;
