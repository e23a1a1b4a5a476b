//! Format-independent access to a waveform file.
//!
//! [`DataFile`] picks a format from the file name, reads every channel into
//! memory as a [`Waveform`], and writes the whole set back on request.
//!
//! ```no_run
//! use seisfile::{DataFile, FileType};
//!
//! let event = DataFile::open("2024-05-01-1200-00S.seisan")?;
//! let mut archive = DataFile::create("2024-05-01.mseed", FileType::Seed)?;
//! for (id, wave) in event.waves() {
//!     archive.put_wave(id.clone(), wave.clone());
//! }
//! archive.write()?;
//! # Ok::<(), seisfile::DataFileError>(())
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::channel::ChannelIdentity;
use crate::filetype::FileType;
use crate::seed::SeedOptions;
use crate::waveform::{ChannelMap, Waveform};
use crate::{DataFileError, Result, sac, seed, seisan, text};

/// The format codec behind a [`DataFile`].
#[derive(Debug, Clone)]
enum Driver {
    Sac,
    Seed(SeedOptions),
    Seisan,
    Text,
}

impl Driver {
    fn for_type(file_type: FileType) -> Option<Self> {
        match file_type {
            FileType::Sac => Some(Driver::Sac),
            FileType::Seed => Some(Driver::Seed(SeedOptions::default())),
            FileType::Seisan => Some(Driver::Seisan),
            FileType::Text => Some(Driver::Text),
            FileType::Unknown => None,
        }
    }

    fn read(&self, data: &[u8], path: &Path) -> Result<ChannelMap> {
        match self {
            Driver::Sac => {
                let (id, wave) = sac::read_sac(data)?;
                Ok(ChannelMap::from([(id, wave)]))
            }
            Driver::Seed(options) => Ok(seed::read_archive(data, options)),
            Driver::Seisan => seisan::read_event(data),
            Driver::Text => {
                let text = std::str::from_utf8(data)
                    .map_err(|e| DataFileError::InvalidHeader(format!("not UTF-8: {e}")))?;
                let id = ChannelIdentity::named(&path.to_string_lossy());
                Ok(ChannelMap::from([(id, text::read_text(text)?)]))
            }
        }
    }

    fn write<W: Write>(&self, out: &mut W, channels: &ChannelMap, path: &Path) -> Result<()> {
        match self {
            Driver::Sac => {
                let (id, wave) = single_channel(channels, path)?;
                sac::write_sac(out, id, wave)
            }
            Driver::Seed(options) => seed::write_archive(out, channels, options),
            Driver::Seisan => seisan::write_event(out, channels),
            Driver::Text => {
                let (_, wave) = single_channel(channels, path)?;
                text::write_text(out, wave)
            }
        }
    }
}

/// First channel of a single-trace format.
fn single_channel<'a>(
    channels: &'a ChannelMap,
    path: &Path,
) -> Result<(&'a ChannelIdentity, &'a Waveform)> {
    let mut iter = channels.iter();
    let first = iter
        .next()
        .ok_or_else(|| DataFileError::MissingChannelData(path.display().to_string()))?;
    let extra = iter.count();
    if extra > 0 {
        warn!(
            path = %path.display(),
            channel = %first.0,
            ignored = extra,
            "format holds one channel; writing only the first"
        );
    }
    Ok(first)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Not read yet.
    Created,
    Ready,
    /// A read failed; the channel map is unusable.
    Failed,
}

/// One waveform file and its channels.
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    file_type: FileType,
    driver: Driver,
    channels: ChannelMap,
    state: State,
}

impl DataFile {
    /// Detect the format from the file name and read the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::open_as(path, FileType::from_path(path))
    }

    /// Read a file as the given format, ignoring its name.
    pub fn open_as(path: impl AsRef<Path>, file_type: FileType) -> Result<Self> {
        let mut file = Self::new(path, file_type)?;
        file.read()?;
        Ok(file)
    }

    /// A driver for `path` that has not read anything yet.
    ///
    /// Use this to adjust options before calling [`read`](Self::read).
    pub fn new(path: impl AsRef<Path>, file_type: FileType) -> Result<Self> {
        let path = path.as_ref();
        let driver = Driver::for_type(file_type)
            .ok_or_else(|| DataFileError::UnsupportedFormat(path.display().to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file_type,
            driver,
            channels: ChannelMap::new(),
            state: State::Created,
        })
    }

    /// An empty file, ready to be filled and written.
    pub fn create(path: impl AsRef<Path>, file_type: FileType) -> Result<Self> {
        let mut file = Self::new(path, file_type)?;
        file.state = State::Ready;
        Ok(file)
    }

    /// Record layout for SEED files. Ignored by other formats.
    pub fn with_seed_options(mut self, options: SeedOptions) -> Self {
        if let Driver::Seed(current) = &mut self.driver {
            *current = options;
        }
        self
    }

    /// Read the whole file. Allowed once, before anything else.
    pub fn read(&mut self) -> Result<()> {
        if self.state != State::Created {
            return Err(DataFileError::InvalidState("file has already been read"));
        }
        self.state = State::Failed;
        let data = fs::read(&self.path)?;
        self.channels = self.driver.read(&data, &self.path)?;
        self.state = State::Ready;
        debug!(
            path = %self.path.display(),
            format = self.file_type.tag(),
            channels = self.channels.len(),
            "read file"
        );
        Ok(())
    }

    /// Write every channel to the file, replacing its contents.
    ///
    /// May be called repeatedly; each call writes the current channel set.
    /// A failed write leaves the file as it was, except that a SEED write
    /// which had to drop records still writes the others.
    pub fn write(&mut self) -> Result<()> {
        match self.state {
            State::Ready => {}
            State::Created => return Err(DataFileError::InvalidState("file has not been read")),
            State::Failed => return Err(DataFileError::InvalidState("previous read failed")),
        }
        let mut buf = Vec::new();
        let outcome = match self.driver.write(&mut buf, &self.channels, &self.path) {
            Ok(()) => Ok(()),
            Err(e @ DataFileError::RecordsDropped { .. }) => Err(e),
            Err(e) => return Err(e),
        };
        fs::write(&self.path, &buf)?;
        debug!(
            path = %self.path.display(),
            format = self.file_type.tag(),
            channels = self.channels.len(),
            bytes = buf.len(),
            "wrote file"
        );
        outcome
    }

    /// Add or replace a channel, returning the waveform it replaced.
    pub fn put_wave(&mut self, id: ChannelIdentity, wave: Waveform) -> Option<Waveform> {
        self.channels.insert(id, wave)
    }

    pub fn wave(&self, id: &ChannelIdentity) -> Option<&Waveform> {
        self.channels.get(id)
    }

    pub fn wave_mut(&mut self, id: &ChannelIdentity) -> Option<&mut Waveform> {
        self.channels.get_mut(id)
    }

    /// Look a channel up by a delimited string key.
    pub fn wave_by_key(&self, key: &str) -> Option<&Waveform> {
        self.channels.get(&ChannelIdentity::from_key(key))
    }

    pub fn remove_wave(&mut self, id: &ChannelIdentity) -> Option<Waveform> {
        self.channels.remove(id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelIdentity> {
        self.channels.keys()
    }

    pub fn waves(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn file_name(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// `<tag>^<path>`, naming the file in a list of channel groups.
    pub fn group(&self) -> String {
        format!("{}^{}", self.file_type.tag(), self.path.display())
    }

    /// Release the file, keeping its channels.
    pub fn close(self) -> ChannelMap {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::tempdir;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn wave(n: i32) -> Waveform {
        Waveform::new(start(), 50.0, (0..n).map(|i| i * 3 - 7).collect())
    }

    fn id(station: &str) -> ChannelIdentity {
        ChannelIdentity::new(station, "EHZ", "AV", "")
    }

    #[test]
    fn test_unknown_format() {
        let dir = tempdir().unwrap();
        let err = DataFile::open(dir.path().join("trace.xyz")).unwrap_err();
        assert!(matches!(err, DataFileError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_group() {
        let file = DataFile::create("/data/a.mseed", FileType::Seed).unwrap();
        assert_eq!(file.group(), "SEED^/data/a.mseed");
        let file = DataFile::create("/data/a.txt", FileType::Text).unwrap();
        assert_eq!(file.group(), "TXT^/data/a.txt");
        assert_eq!(file.file_name(), Path::new("/data/a.txt"));
    }

    #[test]
    fn test_lifecycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("event.seisan");

        let mut file = DataFile::create(&path, FileType::Seisan).unwrap();
        assert!(matches!(file.read(), Err(DataFileError::InvalidState(_))));
        file.put_wave(id("OKID"), wave(20));
        file.write().unwrap();
        // A second write replaces the first.
        file.put_wave(id("REF"), wave(10));
        file.write().unwrap();

        let mut reopened = DataFile::open(&path).unwrap();
        assert_eq!(reopened.channels().count(), 2);
        assert!(matches!(reopened.read(), Err(DataFileError::InvalidState(_))));

        let mut unread = DataFile::new(&path, FileType::Seisan).unwrap();
        assert!(matches!(unread.write(), Err(DataFileError::InvalidState(_))));
    }

    #[test]
    fn test_failed_read_blocks_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.seisan");
        fs::write(&path, [0u8; 4]).unwrap();

        let mut file = DataFile::new(&path, FileType::Seisan).unwrap();
        assert!(file.read().is_err());
        assert!(matches!(file.write(), Err(DataFileError::InvalidState(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = DataFile::open(dir.path().join("none.sac")).unwrap_err();
        assert!(matches!(err, DataFileError::Io(_)));
    }

    #[test]
    fn test_sac_needs_a_channel() {
        let dir = tempdir().unwrap();
        let mut file = DataFile::create(dir.path().join("x.sac"), FileType::Sac).unwrap();
        assert!(matches!(
            file.write(),
            Err(DataFileError::MissingChannelData(_))
        ));
    }

    #[test]
    fn test_sac_writes_first_channel_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.sac");
        let mut file = DataFile::create(&path, FileType::Sac).unwrap();
        file.put_wave(id("AAA"), wave(5));
        file.put_wave(id("BBB"), wave(6));
        file.write().unwrap();

        let read = DataFile::open(&path).unwrap();
        let channels: Vec<_> = read.channels().cloned().collect();
        assert_eq!(channels, vec![id("AAA")]);
        assert_eq!(read.wave(&id("AAA")).unwrap().samples, wave(5).samples);
    }

    #[test]
    fn test_text_is_keyed_by_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        let mut file = DataFile::create(&path, FileType::Text).unwrap();
        file.put_wave(id("OKID"), wave(8));
        file.write().unwrap();

        let read = DataFile::open(&path).unwrap();
        let key = ChannelIdentity::named(&path.to_string_lossy());
        assert_eq!(read.wave(&key), Some(&wave(8)));
    }

    #[test]
    fn test_open_as_ignores_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.dat");
        let mut file = DataFile::create(&path, FileType::Seed).unwrap();
        file.put_wave(id("OKID"), wave(600));
        file.write().unwrap();

        assert!(DataFile::open(&path).is_err());
        let read = DataFile::open_as(&path, FileType::Seed).unwrap();
        assert_eq!(read.file_type(), FileType::Seed);
        assert_eq!(read.wave_by_key("OKID$EHZ$AV"), Some(&wave(600)));
    }

    #[test]
    fn test_seed_options() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.mseed");
        let options = SeedOptions::new()
            .with_record_length(512)
            .with_samples_per_record(100);
        let mut file = DataFile::create(&path, FileType::Seed)
            .unwrap()
            .with_seed_options(options.clone());
        file.put_wave(id("OKID"), wave(250));
        file.write().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 3 * 512);

        let mut read = DataFile::new(&path, FileType::Seed)
            .unwrap()
            .with_seed_options(options);
        read.read().unwrap();
        assert_eq!(read.close().get(&id("OKID")), Some(&wave(250)));
    }

    #[test]
    fn test_failed_write_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("event.seisan");
        let mut file = DataFile::create(&path, FileType::Seisan).unwrap();
        file.put_wave(id("OKID"), wave(4));
        file.write().unwrap();
        let before = fs::read(&path).unwrap();

        file.put_wave(id("TOOLONG"), wave(4));
        assert!(matches!(
            file.write(),
            Err(DataFileError::FieldOverflow { .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_dropped_records_still_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wild.mseed");
        let mut samples = vec![0; 1024];
        samples[600] = i32::MAX;
        let mut file = DataFile::create(&path, FileType::Seed).unwrap();
        file.put_wave(id("WILD"), Waveform::new(start(), 50.0, samples));
        assert!(matches!(
            file.write(),
            Err(DataFileError::RecordsDropped {
                dropped: 1,
                total: 2
            })
        ));
        let read = DataFile::open(&path).unwrap();
        assert_eq!(read.wave(&id("WILD")).unwrap().len(), 512);
    }

    #[test]
    fn test_wave_mut_and_remove() {
        let mut file = DataFile::create("/tmp/unused.seisan", FileType::Seisan).unwrap();
        file.put_wave(id("OKID"), wave(3));
        file.wave_mut(&id("OKID")).unwrap().samples[0] = 99;
        assert_eq!(file.wave(&id("OKID")).unwrap().samples[0], 99);
        assert!(file.remove_wave(&id("OKID")).is_some());
        assert!(file.waves().is_empty());
    }
}
