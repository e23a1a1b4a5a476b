//! Round trips through files on disk, across formats.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use seisfile::{ChannelIdentity, DataFile, DataFileError, FileType, NO_DATA, Waveform};
use tempfile::tempdir;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap() + TimeDelta::milliseconds(500)
}

fn seismic_samples(n: usize, phase: f64) -> Vec<i32> {
    (0..n)
        .map(|i| ((i as f64 * 0.07 + phase).sin() * 800.0) as i32 + (i as i32 % 5))
        .collect()
}

fn stations() -> Vec<(ChannelIdentity, Waveform)> {
    ["OKID", "REF", "SSLN", "MGOD"]
        .iter()
        .enumerate()
        .map(|(i, sta)| {
            let id = ChannelIdentity::new(sta, "EHZ", "AV", "");
            let wave = Waveform::new(
                start() + TimeDelta::milliseconds(20 * i as i64),
                100.0,
                seismic_samples(1500, i as f64),
            );
            (id, wave)
        })
        .collect()
}

#[test]
fn seed_to_seisan_and_back() {
    let dir = tempdir().unwrap();
    let seed_path = dir.path().join("day.mseed");
    let seisan_path = dir.path().join("2024-05-01-1200-03S.AV___004.seisan");

    let mut archive = DataFile::create(&seed_path, FileType::Seed).unwrap();
    for (id, wave) in stations() {
        archive.put_wave(id, wave);
    }
    archive.write().unwrap();

    let archive = DataFile::open(&seed_path).unwrap();
    assert_eq!(archive.channels().count(), 4);
    let mut event = DataFile::create(&seisan_path, FileType::Seisan).unwrap();
    for (id, wave) in archive.waves() {
        event.put_wave(id.clone(), wave.clone());
    }
    event.write().unwrap();

    let event = DataFile::open(&seisan_path).unwrap();
    assert_eq!(event.group(), format!("Seisan^{}", seisan_path.display()));
    assert_eq!(event.waves(), archive.waves());
    for (id, wave) in stations() {
        assert_eq!(event.wave(&id), Some(&wave));
    }
}

#[test]
fn gaps_survive_seed_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gappy.seed");
    let id = ChannelIdentity::new("OKID", "EHZ", "AV", "00");
    let mut samples = seismic_samples(2000, 0.3);
    samples[700..900].fill(NO_DATA);

    let mut file = DataFile::create(&path, FileType::Seed).unwrap();
    file.put_wave(id.clone(), Waveform::new(start(), 50.0, samples.clone()));
    file.write().unwrap();

    let read = DataFile::open(&path).unwrap().close();
    let wave = &read[&id];
    assert_eq!(wave.samples, samples);
    assert_eq!(wave.gap_count(), 200);
}

#[test]
fn sac_and_text_carry_one_trace() {
    let dir = tempdir().unwrap();
    let sac_path = dir.path().join("OKID.EHZ.sac");
    let txt_path = dir.path().join("OKID.txt");
    let (id, wave) = stations().remove(0);

    let mut sac = DataFile::create(&sac_path, FileType::Sac).unwrap();
    sac.put_wave(id.clone(), wave.clone());
    sac.write().unwrap();
    let sac = DataFile::open(&sac_path).unwrap();
    let from_sac = sac.wave(&id).unwrap();
    assert_eq!(from_sac.samples, wave.samples);
    assert_eq!(from_sac.start, wave.start);

    let mut txt = DataFile::create(&txt_path, FileType::Text).unwrap();
    txt.put_wave(id.clone(), from_sac.clone());
    txt.write().unwrap();
    let txt = DataFile::open(&txt_path).unwrap();
    let (txt_id, from_txt) = txt.waves().iter().next().unwrap();
    assert_eq!(txt_id.station(), txt_path.to_string_lossy());
    assert_eq!(from_txt.samples, wave.samples);
    assert_eq!(from_txt.start, wave.start);
    assert_eq!(from_txt.sample_rate, 100.0);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.wav");
    std::fs::write(&path, b"RIFF").unwrap();
    assert!(matches!(
        DataFile::open(&path),
        Err(DataFileError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        DataFile::create(&path, FileType::Unknown),
        Err(DataFileError::UnsupportedFormat(_))
    ));
}
