//! Compile-time smoke test: verify top-level re-exports work.

use seisfile::{
    BTime, ByteOrder, ChannelIdentity, ChannelIdentityBuilder, ChannelMap, DataFile,
    DataFileError, EncodingFormat, FileType, MseedRecord, NO_DATA, NanoTime, Result, Samples,
    SeedOptions, SeedReader, Waveform, decode, encode, read_archive, write_archive,
};

#[test]
fn top_level_imports_compile() {
    // Just verify the types are usable from the crate root
    let _: fn(&[u8]) -> Result<MseedRecord> = decode;
    let _: fn(&MseedRecord) -> Result<Vec<u8>> = encode;
    let _: fn(&[u8], &SeedOptions) -> ChannelMap = read_archive;
    let _: fn(&mut Vec<u8>, &ChannelMap, &SeedOptions) -> Result<()> = write_archive;

    let _bo = ByteOrder::Big;
    let _s = Samples::Int(vec![]);
    let _bt = BTime {
        year: 2025,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        fract: 0,
    };
    let _nt = NanoTime::epoch();
    let _enc = EncodingFormat::Steim2;
    let _reader = SeedReader::new(&[]);

    let _id: ChannelIdentity = ChannelIdentityBuilder::new().station("ANMO").build();
    let _wave = Waveform::new(chrono::DateTime::UNIX_EPOCH, 1.0, vec![NO_DATA]);
    let _ft = FileType::from_file_name("a.seisan");
    let _df = DataFile::create("a.txt", FileType::Text);

    // DataFileError is accessible
    let _e: Option<DataFileError> = None;
}
