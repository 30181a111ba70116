// Tests for the per-session WAV archive.

use voicelink::SessionArchive;

#[test]
fn test_archive_writes_playable_wav() {
    let dir = tempfile::tempdir().unwrap();

    let mut archive = SessionArchive::create(dir.path(), "call-test", 16000).unwrap();

    // Two 10ms frames of a constant tone.
    let frame: Vec<u8> = std::iter::repeat(1000i16)
        .take(160)
        .flat_map(|s| s.to_le_bytes())
        .collect();
    archive.write_frame(&frame).unwrap();
    archive.write_frame(&frame).unwrap();

    let path = archive.finish().unwrap();
    assert_eq!(path, dir.path().join("call-test.wav"));

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 320);
}

#[test]
fn test_archive_finalizes_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("call-dropped.wav");

    {
        let mut archive = SessionArchive::create(dir.path(), "call-dropped", 16000).unwrap();
        archive.write_frame(&[0, 0, 255, 127]).unwrap();
        // Dropped without finish(), as on abrupt teardown.
    }

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len(), 2, "Header must be finalized on drop");
}

#[test]
fn test_archive_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");

    let archive = SessionArchive::create(&nested, "call-nested", 16000).unwrap();
    assert!(archive.path().starts_with(&nested));
}
