/*!
 * Tests for SRT parsing and composition
 */

use anyhow::Result;

use subscout::file_utils::FileManager;
use subscout::subtitle_processor::{SubtitleCollection, SubtitleEntry};

use crate::common::SAMPLE_SRT;

#[test]
fn test_parse_withSampleDocument_shouldReadAllEntries() {
    let collection = SubtitleCollection::parse(SAMPLE_SRT);

    assert_eq!(collection.len(), 3);
    assert_eq!(collection.entries[0].start_time_ms, 1_000);
    assert_eq!(collection.entries[0].end_time_ms, 4_000);
    assert_eq!(collection.entries[2].text, "For testing purposes.");
}

#[test]
fn test_compose_withMultilineText_shouldSeparateBlocksWithBlankLine() {
    let collection = SubtitleCollection::new(vec![
        SubtitleEntry::new(1, 0, 1_500, "First\nline".to_string()),
        SubtitleEntry::new(2, 2_000, 3_000, "Second".to_string()),
    ]);

    assert_eq!(
        collection.compose(),
        "1\n00:00:00,000 --> 00:00:01,500\nFirst\nline\n\n2\n00:00:02,000 --> 00:00:03,000\nSecond\n\n"
    );
}

#[test]
fn test_parse_afterWriteAndDecode_shouldRoundTripThroughDisk() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("sample.srt");

    let collection = SubtitleCollection::parse(SAMPLE_SRT);
    FileManager::write_to_file(&path, &collection.compose())?;

    let bytes = std::fs::read(&path)?;
    let decoded = FileManager::decode_bytes(&bytes, None);
    assert_eq!(SubtitleCollection::parse(&decoded), collection);
    Ok(())
}

#[test]
fn test_parse_withLegacyEncodedDownload_shouldDecodeBeforeParsing() {
    // "Café" as windows-1252
    let mut bytes = b"1\n00:00:01,000 --> 00:00:02,000\nCaf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"\n");

    let text = FileManager::decode_bytes(&bytes, Some("windows-1252"));
    let collection = SubtitleCollection::parse(&text);

    assert_eq!(collection.entries[0].text, "Café");
}

#[test]
fn test_display_shouldMatchCompose() {
    let collection = SubtitleCollection::parse(SAMPLE_SRT);
    assert_eq!(collection.to_string(), collection.compose());
}
