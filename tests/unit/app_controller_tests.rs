/*!
 * Tests for the application controller
 */

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use subscout::app_config::{Config, ToolServerMode, TranslationProvider};
use subscout::errors::PipelineError;
use subscout::Controller;

use crate::common::{self, item, RecordingSource};

fn offline_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Mock;
    config.pipeline.storage_dir = dir.path().to_path_buf();
    config
}

#[test]
fn test_withConfig_withDefaultStdioServer_shouldBuildWithoutSpawning() {
    let dir = TempDir::new().unwrap();
    let controller = Controller::with_config(offline_config(&dir)).unwrap();

    assert!(controller.pipeline().has_translator());
    assert_eq!(controller.config().tool_server.mode, ToolServerMode::Stdio);
}

#[test]
fn test_withConfig_withHttpModeAndNoUrl_shouldFail() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.tool_server.mode = ToolServerMode::Http;

    assert!(Controller::with_config(config).is_err());
}

#[test]
fn test_withConfig_withOpenAiAndNoKey_shouldFail() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.translation.provider = TranslationProvider::OpenAI;
    config.translation.api_key = String::new();

    assert!(Controller::with_config(config).is_err());
}

#[test]
fn test_withConfig_withMissingPromptFile_shouldFail() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.translation.prompt_path = Some(dir.path().join("missing.txt"));

    assert!(Controller::with_config(config).is_err());
}

#[test]
fn test_withConfig_withProviderNone_shouldHaveNoTranslator() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.translation.provider = TranslationProvider::None;

    let controller = Controller::with_config(config).unwrap();
    assert!(!controller.pipeline().has_translator());
}

#[tokio::test]
async fn test_fetch_withOnlyFallbackSubtitles_shouldTranslateWithMock() {
    common::init_logging();
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("11", "en", Some(7.0), Some(3))]));
    let controller = Controller::new_for_test(source.clone(), dir.path()).unwrap();

    let result = controller.fetch("Heat", Some(1995)).await.unwrap();

    assert!(result.used_fallback);
    assert!(result.translated);
    assert_eq!(result.language, "fa");
    assert!(result.text.contains("[TRANSLATED] This is a test subtitle."));
    assert_eq!(result.output_path, dir.path().join("11_srt.fa.srt"));
    assert_eq!(source.searched_languages(), vec!["fa", "en"]);
}

#[tokio::test]
async fn test_fetch_withoutTranslator_shouldSurfaceMissingTranslator() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.translation.provider = TranslationProvider::None;
    let source = Arc::new(RecordingSource::new(vec![item("11", "en", None, None)]));
    let controller = Controller::with_source(config, source).unwrap().with_progress(false);

    let error = controller.fetch("Heat", None).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingTranslator { .. })
    ));
}

#[tokio::test]
async fn test_download_withKnownId_shouldTranslateToTarget() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![
        item("1", "en", Some(9.0), None),
        item("2", "en", Some(1.0), None),
    ]));
    let controller = Controller::new_for_test(source.clone(), dir.path()).unwrap();

    let result = controller
        .download("Heat", None, "2", Some("en"), Some("fr"))
        .await
        .unwrap();

    assert_eq!(result.item.id, "2");
    assert_eq!(result.language, "fr");
    assert!(result.translated);
    assert_eq!(source.downloads()[0].item_id, "2");
}

#[tokio::test]
async fn test_download_withUnknownId_shouldFail() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("1", "en", None, None)]));
    let controller = Controller::new_for_test(source.clone(), dir.path()).unwrap();

    let error = controller
        .download("Heat", None, "404", Some("en"), None)
        .await
        .unwrap_err();

    assert!(error.to_string().contains("404"));
    assert!(source.downloads().is_empty());
}

#[tokio::test]
async fn test_batchFromFile_shouldSkipCommentsAndContinuePastFailures() {
    let dir = TempDir::new().unwrap();
    let titles = dir.path().join("titles.txt");
    std::fs::write(&titles, "# watchlist\nHeat|1995\n\nBroken\nRonin|1998\n").unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("1", "fa", None, None)]).failing_for("Broken"));
    let controller = Controller::new_for_test(source, dir.path()).unwrap();

    let report = controller.batch_from_file(&titles).await.unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.title, "Broken");
    assert!(report.failed[0].1.contains("boom"));
}

#[tokio::test]
async fn test_batchFromFile_withOnlyComments_shouldFail() {
    let dir = TempDir::new().unwrap();
    let titles = dir.path().join("titles.txt");
    std::fs::write(&titles, "# nothing yet\n").unwrap();
    let controller = Controller::new_for_test(Arc::new(RecordingSource::new(Vec::new())), dir.path()).unwrap();

    assert!(controller.batch_from_file(&titles).await.is_err());
}

#[tokio::test]
async fn test_withMetricsEnabled_shouldRecordRunEvents() {
    let dir = TempDir::new().unwrap();
    let mut config = offline_config(&dir);
    config.metrics.enabled = true;
    config.metrics.path = dir.path().join("metrics").join("runs.jsonl");
    let source = Arc::new(RecordingSource::new(vec![item("1", "fa", None, None)]));
    let controller = Controller::with_source(config.clone(), source).unwrap().with_progress(false);

    controller.fetch("Heat", None).await.unwrap();

    let events = common::read_events(&config.metrics.path);
    let names: Vec<&str> = events.iter().filter_map(|e| e["event"].as_str()).collect();
    assert_eq!(names.first(), Some(&"run_start"));
    assert_eq!(names.last(), Some(&"run_end"));
    assert!(events.iter().any(|e| e["key"] == "search_latency_ms"));
    assert!(events.iter().any(|e| e["key"] == "download_latency_ms"));
    assert!(events.iter().any(|e| e["event"] == "artifact"));
}

#[test]
fn test_formatDuration_shouldPickUnits() {
    assert_eq!(Controller::format_duration(Duration::from_millis(1_250)), "1.250s");
    assert_eq!(Controller::format_duration(Duration::from_secs(125)), "2m 5s");
    assert_eq!(Controller::format_duration(Duration::from_secs(3_725)), "1h 2m 5s");
}
