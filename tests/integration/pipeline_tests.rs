/*!
 * Integration tests for the subtitle pipeline against in-memory doubles
 */

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use subscout::errors::{PipelineError, ToolError};
use subscout::metrics::{JsonlMetrics, MetricsSink};
use subscout::pipeline::{BatchRequest, PipelineSettings, PipelineStage, SubtitlePipeline};
use subscout::providers::mock::MockProvider;
use subscout::subtitle_processor::SubtitleCollection;
use subscout::tools::catalog::CatalogResolver;
use subscout::translation::{BatchProgress, BatchTranslator, PromptTemplate};

use crate::common::{self, item, RecordingSource, SAMPLE_SRT};

fn settings(dir: &TempDir) -> PipelineSettings {
    PipelineSettings {
        storage_dir: dir.path().to_path_buf(),
        ..PipelineSettings::default()
    }
}

fn translator(provider: &MockProvider) -> BatchTranslator {
    BatchTranslator::new(Arc::new(provider.clone()), PromptTemplate::default())
}

struct FixedCatalog {
    id: Result<Option<u64>, String>,
    calls: Mutex<Vec<String>>,
}

impl FixedCatalog {
    fn new(id: Result<Option<u64>, String>) -> Self {
        Self {
            id,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CatalogResolver for FixedCatalog {
    async fn resolve_id(&self, title: &str, _year: Option<i32>) -> Result<Option<u64>, ToolError> {
        self.calls.lock().push(title.to_string());
        self.id.clone().map_err(ToolError::Transport)
    }
}

#[tokio::test]
async fn test_runBest_withNoPreferredResults_shouldFallBackToSecondLanguage() {
    common::init_logging();
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("en-1", "en", Some(5.0), Some(10))]));
    let provider = MockProvider::working();
    let pipeline = SubtitlePipeline::new(source.clone(), settings(&dir)).with_translator(translator(&provider));

    let result = pipeline.run_best("Heat", Some(1995), None).await.unwrap();

    assert!(result.used_fallback);
    assert_eq!(source.searched_languages(), vec!["fa", "en"]);
    assert_eq!(result.item.id, "en-1");
}

#[tokio::test]
async fn test_runBest_withPreferredResults_shouldNotSearchFallback() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![
        item("fa-1", "fa", Some(1.0), None),
        item("en-1", "en", Some(9.0), None),
    ]));
    let pipeline = SubtitlePipeline::new(source.clone(), settings(&dir));

    let result = pipeline.run_best("Heat", None, None).await.unwrap();

    assert!(!result.used_fallback);
    assert!(!result.translated);
    assert_eq!(result.language, "fa");
    assert_eq!(result.text, SAMPLE_SRT);
    assert_eq!(source.searched_languages(), vec!["fa"]);
}

#[tokio::test]
async fn test_runBest_withForeignSubtitleAndTranslator_shouldTranslate() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("en-1", "en", None, None)]));
    let provider = MockProvider::working();
    let pipeline = SubtitlePipeline::new(source, settings(&dir)).with_translator(translator(&provider));

    let result = pipeline.run_best("Heat", None, None).await.unwrap();

    assert!(result.translated);
    assert_eq!(result.language, "fa");
    assert_ne!(result.text, SAMPLE_SRT);
    assert_eq!(result.bytes, result.text.as_bytes());
    assert_eq!(std::fs::read_to_string(&result.output_path).unwrap(), result.text);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(pipeline.stage(), PipelineStage::Persisted);
}

#[tokio::test]
async fn test_runBest_withForeignSubtitleAndNoTranslator_shouldFail() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("en-1", "en", None, None)]));
    let pipeline = SubtitlePipeline::new(source, settings(&dir));

    let result = pipeline.run_best("Heat", None, None).await;

    assert!(matches!(
        result,
        Err(PipelineError::MissingTranslator { ref source_language, ref target_language })
            if source_language == "en" && target_language == "fa"
    ));
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0, "nothing persisted");
}

#[tokio::test]
async fn test_runBest_withToolServerError_shouldPropagateMessage() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(Vec::new()).failing_for("Heat"));
    let pipeline = SubtitlePipeline::new(source, settings(&dir));

    let error = pipeline.run_best("Heat", None, None).await.unwrap_err();

    assert!(matches!(error, PipelineError::Tool(ToolError::Protocol { .. })));
    assert!(error.to_string().contains("boom"));
}

#[tokio::test]
async fn test_runBest_withFailingTranslator_shouldFailRun() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("en-1", "en", None, None)]));
    let provider = MockProvider::failing();
    let pipeline = SubtitlePipeline::new(source, settings(&dir)).with_translator(translator(&provider));

    let result = pipeline.run_best("Heat", None, None).await;

    assert!(matches!(result, Err(PipelineError::Translation(_))));
}

#[tokio::test]
async fn test_runBest_withUnparseableTranslation_shouldPersistOriginalText() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("en-1", "en", None, None)]));
    let provider = MockProvider::unparseable();
    let pipeline = SubtitlePipeline::new(source, settings(&dir)).with_translator(translator(&provider));

    let result = pipeline.run_best("Heat", None, None).await.unwrap();

    assert!(result.translated);
    assert_eq!(result.text, SubtitleCollection::parse(SAMPLE_SRT).compose());
}

#[tokio::test]
async fn test_runBest_withCatalog_shouldSearchWithResolvedId() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("fa-1", "fa", None, None)]));
    let catalog = Arc::new(FixedCatalog::new(Ok(Some(113277))));
    let pipeline = SubtitlePipeline::new(source.clone(), settings(&dir)).with_catalog(catalog.clone());

    pipeline.run_best("Heat", Some(1995), None).await.unwrap();

    assert_eq!(catalog.calls.lock().as_slice(), ["Heat"]);
    assert_eq!(source.searches()[0].catalog_id(), Some(113277));
}

#[tokio::test]
async fn test_runBest_withFailingCatalog_shouldSearchWithoutId() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("fa-1", "fa", None, None)]));
    let catalog = Arc::new(FixedCatalog::new(Err("catalog offline".to_string())));
    let pipeline = SubtitlePipeline::new(source.clone(), settings(&dir)).with_catalog(catalog);

    let result = pipeline.run_best("Heat", None, None).await;

    assert!(result.is_ok());
    assert_eq!(source.searches()[0].catalog_id(), None);
}

#[tokio::test]
async fn test_runSelected_withSameLanguage_shouldSkipTranslation() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(Vec::new()));
    let provider = MockProvider::working();
    let pipeline = SubtitlePipeline::new(source.clone(), settings(&dir)).with_translator(translator(&provider));
    let mut selected = item("42", "fr", None, None);
    selected.file_name = Some("Heat.1995.FRENCH.srt".to_string());

    let result = pipeline.run_selected("Heat", &selected, "fr", None).await.unwrap();

    assert!(!result.translated);
    assert_eq!(result.language, "fr");
    assert_eq!(provider.request_count(), 0);
    assert!(source.searches().is_empty());
    assert_eq!(result.output_path, dir.path().join("Heat_1995_FRENCH_srt.fr.srt"));
}

#[tokio::test]
async fn test_runSelected_withOtherLanguage_shouldReportProgress() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(Vec::new()));
    let provider = MockProvider::working();
    let pipeline = SubtitlePipeline::new(source, settings(&dir))
        .with_translator(translator(&provider).with_batch_size(2));
    let seen = Mutex::new(Vec::new());
    let sink = |progress: BatchProgress| -> anyhow::Result<()> {
        seen.lock().push(progress.current);
        Ok(())
    };

    let result = pipeline
        .run_selected("Heat", &item("42", "en", None, None), "de", Some(&sink))
        .await
        .unwrap();

    assert!(result.translated);
    assert_eq!(result.language, "de");
    assert_eq!(seen.lock().as_slice(), [1, 2]);
}

#[tokio::test]
async fn test_runSelected_withoutTranslator_shouldFail() {
    let dir = TempDir::new().unwrap();
    let pipeline = SubtitlePipeline::new(Arc::new(RecordingSource::new(Vec::new())), settings(&dir));

    let result = pipeline
        .run_selected("Heat", &item("42", "en", None, None), "fa", None)
        .await;

    assert!(matches!(result, Err(PipelineError::MissingTranslator { .. })));
}

#[tokio::test]
async fn test_runBatch_shouldKeepRequestOrderAndContinue() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("fa-1", "fa", None, None)]).failing_for("Broken"));
    let pipeline = SubtitlePipeline::new(source, settings(&dir));
    let requests = vec![
        BatchRequest::new("Heat", Some(1995)),
        BatchRequest::new("Broken", None),
        BatchRequest::new("Ronin", Some(1998)),
    ];

    let report = pipeline.run_batch(&requests).await;

    assert!(!report.all_succeeded());
    let succeeded: Vec<&str> = report.succeeded.iter().map(|(r, _)| r.title.as_str()).collect();
    assert_eq!(succeeded, vec!["Heat", "Ronin"]);
    assert_eq!(report.failed[0].0, requests[1]);
}

#[tokio::test]
async fn test_runBest_withJsonlMetrics_shouldNameRunAfterTitle() {
    let dir = TempDir::new().unwrap();
    let metrics_path = dir.path().join("runs.jsonl");
    let metrics = Arc::new(JsonlMetrics::new(&metrics_path, "tests"));
    let source = Arc::new(RecordingSource::new(vec![item("fa-1", "fa", None, None)]));
    let pipeline = SubtitlePipeline::new(source, settings(&dir)).with_metrics(metrics.clone() as Arc<dyn MetricsSink>);

    pipeline.run_best("The Matrix", None, None).await.unwrap();

    let events = common::read_events(&metrics_path);
    assert_eq!(events[0]["run_name"], "subtitle-search-The_Matrix");
    assert_eq!(events.last().unwrap()["status"], "FINISHED");
    assert!(events.iter().any(|e| e["key"] == "search_count" && e["value"] == 1.0));
    assert!(metrics.active_run_id().is_none());
}

#[tokio::test]
async fn test_runBest_withOtherRegionOfPreferredLanguage_shouldTranslate() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(RecordingSource::new(vec![item("pt-1", "pt-PT", None, None)]));
    let provider = MockProvider::working();
    let settings = PipelineSettings {
        preferred_language: "pt-BR".to_string(),
        fallback_language: "pt-PT".to_string(),
        storage_dir: dir.path().to_path_buf(),
    };
    let pipeline = SubtitlePipeline::new(source.clone(), settings).with_translator(translator(&provider));

    let result = pipeline.run_best("Heat", None, None).await.unwrap();

    assert!(result.used_fallback);
    assert!(result.translated);
    assert_eq!(result.language, "pt-BR");
    assert_eq!(source.searched_languages(), vec!["pt-BR", "pt-PT"]);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(result.output_path, dir.path().join("pt-1_srt.pt-BR.srt"));
}
