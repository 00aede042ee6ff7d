/*!
 * Subtitle pipeline orchestration.
 *
 * A run moves through `Searching -> Selecting -> Downloading -> (Translating)
 * -> Persisted`; any error ends it in `Failed`. Tool calls within one run are
 * strictly sequential.
 *
 * Two entry points exist:
 * - `run_best` searches the preferred language, retries with the fallback
 *   language when nothing is found, picks the best item and translates it to
 *   the preferred language when needed.
 * - `run_selected` downloads an item the caller already chose and translates
 *   it to the caller's target language when needed.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::language_utils::language_codes_match;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::tools::catalog::CatalogResolver;
use crate::tools::types::{is_valid_language_code, SearchQuery, SubtitleItem};
use crate::tools::SubtitleSource;
use crate::translation::{BatchTranslator, ProgressSink};

use super::selector::SubtitleSelector;
use super::types::{BatchReport, BatchRequest, PipelineResult, PipelineStage};

/// Default language subtitles are wanted in
pub const DEFAULT_PREFERRED_LANGUAGE: &str = "fa";
/// Default language searched when the preferred one has no results
pub const DEFAULT_FALLBACK_LANGUAGE: &str = "en";
/// Default directory for written subtitles
pub const DEFAULT_STORAGE_DIR: &str = "data/processed/subtitles";

/// Languages and output location of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub preferred_language: String,
    pub fallback_language: String,
    pub storage_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            preferred_language: DEFAULT_PREFERRED_LANGUAGE.to_string(),
            fallback_language: DEFAULT_FALLBACK_LANGUAGE.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        }
    }
}

/// Search, select, download, translate and persist subtitles
pub struct SubtitlePipeline {
    source: Arc<dyn SubtitleSource>,
    translator: Option<BatchTranslator>,
    catalog: Option<Arc<dyn CatalogResolver>>,
    metrics: Arc<dyn MetricsSink>,
    settings: PipelineSettings,
    stage: Mutex<PipelineStage>,
}

/// A downloaded and decoded subtitle
struct Downloaded {
    item: SubtitleItem,
    text: String,
}

impl SubtitlePipeline {
    pub fn new(source: Arc<dyn SubtitleSource>, settings: PipelineSettings) -> Self {
        Self {
            source,
            translator: None,
            catalog: None,
            metrics: Arc::new(NoopMetrics),
            settings,
            stage: Mutex::new(PipelineStage::Idle),
        }
    }

    pub fn with_translator(mut self, translator: BatchTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Resolve catalog ids before searching
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogResolver>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn has_translator(&self) -> bool {
        self.translator.is_some()
    }

    /// Stage reached by the most recent run
    pub fn stage(&self) -> PipelineStage {
        *self.stage.lock()
    }

    fn enter(&self, next: PipelineStage) {
        let mut stage = self.stage.lock();
        info!("Pipeline stage: {} -> {}", *stage, next);
        *stage = next;
    }

    /// Search subtitles for one title in one language
    pub async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        language: &str,
    ) -> Result<Vec<SubtitleItem>, PipelineError> {
        let query = SearchQuery::new(title, year, language)?;
        self.search_query(&query).await
    }

    async fn search_query(&self, query: &SearchQuery) -> Result<Vec<SubtitleItem>, PipelineError> {
        let started = Instant::now();
        let items = self.source.search(query).await?;
        self.metrics
            .log_metric("search_latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        self.metrics.log_metric("search_count", items.len() as f64);
        debug!(
            "Search for '{}' in '{}' returned {} items",
            query.title(),
            query.language(),
            items.len()
        );
        Ok(items)
    }

    /// Find, download and persist the best subtitle for a title.
    ///
    /// The result is in the preferred language; a subtitle found only in
    /// another language is translated, which requires a translator.
    pub async fn run_best(
        &self,
        title: &str,
        year: Option<i32>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<PipelineResult, PipelineError> {
        self.metrics
            .start_run(&format!("subtitle-search-{}", FileManager::safe_filename(title)));
        self.metrics.log_params(&[
            ("title", title.to_string()),
            ("year", year.map(|y| y.to_string()).unwrap_or_default()),
            ("prefer_lang", self.settings.preferred_language.clone()),
            ("fallback_lang", self.settings.fallback_language.clone()),
        ]);

        let result = self.auto_best(title, year, progress).await;
        self.finish_run(&result);
        result
    }

    /// Download, translate if needed, and persist an item the caller picked
    pub async fn run_selected(
        &self,
        title: &str,
        item: &SubtitleItem,
        target_language: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<PipelineResult, PipelineError> {
        self.metrics
            .start_run(&format!("subtitle-download-{}", FileManager::safe_filename(title)));
        self.metrics.log_params(&[
            ("title", title.to_string()),
            ("selected_language", item.language.clone()),
            ("target_lang", target_language.to_string()),
        ]);

        let result = self.selected(title, item, target_language, progress).await;
        self.finish_run(&result);
        result
    }

    /// Run `run_best` for each request in order, continuing past failures
    pub async fn run_batch(&self, requests: &[BatchRequest]) -> BatchReport {
        let mut report = BatchReport::default();
        for (index, request) in requests.iter().enumerate() {
            info!(
                "Batch {}/{}: '{}'",
                index + 1,
                requests.len(),
                request.title
            );
            match self.run_best(&request.title, request.year, None).await {
                Ok(result) => report.succeeded.push((request.clone(), result)),
                Err(e) => {
                    warn!("Batch item '{}' failed: {}", request.title, e);
                    report.failed.push((request.clone(), e.to_string()));
                }
            }
        }
        info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    fn finish_run(&self, result: &Result<PipelineResult, PipelineError>) {
        match result {
            Ok(_) => {
                self.enter(PipelineStage::Persisted);
                self.metrics.end_run("FINISHED");
            }
            Err(e) => {
                self.enter(PipelineStage::Failed);
                warn!("Pipeline run failed: {}", e);
                self.metrics.end_run("FAILED");
            }
        }
    }

    async fn auto_best(
        &self,
        title: &str,
        year: Option<i32>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<PipelineResult, PipelineError> {
        let preferred = self.settings.preferred_language.as_str();
        let fallback = self.settings.fallback_language.as_str();

        self.enter(PipelineStage::Searching);
        let catalog_id = self.resolve_catalog_id(title, year).await;

        let query = SearchQuery::new(title, year, preferred)?.with_catalog_id(catalog_id);
        let mut items = self.search_query(&query).await?;
        let mut used_fallback = false;

        if items.is_empty() && !language_codes_match(preferred, fallback) {
            info!(
                "No '{}' subtitles for '{}', retrying in '{}'",
                preferred, title, fallback
            );
            let query = SearchQuery::new(title, year, fallback)?.with_catalog_id(catalog_id);
            items = self.search_query(&query).await?;
            used_fallback = true;
        }

        self.enter(PipelineStage::Selecting);
        let best = SubtitleSelector::select_best(&items)
            .cloned()
            .ok_or_else(|| PipelineError::NoSubtitlesFound {
                title: title.to_string(),
            })?;
        info!("Selected subtitle {} ({}) in '{}'", best.id, best.label(), best.language);

        let downloaded = self.download(&best).await?;
        self.finalize(title, downloaded, preferred, used_fallback, progress)
            .await
    }

    async fn selected(
        &self,
        title: &str,
        item: &SubtitleItem,
        target_language: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<PipelineResult, PipelineError> {
        if !is_valid_language_code(target_language) {
            return Err(PipelineError::InvalidQuery(format!(
                "target language '{}' is not a valid code",
                target_language
            )));
        }

        let downloaded = self.download(item).await?;
        self.finalize(title, downloaded, target_language, false, progress)
            .await
    }

    /// Catalog id for the title, if a catalog is configured and knows it
    async fn resolve_catalog_id(&self, title: &str, year: Option<i32>) -> Option<u64> {
        let catalog = self.catalog.as_ref()?;
        match catalog.resolve_id(title, year).await {
            Ok(Some(id)) => {
                debug!("Resolved '{}' to catalog id {}", title, id);
                Some(id)
            }
            Ok(None) => {
                debug!("No catalog match for '{}'", title);
                None
            }
            Err(e) => {
                warn!("Catalog lookup for '{}' failed, searching without id: {}", title, e);
                None
            }
        }
    }

    async fn download(&self, item: &SubtitleItem) -> Result<Downloaded, PipelineError> {
        self.enter(PipelineStage::Downloading);
        let started = Instant::now();
        let result = self.source.download(&item.download_request()).await?;
        self.metrics
            .log_metric("download_latency_ms", started.elapsed().as_secs_f64() * 1000.0);

        let text = FileManager::decode_bytes(&result.content, item.encoding.as_deref());
        debug!(
            "Downloaded {} bytes for subtitle {} from {}",
            result.content.len(),
            item.id,
            result.source
        );

        let mut item = item.clone();
        if item.file_name.is_none() && !result.file_name.is_empty() {
            item.file_name = Some(result.file_name);
        }
        Ok(Downloaded { item, text })
    }

    /// Translate when the language differs from `target_language`, then write
    async fn finalize(
        &self,
        title: &str,
        downloaded: Downloaded,
        target_language: &str,
        used_fallback: bool,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<PipelineResult, PipelineError> {
        let Downloaded { item, mut text } = downloaded;
        let mut translated = false;

        if !language_codes_match(&item.language, target_language) {
            let translator = self
                .translator
                .as_ref()
                .ok_or_else(|| PipelineError::MissingTranslator {
                    source_language: item.language.clone(),
                    target_language: target_language.to_string(),
                })?;

            self.enter(PipelineStage::Translating);
            let started = Instant::now();
            text = translator
                .translate(&text, &item.language, target_language, progress)
                .await?;
            self.metrics.log_metric(
                "translation_latency_ms",
                started.elapsed().as_secs_f64() * 1000.0,
            );
            translated = true;
        }

        let name = item.file_name.as_deref().unwrap_or(title);
        let output_path =
            FileManager::subtitle_output_path(&self.settings.storage_dir, name, target_language);
        persist(&output_path, &text)?;
        self.metrics.log_artifact(&output_path);
        info!("Subtitle written to {}", output_path.display());

        let language = if translated {
            target_language.to_string()
        } else {
            item.language.clone()
        };
        Ok(PipelineResult {
            output_path,
            language,
            translated,
            bytes: text.as_bytes().to_vec(),
            text,
            item,
            used_fallback,
        })
    }
}

fn persist(path: &Path, text: &str) -> Result<(), PipelineError> {
    FileManager::write_to_file(path, text).map_err(|e| PipelineError::Persistence(format!("{:#}", e)))
}
