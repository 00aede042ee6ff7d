use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{CatalogConfig, Config, MetricsConfig, ToolServerConfig, ToolServerMode, TranslationConfig, TranslationProvider};
use crate::file_utils::FileManager;
use crate::metrics::{JsonlMetrics, MetricsSink, NoopMetrics};
use crate::pipeline::{BatchReport, BatchRequest, PipelineResult, PipelineSettings, SubtitlePipeline};
use crate::providers::mock::MockProvider;
use crate::providers::openai::OpenAI;
use crate::providers::LlmClient;
use crate::tools::catalog::{CatalogLookup, CatalogResolver};
use crate::tools::process::{LaunchSpec, StdinDelivery};
use crate::tools::types::SubtitleItem;
use crate::tools::{HttpToolClient, OpenSubtitlesTool, ProcessRpcClient, SubtitleSource};
use crate::translation::{BatchTranslator, PromptTemplate, ProgressSink};

// @module: Application controller wiring configuration into a pipeline

/// Main application controller for subtitle search and translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Pipeline built from the configuration
    pipeline: SubtitlePipeline,
    // @field: Draw progress bars while translating
    show_progress: bool,
}

impl Controller {
    /// Create a new controller for test purposes: offline mock translator, no catalog
    pub fn new_for_test(source: Arc<dyn SubtitleSource>, storage_dir: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.translation.provider = TranslationProvider::Mock;
        config.pipeline.storage_dir = storage_dir.to_path_buf();
        Ok(Self::with_source(config, source)?.with_progress(false))
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let metrics = Self::build_metrics(&config.metrics);
        let source = Self::build_source(&config.tool_server, Arc::clone(&metrics))?;
        Self::assemble(config, source, metrics)
    }

    /// Create a controller around an existing subtitle source
    pub fn with_source(config: Config, source: Arc<dyn SubtitleSource>) -> Result<Self> {
        let metrics = Self::build_metrics(&config.metrics);
        Self::assemble(config, source, metrics)
    }

    fn assemble(config: Config, source: Arc<dyn SubtitleSource>, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        let settings = PipelineSettings {
            preferred_language: config.pipeline.preferred_language.clone(),
            fallback_language: config.pipeline.fallback_language.clone(),
            storage_dir: config.pipeline.storage_dir.clone(),
        };

        let mut pipeline = SubtitlePipeline::new(source, settings).with_metrics(metrics);
        if let Some(translator) = Self::build_translator(&config.translation)? {
            pipeline = pipeline.with_translator(translator);
        }
        if let Some(catalog) = Self::build_catalog(&config.catalog) {
            pipeline = pipeline.with_catalog(catalog);
        }

        Ok(Self {
            config,
            pipeline,
            show_progress: true,
        })
    }

    /// Enable or disable progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &SubtitlePipeline {
        &self.pipeline
    }

    /// Metrics sink for the configuration: JSON Lines file when enabled
    pub fn build_metrics(config: &MetricsConfig) -> Arc<dyn MetricsSink> {
        if config.enabled {
            info!("Recording run metrics to {}", config.path.display());
            Arc::new(JsonlMetrics::new(&config.path, &config.experiment))
        } else {
            Arc::new(NoopMetrics)
        }
    }

    /// Subtitle source over the configured transport
    pub fn build_source(config: &ToolServerConfig, metrics: Arc<dyn MetricsSink>) -> Result<Arc<dyn SubtitleSource>> {
        let source: Arc<dyn SubtitleSource> = match config.mode {
            ToolServerMode::Http => {
                let client = HttpToolClient::new(
                    &config.base_url,
                    &config.call_path,
                    config.auth_token.clone(),
                    config.timeout(),
                )
                .context("Failed to create HTTP tool client")?;
                Arc::new(
                    OpenSubtitlesTool::new(client)
                        .with_tool_names(&config.search_tool, &config.download_tool)
                        .with_metrics(metrics),
                )
            }
            ToolServerMode::Stdio => {
                let launch = LaunchSpec::new(config.command.clone(), config.args.clone())
                    .with_env(to_env_map(&config.env));
                let client = ProcessRpcClient::new(launch).with_timeout(config.timeout());
                Arc::new(
                    OpenSubtitlesTool::new(client)
                        .with_tool_names(&config.search_tool, &config.download_tool)
                        .with_metrics(metrics),
                )
            }
        };
        info!("Subtitle tool server: {} mode", config.mode);
        Ok(source)
    }

    /// Translator for the configured provider, `None` when translation is disabled
    pub fn build_translator(config: &TranslationConfig) -> Result<Option<BatchTranslator>> {
        let llm: Arc<dyn LlmClient> = match config.provider {
            TranslationProvider::None => {
                info!("Translation disabled");
                return Ok(None);
            }
            TranslationProvider::Mock => Arc::new(MockProvider::working()),
            TranslationProvider::OpenAI => Arc::new(
                OpenAI::new(
                    config.api_key.clone(),
                    config.endpoint.clone(),
                    config.model.clone(),
                    Duration::from_secs(config.timeout_secs),
                )
                .context("Failed to create OpenAI client")?
                .with_temperature(config.temperature),
            ),
        };

        let template = match &config.prompt_path {
            Some(path) => PromptTemplate::from_file(path)
                .with_context(|| format!("Failed to load prompt template: {}", path.display()))?,
            None => PromptTemplate::default(),
        };

        info!("Translator: {} - {}", config.provider.display_name(), llm.model_name());
        Ok(Some(BatchTranslator::new(llm, template).with_batch_size(config.batch_size)))
    }

    /// Catalog lookup through its own stdio server, when enabled
    pub fn build_catalog(config: &CatalogConfig) -> Option<Arc<dyn CatalogResolver>> {
        if !config.enabled {
            return None;
        }
        let delivery = if config.stdin_delays_ms.is_empty() {
            StdinDelivery::Batch
        } else {
            StdinDelivery::Staggered {
                delays: config.stdin_delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            }
        };
        let launch = LaunchSpec::new(config.command.clone(), config.args.clone()).with_env(to_env_map(&config.env));
        let client = ProcessRpcClient::new(launch)
            .with_timeout(config.timeout())
            .with_delivery(delivery);
        info!("Catalog lookup enabled through '{}'", config.command);
        Some(Arc::new(CatalogLookup::new(client).with_tool_name(&config.tool_name)))
    }

    /// Search subtitles, in the preferred language unless one is given
    pub async fn search(&self, title: &str, year: Option<i32>, language: Option<&str>) -> Result<Vec<SubtitleItem>> {
        let language = language.unwrap_or(&self.config.pipeline.preferred_language);
        let items = self.pipeline.search(title, year, language).await?;
        info!("Found {} subtitles for '{}' in '{}'", items.len(), title, language);
        Ok(items)
    }

    /// Fetch the best subtitle for a title in the preferred language
    pub async fn fetch(&self, title: &str, year: Option<i32>) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let progress_bar = self.progress_bar();
        let result = self
            .pipeline
            .run_best(title, year, progress_bar.as_ref().map(|pb| pb as &dyn ProgressSink))
            .await;
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }
        let result = result?;
        self.report(&result, start_time.elapsed());
        Ok(result)
    }

    /// Download one subtitle chosen by id from a search, translating to `target_language`
    pub async fn download(
        &self,
        title: &str,
        year: Option<i32>,
        item_id: &str,
        search_language: Option<&str>,
        target_language: Option<&str>,
    ) -> Result<PipelineResult> {
        let items = self.search(title, year, search_language).await?;
        let item = items
            .into_iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| anyhow!("Subtitle {} is not among the search results for '{}'", item_id, title))?;
        let target = target_language.unwrap_or(&self.config.pipeline.preferred_language);

        let start_time = Instant::now();
        let progress_bar = self.progress_bar();
        let result = self
            .pipeline
            .run_selected(title, &item, target, progress_bar.as_ref().map(|pb| pb as &dyn ProgressSink))
            .await;
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }
        let result = result?;
        self.report(&result, start_time.elapsed());
        Ok(result)
    }

    /// Fetch every title in order, continuing past failures
    pub async fn batch(&self, requests: &[BatchRequest]) -> BatchReport {
        let start_time = Instant::now();
        let report = self.pipeline.run_batch(requests).await;
        info!(
            "Processed {} titles in {}: {} succeeded, {} failed",
            report.total(),
            Self::format_duration(start_time.elapsed()),
            report.succeeded.len(),
            report.failed.len()
        );
        for (request, error) in &report.failed {
            warn!("'{}' failed: {}", request.title, error);
        }
        report
    }

    /// Read `title[|year]` lines from a file and fetch each title
    pub async fn batch_from_file<P: AsRef<Path>>(&self, path: P) -> Result<BatchReport> {
        let content = FileManager::read_to_string(path)?;
        let requests: Vec<BatchRequest> = content.lines().filter_map(BatchRequest::parse_line).collect();
        if requests.is_empty() {
            return Err(anyhow!("No titles found in batch file"));
        }
        Ok(self.batch(&requests).await)
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.show_progress || !self.pipeline.has_translator() {
            return None;
        }
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");
        Some(progress_bar)
    }

    fn report(&self, result: &PipelineResult, elapsed: Duration) {
        let mut notes = Vec::new();
        if result.used_fallback {
            notes.push("fallback language");
        }
        if result.translated {
            notes.push("translated");
        }
        info!(
            "Success: {} [{}{}] in {}",
            result.output_path.display(),
            result.language,
            if notes.is_empty() { String::new() } else { format!(", {}", notes.join(", ")) },
            Self::format_duration(elapsed)
        );
    }

    // Format duration in a human-readable format (HH:MM:SS)
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

fn to_env_map(env: &std::collections::BTreeMap<String, String>) -> HashMap<String, String> {
    env.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
