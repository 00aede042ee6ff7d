// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use subscout::app_config::{Config, LogLevel, TranslationProvider};
use subscout::language_utils;
use subscout::tools::types::SubtitleItem;
use subscout::Controller;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    OpenAI,
    Mock,
    None,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
            CliTranslationProvider::None => TranslationProvider::None,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List subtitles available for a title
    Search(SearchArgs),

    /// Fetch the best subtitle for a title, translating it when needed
    Fetch(FetchArgs),

    /// Download one subtitle from the search results by id
    Download(DownloadArgs),

    /// Fetch subtitles for every title listed in a file
    Batch(BatchArgs),

    /// Generate shell completions for subscout
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Movie or series title
    title: String,

    /// Release year
    #[arg(short, long)]
    year: Option<i32>,

    /// Language code to search (defaults to the preferred language)
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Movie or series title
    title: String,

    /// Release year
    #[arg(short, long)]
    year: Option<i32>,

    /// Preferred language code (e.g., 'fa', 'fr')
    #[arg(long)]
    preferred_language: Option<String>,

    /// Language searched when the preferred one has no results
    #[arg(long)]
    fallback_language: Option<String>,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Movie or series title
    title: String,

    /// Subtitle id as printed by `search`
    #[arg(long)]
    id: String,

    /// Release year
    #[arg(short, long)]
    year: Option<i32>,

    /// Language code the subtitle was found in
    #[arg(short, long)]
    language: Option<String>,

    /// Language code to translate to (defaults to the preferred language)
    #[arg(short, long)]
    target_language: Option<String>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// File with one `title` or `title|year` per line
    #[arg(value_name = "TITLES_FILE")]
    titles_file: PathBuf,
}

/// subscout - subtitle search, download and translation
///
/// Finds subtitles through an OpenSubtitles tool server and translates them
/// with an LLM when the wanted language is not available.
#[derive(Parser, Debug)]
#[command(name = "subscout")]
#[command(version)]
#[command(about = "Subtitle search, download and translation tool")]
#[command(long_about = "subscout finds subtitles through a subtitle tool server and translates them with an LLM.

EXAMPLES:
    subscout search \"Heat\" -y 1995 -l en        # List English subtitles
    subscout fetch \"Heat\" -y 1995               # Best subtitle in the preferred language
    subscout download \"Heat\" --id 42 -t fr      # Download one result, translate to French
    subscout batch titles.txt                   # One `title|year` per line
    subscout completions bash > subscout.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. Environment variables such as
    MCP_OPENSUBTITLES_MODE, OPENAI_API_KEY or SUBTITLE_STORAGE_DIR override it.

SUPPORTED PROVIDERS:
    openai - OpenAI chat completions (requires API key)
    mock   - Offline provider that marks lines as translated
    none   - Translation disabled")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Marker for log level
    fn get_marker_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "✖ ",
            Level::Warn => "⚠ ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "· ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_marker_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subscout", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        log::set_max_level(LogLevel::from(level.clone()).to_level_filter());
    }

    let config = load_config(&cli)?;
    let controller = Controller::with_config(config).context("Failed to initialize")?;

    match cli.command {
        Commands::Search(args) => {
            let items = controller
                .search(&args.title, args.year, args.language.as_deref())
                .await?;
            print_items(&items);
        }
        Commands::Fetch(args) => {
            let result = controller.fetch(&args.title, args.year).await?;
            println!("{}", result.output_path.display());
        }
        Commands::Download(args) => {
            let result = controller
                .download(
                    &args.title,
                    args.year,
                    &args.id,
                    args.language.as_deref(),
                    args.target_language.as_deref(),
                )
                .await?;
            println!("{}", result.output_path.display());
        }
        Commands::Batch(args) => {
            let report = controller.batch_from_file(&args.titles_file).await?;
            for (request, result) in &report.succeeded {
                println!("{}\t{}", request.title, result.output_path.display());
            }
            if !report.all_succeeded() {
                return Err(anyhow!(
                    "{} of {} titles failed",
                    report.failed.len(),
                    report.total()
                ));
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load the configuration, apply environment and command line overrides, validate
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        config.translation.model = model.clone();
    }
    if let Commands::Fetch(args) = &cli.command {
        if let Some(language) = &args.preferred_language {
            config.pipeline.preferred_language = language.clone();
        }
        if let Some(language) = &args.fallback_language {
            config.pipeline.fallback_language = language.clone();
        }
    }

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    match &cli.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    Ok(config)
}

fn print_items(items: &[SubtitleItem]) {
    if items.is_empty() {
        println!("No subtitles found.");
        return;
    }
    println!("{:<12} {:<16} {:>9} {:>6}  RELEASE", "ID", "LANGUAGE", "DOWNLOADS", "SCORE");
    for item in items {
        println!(
            "{:<12} {:<16} {:>9} {:>6}  {}",
            item.id,
            language_utils::display_label(&item.language),
            item.download_count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            item.score.map(|s| format!("{:.1}", s)).unwrap_or_else(|| "-".to_string()),
            item.label()
        );
    }
}
