/*!
 * Tests for application configuration functionality
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use subscout::app_config::{split_args, Config, LogLevel, ToolServerMode, TranslationProvider};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.tool_server.mode, ToolServerMode::Stdio);
    assert_eq!(config.tool_server.command, "npx");
    assert_eq!(config.tool_server.args, vec!["-y", "@opensubtitles/mcp-server"]);
    assert_eq!(config.tool_server.search_tool, "search_subtitles");
    assert_eq!(config.tool_server.download_tool, "download_subtitle");
    assert_eq!(config.tool_server.timeout(), Duration::from_secs(10));
    assert!(!config.catalog.enabled);
    assert_eq!(config.catalog.tool_name, "Autocomplete");
    assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
    assert_eq!(config.translation.batch_size, 20);
    assert_eq!(config.pipeline.preferred_language, "fa");
    assert_eq!(config.pipeline.fallback_language, "en");
    assert_eq!(config.pipeline.storage_dir, PathBuf::from("data/processed/subtitles"));
    assert!(!config.metrics.enabled);
    assert_eq!(config.log_level, LogLevel::Info);

    assert!(config.validate().is_ok());
}

#[test]
fn test_toolServerTimeout_shouldDependOnMode() {
    let mut config = Config::default();
    config.tool_server.mode = ToolServerMode::Http;
    assert_eq!(config.tool_server.timeout(), Duration::from_secs(30));

    config.tool_server.timeout_secs = Some(2.5);
    assert_eq!(config.tool_server.timeout(), Duration::from_millis(2500));
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();

    config.tool_server.command = "  ".to_string();
    assert!(config.validate().is_err());
    config.tool_server.command = "npx".to_string();

    config.tool_server.mode = ToolServerMode::Http;
    assert!(config.validate().is_err(), "http mode needs a base URL");
    config.tool_server.base_url = "http://localhost:8080".to_string();
    assert!(config.validate().is_ok());

    config.tool_server.timeout_secs = Some(0.0);
    assert!(config.validate().is_err());
    config.tool_server.timeout_secs = Some(-1.0);
    assert!(config.validate().is_err());
    config.tool_server.timeout_secs = None;

    config.translation.batch_size = 0;
    assert!(config.validate().is_err());
    config.translation.batch_size = 5;

    config.translation.timeout_secs = 0;
    assert!(config.validate().is_err());
    config.translation.timeout_secs = 60;

    config.pipeline.preferred_language = "x".to_string();
    assert!(config.validate().is_err());
    config.pipeline.preferred_language = "fa".to_string();

    config.pipeline.fallback_language = "much-too-long".to_string();
    assert!(config.validate().is_err());
    config.pipeline.fallback_language = "en".to_string();

    config.catalog.enabled = true;
    config.catalog.command = String::new();
    assert!(config.validate().is_err());
    config.catalog.command = "npx".to_string();

    assert!(config.validate().is_ok());
}

#[test]
fn test_applyEnv_withToolServerVariables_shouldOverride() {
    let mut config = Config::default();
    config
        .apply_env(&env(&[
            ("MCP_OPENSUBTITLES_MODE", "HTTP"),
            ("MCP_OPENSUBTITLES_URL", "http://tools.local"),
            ("MCP_OPENSUBTITLES_CALL_PATH", "/call"),
            ("MCP_OPENSUBTITLES_AUTH_TOKEN", "secret"),
            ("MCP_OPENSUBTITLES_ARGS", "a, b,,c"),
            ("MCP_OPENSUBTITLES_TOOL_SEARCH", "find"),
            ("MCP_OPENSUBTITLES_TOOL_DOWNLOAD", "fetch"),
            ("MCP_OPENSUBTITLES_TIMEOUT_S", "4"),
            ("MCP_OPENSUBTITLES_ENV_API_USER", "me"),
            ("MCP_OPENSUBTITLES_ENV_", "ignored"),
        ]))
        .unwrap();

    let tool_server = &config.tool_server;
    assert_eq!(tool_server.mode, ToolServerMode::Http);
    assert_eq!(tool_server.base_url, "http://tools.local");
    assert_eq!(tool_server.call_path, "/call");
    assert_eq!(tool_server.auth_token.as_deref(), Some("secret"));
    assert_eq!(tool_server.args, vec!["a", "b", "c"]);
    assert_eq!(tool_server.search_tool, "find");
    assert_eq!(tool_server.download_tool, "fetch");
    assert_eq!(tool_server.timeout(), Duration::from_secs(4));
    assert_eq!(tool_server.env.get("API_USER").map(String::as_str), Some("me"));
    assert_eq!(tool_server.env.len(), 1);
}

#[test]
fn test_applyEnv_withOtherVariables_shouldOverrideSections() {
    let mut config = Config::default();
    config
        .apply_env(&env(&[
            ("TRANSLATION_PROVIDER", "mock"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-test"),
            ("PROMPT_TRANSLATE_SRT", "prompts/custom.txt"),
            ("SUBTITLE_STORAGE_DIR", "/tmp/subs"),
            ("IMDB_MCP_COMMAND", "imdb-server"),
            ("IMDB_MCP_ARGS", "--stdio"),
            ("IMDB_MCP_TIMEOUT_S", "12"),
            ("METRICS_PATH", "/tmp/metrics.jsonl"),
        ]))
        .unwrap();

    assert_eq!(config.translation.provider, TranslationProvider::Mock);
    assert_eq!(config.translation.api_key, "sk-test");
    assert_eq!(config.translation.model, "gpt-test");
    assert_eq!(config.translation.prompt_path, Some(PathBuf::from("prompts/custom.txt")));
    assert_eq!(config.pipeline.storage_dir, PathBuf::from("/tmp/subs"));
    assert!(config.catalog.enabled);
    assert_eq!(config.catalog.command, "imdb-server");
    assert_eq!(config.catalog.args, vec!["--stdio"]);
    assert_eq!(config.catalog.timeout(), Duration::from_secs(12));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.path, PathBuf::from("/tmp/metrics.jsonl"));
}

#[test]
fn test_applyEnv_withInvalidValues_shouldFail() {
    let mut config = Config::default();
    assert!(config.apply_env(&env(&[("MCP_OPENSUBTITLES_MODE", "carrier-pigeon")])).is_err());
    assert!(config.apply_env(&env(&[("MCP_OPENSUBTITLES_TIMEOUT_S", "soon")])).is_err());
    assert!(config.apply_env(&env(&[("TRANSLATION_PROVIDER", "telepathy")])).is_err());
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("conf.json");

    let created = Config::load_or_create(&path).unwrap();
    assert!(path.exists());

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(created, loaded);
}

#[test]
fn test_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{
        "tool_server": { "mode": "http", "base_url": "http://localhost:3000" },
        "translation": { "provider": "none" },
        "log_level": "debug"
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.tool_server.mode, ToolServerMode::Http);
    assert_eq!(config.tool_server.call_path, "/tools/call");
    assert_eq!(config.translation.provider, TranslationProvider::None);
    assert_eq!(config.translation.model, "gpt-4o-mini");
    assert_eq!(config.pipeline.preferred_language, "fa");
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_splitArgs_shouldTrimAndDropEmptyParts() {
    assert_eq!(split_args("-y, @opensubtitles/mcp-server ,"), vec!["-y", "@opensubtitles/mcp-server"]);
    assert!(split_args("").is_empty());
}

#[test]
fn test_translationProvider_fromStr_shouldAcceptKnownNames() {
    assert_eq!("OpenAI".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenAI);
    assert_eq!("none".parse::<TranslationProvider>().unwrap(), TranslationProvider::None);
    assert_eq!(TranslationProvider::Mock.to_string(), "mock");
}
