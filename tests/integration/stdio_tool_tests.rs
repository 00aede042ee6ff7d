/*!
 * Integration tests for the OpenSubtitles adapter over a stdio tool server.
 *
 * The server is a small shell script answering the handshake and one call.
 */

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use subscout::errors::{PipelineError, ToolError};
use subscout::pipeline::{PipelineSettings, SubtitlePipeline};
use subscout::tools::types::SearchQuery;
use subscout::tools::{LaunchSpec, OpenSubtitlesTool, ProcessRpcClient, SubtitleSource};

const SCRIPTED_SERVER: &str = r#"read init; read initialized; read call
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}'
case "$call" in
  *search_subtitles*)
    printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"{\"subtitles\":[{\"subtitle_id\":\"42\",\"language\":\"fa\",\"files\":[{\"file_id\":420,\"file_name\":\"Heat.1995.fa.srt\"}],\"quality_info\":{\"download_count\":9}}]}"}]}}'
    ;;
  *download_subtitle*)
    printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"{\"content_base64\":\"MQowMDowMDowMSwwMDAgLS0+IDAwOjAwOjAyLDAwMApIZWxsbwoK\"}"}]}}'
    ;;
esac"#;

const FAILING_SERVER: &str = r#"read init; read initialized; read call
printf '%s\n' '{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"boom"}}'"#;

fn tool(script: &str) -> OpenSubtitlesTool<ProcessRpcClient> {
    let launch = LaunchSpec::new("sh", vec!["-c".to_string(), script.to_string()]);
    OpenSubtitlesTool::new(ProcessRpcClient::new(launch).with_timeout(Duration::from_secs(10)))
}

#[tokio::test]
async fn test_search_overStdio_shouldMapTextContent() {
    let query = SearchQuery::new("Heat", Some(1995), "fa").unwrap();

    let items = tool(SCRIPTED_SERVER).search(&query).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "42");
    assert_eq!(items[0].file_name.as_deref(), Some("Heat.1995.fa.srt"));
    assert_eq!(items[0].download_count, Some(9));
}

#[tokio::test]
async fn test_pipeline_overStdio_shouldSearchDownloadAndPersist() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        storage_dir: dir.path().to_path_buf(),
        ..PipelineSettings::default()
    };
    let pipeline = SubtitlePipeline::new(Arc::new(tool(SCRIPTED_SERVER)), settings);

    let result = pipeline.run_best("Heat", Some(1995), None).await.unwrap();

    assert_eq!(result.item.id, "42");
    assert!(!result.translated);
    assert_eq!(result.output_path, dir.path().join("Heat_1995_fa_srt.fa.srt"));
    assert!(result.text.contains("Hello"));
}

#[tokio::test]
async fn test_download_overStdio_shouldTagStdioSource() {
    let tool = tool(SCRIPTED_SERVER);
    let query = SearchQuery::new("Heat", None, "fa").unwrap();
    let items = tool.search(&query).await.unwrap();

    let result = tool.download(&items[0].download_request()).await.unwrap();

    assert_eq!(result.source, "opensubtitles_mcp_stdio");
    assert_eq!(result.file_name, "42.srt");
    assert_eq!(result.language, "fa");
}

#[tokio::test]
async fn test_pipeline_withServerError_shouldSurfaceServerMessage() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        storage_dir: dir.path().to_path_buf(),
        ..PipelineSettings::default()
    };
    let pipeline = SubtitlePipeline::new(Arc::new(tool(FAILING_SERVER)), settings);

    let error = pipeline.run_best("Heat", None, None).await.unwrap_err();

    match error {
        PipelineError::Tool(ToolError::Protocol { message, .. }) => assert_eq!(message, "boom"),
        other => panic!("expected protocol error, got {:?}", other),
    }
}
