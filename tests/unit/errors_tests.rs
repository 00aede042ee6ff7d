/*!
 * Tests for error types and conversions
 */

use serde_json::json;

use subscout::errors::{AppError, PipelineError, ProviderError, ToolError, TranslationError};

#[test]
fn test_toolError_fromErrorPayload_shouldKeepServerMessage() {
    let error = ToolError::from_error_payload(json!({"code": -32000, "message": "boom"}));
    let display = format!("{}", error);
    assert!(display.contains("boom"));
    assert!(matches!(error, ToolError::Protocol { ref message, .. } if message == "boom"));
}

#[test]
fn test_toolError_fromErrorPayload_withoutMessage_shouldShowPayload() {
    let error = ToolError::from_error_payload(json!({"code": 42}));
    assert!(format!("{}", error).contains("42"));
}

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
}

#[test]
fn test_translationError_fromProviderError_shouldWrapCorrectly() {
    let provider_error = ProviderError::ConnectionError("Host unreachable".to_string());
    let error: TranslationError = provider_error.into();
    assert!(format!("{}", error).contains("Host unreachable"));
}

#[test]
fn test_pipelineError_tool_shouldBeTransparent() {
    let error: PipelineError = ToolError::from_error_payload(json!({"message": "boom"})).into();
    assert_eq!(format!("{}", error), "Tool server returned an error: boom");
}

#[test]
fn test_pipelineError_missingTranslator_shouldNameLanguages() {
    let error = PipelineError::MissingTranslator {
        source_language: "en".to_string(),
        target_language: "fa".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("'en'"));
    assert!(display.contains("'fa'"));
}

#[test]
fn test_appError_conversions_shouldPickVariant() {
    let error: AppError = PipelineError::NoSubtitlesFound { title: "Heat".to_string() }.into();
    assert!(matches!(error, AppError::Pipeline(_)));

    let error: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(error, AppError::File(_)));

    let error: AppError = anyhow::anyhow!("odd").into();
    assert!(matches!(error, AppError::Unknown(ref message) if message == "odd"));
}
