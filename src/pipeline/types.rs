use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::tools::types::SubtitleItem;

// @module: Values produced by pipeline runs

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Searching,
    Selecting,
    Downloading,
    Translating,
    Persisted,
    Failed,
}

impl PipelineStage {
    /// Whether the run cannot move any further
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Selecting => "selecting",
            Self::Downloading => "downloading",
            Self::Translating => "translating",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// Where the subtitle was written
    pub output_path: PathBuf,
    /// Language of the written text
    pub language: String,
    /// Whether the text went through the translator
    pub translated: bool,
    /// Final subtitle text
    pub text: String,
    /// `text` encoded as UTF-8
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// The subtitle that was downloaded
    pub item: SubtitleItem,
    /// Whether the preferred language had no results
    pub used_fallback: bool,
}

/// One title for a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub title: String,
    pub year: Option<i32>,
}

impl BatchRequest {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }

    /// Parse a `title[|year]` line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        match line.rsplit_once('|') {
            Some((title, year)) if !title.trim().is_empty() => {
                Some(Self::new(title.trim(), year.trim().parse().ok()))
            }
            _ => Some(Self::new(line, None)),
        }
    }
}

/// Results of a batch run, one entry per request, in request order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(BatchRequest, PipelineResult)>,
    /// Failed requests with the error message
    pub failed: Vec<(BatchRequest, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}
