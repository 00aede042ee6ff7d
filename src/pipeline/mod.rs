/*!
 * Subtitle acquisition pipeline.
 *
 * - `selector`: ranking of catalog matches and subtitle candidates
 * - `orchestrator`: the search, download, translate and persist run
 * - `types`: run results, stages and batch reports
 */

pub use self::orchestrator::{PipelineSettings, SubtitlePipeline};
pub use self::selector::{MatchCandidate, SubtitleSelector};
pub use self::types::{BatchReport, BatchRequest, PipelineResult, PipelineStage};

pub mod orchestrator;
pub mod selector;
pub mod types;
