pub mod analysis;
pub mod config;
pub mod layout;
pub mod llm;
pub mod phase;
pub mod pipeline;
pub mod runner;
pub mod targets;

pub use analysis::{AnalysisError, PromptError};
pub use config::{ConfigError, LlmConfig, OutputConfig, PipelineConfig, ScriptsConfig};
pub use layout::{sanitize_target, ResultsLayout, TargetDirs};
pub use llm::{LlmClient, LlmSettings, NoopLlmClient};
pub use phase::Phase;
pub use pipeline::{AnalysisStatus, Pipeline, PhaseStatus, RunSummary, TargetReport};
pub use runner::{Launchers, PhaseRequest, ProcessOutcome, ProcessRunner, RunnerError, ScriptRunner};
pub use targets::{load_targets, parse_targets, TargetsError};
