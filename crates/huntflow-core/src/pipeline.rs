use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::Instrument;

use crate::{
    analysis::{self, AnalysisError},
    config::PipelineConfig,
    layout::{ResultsLayout, TargetDirs},
    llm::{self, LlmClient, LlmSettings},
    phase::Phase,
    runner::{Launchers, PhaseRequest, ProcessRunner, ScriptRunner},
};

/// Outcome of a script-backed phase for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Succeeded,
    Failed,
    /// Not attempted because an earlier gate failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    /// `llm.enabled` is false.
    Disabled,
    /// Recon failed, so analysis was never attempted.
    Skipped,
    /// Analysis ran but produced nothing (client unavailable, no data, template or model error, write failure).
    Failed,
    Saved(PathBuf),
}

/// What happened to a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub results_dir: Option<PathBuf>,
    pub recon: PhaseStatus,
    pub analysis: AnalysisStatus,
    pub scan: PhaseStatus,
}

impl TargetReport {
    fn skipped(target: &str, results_dir: Option<PathBuf>) -> Self {
        Self {
            target: target.to_string(),
            results_dir,
            recon: PhaseStatus::Failed,
            analysis: AnalysisStatus::Skipped,
            scan: PhaseStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub targets: Vec<TargetReport>,
}

impl RunSummary {
    pub fn recon_failures(&self) -> usize {
        self.count(|report| report.recon == PhaseStatus::Failed)
    }

    pub fn scan_failures(&self) -> usize {
        self.count(|report| report.scan == PhaseStatus::Failed)
    }

    pub fn suggestions_saved(&self) -> usize {
        self.count(|report| matches!(report.analysis, AnalysisStatus::Saved(_)))
    }

    fn count(&self, predicate: impl Fn(&TargetReport) -> bool) -> usize {
        self.targets.iter().filter(|report| predicate(report)).count()
    }
}

/// Sequential recon → analysis → scan driver.
///
/// Targets are processed one at a time in input order. A failed recon skips
/// the remaining phases of that target; analysis and scan failures are logged
/// and never stop the run.
pub struct Pipeline {
    config: PipelineConfig,
    runner: Box<dyn ScriptRunner>,
    llm: Option<Box<dyn LlmClient>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, runner: Box<dyn ScriptRunner>) -> Self {
        Self {
            config,
            runner,
            llm: None,
        }
    }

    /// Wire the process runner and, when `llm.enabled`, the configured provider.
    ///
    /// A provider that cannot be constructed (unknown name, missing API key)
    /// is logged and leaves analysis without a client for this run.
    pub fn from_config(config: PipelineConfig) -> Self {
        let runner = ProcessRunner::new(Launchers::with_overrides(&config.interpreters));
        let client = if config.llm.enabled {
            match LlmSettings::from_config(&config.llm).and_then(|s| llm::build_client(&s)) {
                Ok(client) => Some(client),
                Err(err) => {
                    tracing::error!("LLM client unavailable, analysis will be skipped: {err:#}");
                    None
                }
            }
        } else {
            None
        };
        let pipeline = Self::new(config, Box::new(runner));
        match client {
            Some(client) => pipeline.with_llm(client),
            None => pipeline,
        }
    }

    pub fn with_llm(mut self, client: Box<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every target. Only failure to create the base output directory is fatal.
    pub async fn run(&self, targets: &[String]) -> io::Result<RunSummary> {
        let mut layout = ResultsLayout::new(&self.config.output.base_directory);
        layout.ensure_base()?;

        let mut summary = RunSummary::default();
        for target in targets {
            let span =
                tracing::info_span!("target", host = %target, dir = tracing::field::Empty);
            let report = self.process_target(&mut layout, target).instrument(span).await;
            summary.targets.push(report);
        }

        tracing::info!(
            targets = summary.targets.len(),
            recon_failures = summary.recon_failures(),
            scan_failures = summary.scan_failures(),
            suggestions = summary.suggestions_saved(),
            "All targets processed."
        );
        Ok(summary)
    }

    async fn process_target(&self, layout: &mut ResultsLayout, target: &str) -> TargetReport {
        tracing::info!("--- Processing Target: {target} ---");
        let dirs = match layout.target_dirs(target) {
            Ok(dirs) => dirs,
            Err(err) => {
                tracing::error!("Could not create results directory for {target}: {err}");
                return TargetReport::skipped(target, None);
            }
        };
        tracing::Span::current().record("dir", tracing::field::display(&dirs.name));

        if !self.run_phase(Phase::Recon, &self.config.scripts.recon, target, &dirs).await {
            tracing::warn!(
                "Reconnaissance failed for {target}. Skipping further analysis and scans."
            );
            return TargetReport::skipped(target, Some(dirs.root));
        }

        let analysis = self.analyze(target, &dirs).await;

        let scan = if self.run_phase(Phase::Scan, &self.config.scripts.scan, target, &dirs).await {
            PhaseStatus::Succeeded
        } else {
            tracing::warn!("Scanning failed for {target}.");
            PhaseStatus::Failed
        };

        tracing::info!("--- Finished Processing Target: {target} ---");
        TargetReport {
            target: target.to_string(),
            results_dir: Some(dirs.root),
            recon: PhaseStatus::Succeeded,
            analysis,
            scan,
        }
    }

    /// Run one script-backed phase; `true` only on a zero exit status.
    async fn run_phase(&self, phase: Phase, script: &Path, target: &str, dirs: &TargetDirs) -> bool {
        let span = tracing::info_span!("phase", phase = %phase);
        async {
            if let Err(err) = dirs.ensure_phase(phase) {
                tracing::error!(
                    "Could not create {} directory for {target}: {err}",
                    phase.dir_name()
                );
                return false;
            }
            let request = PhaseRequest {
                phase,
                script,
                target,
                results_dir: &dirs.root,
            };

            tracing::info!("Running {phase} script for target: {target}");
            match self.runner.run(&request).await {
                Ok(outcome) if outcome.success() => {
                    tracing::info!(
                        "{} script completed successfully for {target}.",
                        phase.label()
                    );
                    tracing::debug!("Script output:\n{}", outcome.stdout);
                    true
                }
                Ok(outcome) => {
                    let code = outcome
                        .exit_code
                        .map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string());
                    tracing::error!(
                        "{} script failed for {target} with return code {code}.",
                        phase.label()
                    );
                    tracing::error!("Script stderr:\n{}", outcome.stderr);
                    tracing::error!("Script stdout:\n{}", outcome.stdout);
                    false
                }
                Err(err) => {
                    tracing::error!("{err}");
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn analyze(&self, target: &str, dirs: &TargetDirs) -> AnalysisStatus {
        let llm = &self.config.llm;
        if !llm.enabled {
            tracing::info!("LLM analysis disabled in config.");
            return AnalysisStatus::Disabled;
        }
        tracing::info!("LLM analysis enabled in config.");
        let span = tracing::info_span!("phase", phase = %Phase::Analysis);
        async {
            let Some(client) = self.llm.as_deref() else {
                tracing::warn!("Failed to generate LLM suggestions for {target}: no LLM client available.");
                return AnalysisStatus::Failed;
            };
            let analysis_dir = match dirs.ensure_phase(Phase::Analysis) {
                Ok(dir) => dir,
                Err(err) => {
                    tracing::error!("Could not create analysis directory for {target}: {err}");
                    return AnalysisStatus::Failed;
                }
            };
            let recon_dir = dirs.phase_path(Phase::Recon);

            let suggestions = analysis::get_suggestions(
                client,
                &dirs.name,
                &recon_dir,
                &llm.model,
                &llm.prompt_template,
            )
            .await;
            match suggestions {
                Ok(text) => match analysis::save_suggestions(&analysis_dir, &text) {
                    Ok(path) => {
                        tracing::info!("LLM suggestions saved to {}", path.display());
                        AnalysisStatus::Saved(path)
                    }
                    Err(err) => {
                        tracing::error!("Failed to save LLM suggestions for {target}: {err}");
                        AnalysisStatus::Failed
                    }
                },
                Err(err @ AnalysisError::NoReconData { .. }) => {
                    tracing::warn!("Skipping LLM analysis for {target}: {err}");
                    AnalysisStatus::Failed
                }
                Err(err) => {
                    tracing::error!("{err}");
                    tracing::warn!("Failed to generate LLM suggestions for {target}.");
                    AnalysisStatus::Failed
                }
            }
        }
        .instrument(span)
        .await
    }
}
