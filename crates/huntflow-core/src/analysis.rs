//! LLM-assisted analysis of reconnaissance output.
//!
//! Recon scripts leave a handful of well-known files behind; the first lines of
//! each are stitched into a labelled summary, substituted into the configured
//! prompt template and sent to the model. The response is persisted verbatim
//! under the target's `analysis/` directory.

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::llm::LlmClient;

pub const SUGGESTIONS_FILE: &str = "llm_suggestions.txt";

/// Lines read from the head of each recon file.
pub const MAX_LINES_PER_FILE: usize = 50;

/// Recon outputs consulted for the summary, paired with their section headings.
pub const RECON_SOURCES: [(&str, &str); 4] = [
    ("subdomains.txt", "Subdomains"),
    ("live_hosts.txt", "Live Hosts/URLs"),
    ("ports_tcp.txt", "Open TCP Ports"),
    ("web_technologies.json", "Web Technologies Detected"),
];

/// Errors from rendering a prompt template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown placeholder `{{{0}}}` (available: {{target}}, {{summary}})")]
    UnknownPlaceholder(String),
    #[error("unbalanced `{brace}` at byte {position}")]
    UnbalancedBrace { brace: char, position: usize },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no reconnaissance data found or readable in {}", recon_dir.display())]
    NoReconData { recon_dir: PathBuf },
    #[error("error formatting prompt template: {0}")]
    Template(#[from] PromptError),
    #[error("error querying LLM model `{model}`: {reason}")]
    Model { model: String, reason: String },
}

/// Read at most `max_lines` lines from the start of `path`, trimmed.
///
/// Missing, unreadable or blank files yield `None`. Invalid UTF-8 is replaced.
pub fn read_head(path: &Path, max_lines: usize) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Recon file not found: {}", path.display());
            return None;
        }
        Err(err) => {
            tracing::warn!("Error reading file {}: {}", path.display(), err);
            return None;
        }
    };
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    for _ in 0..max_lines {
        match reader.read_until(b'\n', &mut bytes) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("Error reading file {}: {}", path.display(), err);
                return None;
            }
        }
    }
    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build the labelled recon summary, or `None` when no source file has content.
pub fn build_recon_summary(recon_dir: &Path) -> Option<String> {
    let sections: Vec<String> = RECON_SOURCES
        .iter()
        .filter_map(|(file_name, heading)| {
            read_head(&recon_dir.join(file_name), MAX_LINES_PER_FILE)
                .map(|content| format!("--- {heading} ---\n{content}\n"))
        })
        .collect();
    (!sections.is_empty()).then(|| sections.join("\n"))
}

/// Substitute `{target}` and `{summary}` into `template`.
///
/// `{{` and `}}` produce literal braces; any other placeholder is an error.
pub fn render_prompt(template: &str, target: &str, summary: &str) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len() + summary.len());
    let mut chars = template.char_indices().peekable();
    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    if inner == '{' {
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(PromptError::UnbalancedBrace {
                        brace: '{',
                        position,
                    });
                }
                match name.as_str() {
                    "target" => out.push_str(target),
                    "summary" => out.push_str(summary),
                    _ => return Err(PromptError::UnknownPlaceholder(name)),
                }
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(PromptError::UnbalancedBrace {
                    brace: '}',
                    position,
                })
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Summarise recon output for `target_name` and ask `model` for follow-up suggestions.
///
/// Returns the trimmed response text.
pub async fn get_suggestions(
    client: &dyn LlmClient,
    target_name: &str,
    recon_dir: &Path,
    model: &str,
    prompt_template: &str,
) -> Result<String, AnalysisError> {
    tracing::info!("Starting LLM analysis for target: {target_name}");
    let summary = build_recon_summary(recon_dir).ok_or_else(|| AnalysisError::NoReconData {
        recon_dir: recon_dir.to_path_buf(),
    })?;
    let prompt = render_prompt(prompt_template, target_name, &summary)?;

    tracing::info!("Querying LLM model: {model}");
    let response = client
        .complete(model, &prompt)
        .await
        .map_err(|err| AnalysisError::Model {
            model: model.to_string(),
            reason: format!("{err:#}"),
        })?;
    tracing::info!("Received LLM suggestions for {target_name}");
    Ok(response.trim().to_string())
}

/// Write the suggestions into `analysis_dir`, returning the file path.
pub fn save_suggestions(analysis_dir: &Path, suggestions: &str) -> io::Result<PathBuf> {
    let path = analysis_dir.join(SUGGESTIONS_FILE);
    fs::write(&path, suggestions)?;
    Ok(path)
}
