use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetsError {
    #[error("targets file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read targets file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no targets listed in {}", path.display())]
    Empty { path: PathBuf },
}

/// Parse a newline-delimited target list, skipping blank lines and `#` comments.
pub fn parse_targets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read the targets file, preserving file order. An empty list is an error.
pub fn load_targets(path: impl AsRef<Path>) -> Result<Vec<String>, TargetsError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TargetsError::NotFound {
            path: path.to_path_buf(),
        },
        _ => TargetsError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let targets = parse_targets(&content);
    if targets.is_empty() {
        return Err(TargetsError::Empty {
            path: path.to_path_buf(),
        });
    }
    tracing::info!("Read {} targets from {}", targets.len(), path.display());
    Ok(targets)
}
