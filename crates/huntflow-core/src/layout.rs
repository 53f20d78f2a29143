use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::phase::Phase;

/// Upper bound on the length (in characters) of a sanitized name.
pub const MAX_NAME_CHARS: usize = 100;

/// Directory name used when sanitization leaves nothing behind.
const FALLBACK_NAME: &str = "target";

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").expect("valid scheme regex"));
static ILLEGAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("valid illegal-char regex"));
static BARE_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid bare-host regex"));

/// Map a target (hostname, IP or URL) to a filesystem-safe directory name.
///
/// Not injective: `a.b/` and `a_b_` both become `a_b_`. See [`ResultsLayout`]
/// for how collisions are resolved within a run.
pub fn sanitize_target(target: &str) -> String {
    let without_scheme = SCHEME.replace(target, "");
    let mut name = ILLEGAL_CHARS
        .replace_all(&without_scheme, "_")
        .into_owned();
    if !BARE_HOST.is_match(&name) {
        name = name.replace('.', "_");
    }
    name.trim_matches(|c| c == ' ' || c == '.')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Create (if needed) and return the directory owned by `phase` under a target directory.
pub fn phase_results_dir(target_dir: &Path, phase: Phase) -> io::Result<PathBuf> {
    let dir = target_dir.join(phase.dir_name());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Results directory assigned to a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDirs {
    pub name: String,
    pub root: PathBuf,
}

impl TargetDirs {
    /// Path of a phase directory without touching the filesystem.
    pub fn phase_path(&self, phase: Phase) -> PathBuf {
        self.root.join(phase.dir_name())
    }

    pub fn ensure_phase(&self, phase: Phase) -> io::Result<PathBuf> {
        phase_results_dir(&self.root, phase)
    }
}

/// Hands out per-target directories under the base output directory.
///
/// Distinct targets that sanitize to the same name within one run get a
/// numeric suffix (`name-2`, `name-3`, ...) instead of sharing a directory.
#[derive(Debug)]
pub struct ResultsLayout {
    base: PathBuf,
    assigned: HashMap<String, String>,
    taken: HashSet<String>,
}

impl ResultsLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            assigned: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    pub fn ensure_base(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base)
    }

    /// Resolve the directory name for `target` without creating anything.
    pub fn allocate(&mut self, target: &str) -> String {
        if let Some(name) = self.assigned.get(target) {
            return name.clone();
        }
        let mut stem = sanitize_target(target);
        if stem.is_empty() {
            stem = FALLBACK_NAME.to_string();
        }
        let mut name = stem.clone();
        let mut counter = 2usize;
        while self.taken.contains(&name) {
            let suffix = format!("-{counter}");
            let head: String = stem
                .chars()
                .take(MAX_NAME_CHARS.saturating_sub(suffix.len()))
                .collect();
            name = format!("{head}{suffix}");
            counter += 1;
        }
        if name != stem {
            tracing::warn!(
                "Target {target} sanitizes to `{stem}`, already used by another target; writing to `{name}` instead"
            );
        }
        self.taken.insert(name.clone());
        self.assigned.insert(target.to_string(), name.clone());
        name
    }

    /// Allocate and create the results directory for `target`. Idempotent per target.
    pub fn target_dirs(&mut self, target: &str) -> io::Result<TargetDirs> {
        let name = self.allocate(target);
        let root = self.base.join(&name);
        fs::create_dir_all(&root)?;
        Ok(TargetDirs { name, root })
    }
}
