use std::fmt;

use serde::{Deserialize, Serialize};

/// One stage of the per-target pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Recon,
    Analysis,
    Scan,
}

impl Phase {
    /// Value exported to scripts through `PHASE_NAME`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Recon => "recon",
            Self::Analysis => "analysis",
            Self::Scan => "scan",
        }
    }

    /// Subdirectory of the target results directory owned by this phase.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Recon => "recon",
            Self::Analysis => "analysis",
            Self::Scan => "scans",
        }
    }

    /// Capitalised label used in log messages ("Recon script ...").
    pub fn label(self) -> &'static str {
        match self {
            Self::Recon => "Recon",
            Self::Analysis => "Analysis",
            Self::Scan => "Scan",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
