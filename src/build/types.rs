use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CellLocation, CompileError, ErrorKind, Result};

// ==================== Configuration ====================

/// One configured export job. `language` and `format` stay plain strings so that a bad tag
/// only fails this target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    pub display_name: String,
    pub language: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub format: String,
    /// Platform tag for field filtering; defaults to the language keyword, `*` keeps all fields
    #[serde(default)]
    pub platform: Option<String>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub generate_code: bool,
    #[serde(default)]
    pub code_path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl BuildTarget {
    pub fn new(
        display_name: impl Into<String>,
        language: impl Into<String>,
        format: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        BuildTarget {
            display_name: display_name.into(),
            language: language.into(),
            enabled: true,
            format: format.into(),
            platform: None,
            output_path: output_path.into(),
            generate_code: false,
            code_path: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_code(mut self, code_path: impl Into<PathBuf>) -> Self {
        self.generate_code = true;
        self.code_path = Some(code_path.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Everything a compile run needs besides the sheets themselves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub targets: Vec<BuildTarget>,
    /// Worker limit; `None` uses one worker per core
    #[serde(default)]
    pub jobs: Option<usize>,
}

impl BuildConfig {
    pub fn new(targets: Vec<BuildTarget>) -> Self {
        BuildConfig { targets, jobs: None }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| CompileError::target_config(format!("invalid build settings: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompileError::io(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn enabled_targets(&self) -> impl Iterator<Item = &BuildTarget> {
        self.targets.iter().filter(|t| t.enabled)
    }
}

// ==================== Run State ====================

/// Stages of one compile run. Per-target work moves through Filtering, Serializing and
/// CodeGenerating; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Idle,
    ParsingAux,
    ParsingData,
    Filtering,
    Serializing,
    CodeGenerating,
    Done,
    Failed,
}

impl BuildStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStage::Done | BuildStage::Failed)
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::Idle => "idle",
            BuildStage::ParsingAux => "parsing auxiliary tables",
            BuildStage::ParsingData => "parsing data tables",
            BuildStage::Filtering => "filtering",
            BuildStage::Serializing => "serializing",
            BuildStage::CodeGenerating => "generating code",
            BuildStage::Done => "done",
            BuildStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A failure collected into the build report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<CellLocation>,
    pub table: Option<String>,
    /// Display name of the build target, for export failures
    pub target: Option<String>,
    pub stage: BuildStage,
}

impl Diagnostic {
    pub fn from_error(error: CompileError, stage: BuildStage) -> Self {
        Diagnostic {
            kind: error.kind,
            message: error.message,
            location: error.location,
            table: None,
            target: None,
            stage,
        }
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn for_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        } else if let Some(table) = &self.table {
            write!(f, " in {}", table)?;
        }
        if let Some(target) = &self.target {
            write!(f, " [{}]", target)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Data,
    Source,
    /// `.proto` schema of a binary artifact
    Schema,
}

/// One file handed to the artifact sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub table: String,
    pub target: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size: usize,
    /// Hex SHA-256 of the bytes written
    pub sha256: String,
}

/// Complete outcome of a compile run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub stage: BuildStage,
    /// Tables that compiled, in registry order
    pub tables: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
    pub cancelled: bool,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.stage == BuildStage::Done && self.diagnostics.is_empty()
    }

    pub fn diagnostics_of(&self, kind: ErrorKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn artifact(&self, path: &Path) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.path == path)
    }
}
