//! Write policy separating curated knowledge from regenerable artifacts.
//!
//! Every path the pipeline is about to create, overwrite or delete is
//! classified here first. Rule paths and targets are made absolute against
//! the working directory and their `.`/`..` segments folded lexically, so
//! `./synth/x.md`, `$PWD/synth/x.md` and `drafts/../x.md` meet the same
//! rule. Nothing else on the filesystem is consulted.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::layout::{DRAFTS_DIR, ProjectLayout};
use crate::util::{read_json, write_json_pretty, write_text};

pub const DRAFT_PREFIX: &str = "DRAFT_";

pub const CURATED_FILES: [&str; 5] = [
    "glossary.md",
    "rules.md",
    "invariants.md",
    "contradictions.md",
    "open_questions.md",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionRule {
    /// Exact curated file.
    CuratedFile(PathBuf),
    /// Everything below `dir` unless the file name starts with `draft_prefix`.
    CuratedDirectory { dir: PathBuf, draft_prefix: String },
    /// Any directory with this name below `root` holds drafts.
    DraftDirectory { root: PathBuf, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteClass {
    Protected { rule: String },
    Draft,
    Regenerable,
}

impl WriteClass {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Protected { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GovernancePolicy {
    rules: Vec<ProtectionRule>,
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    curated_files: Vec<String>,
    #[serde(default)]
    curated_directories: Vec<CuratedDirectoryEntry>,
    #[serde(default)]
    draft_directory_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CuratedDirectoryEntry {
    path: String,
    #[serde(default = "default_draft_prefix")]
    draft_prefix: String,
}

fn default_draft_prefix() -> String {
    DRAFT_PREFIX.to_string()
}

impl GovernancePolicy {
    pub fn new(rules: Vec<ProtectionRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| match rule {
                ProtectionRule::CuratedFile(path) => ProtectionRule::CuratedFile(resolve_target(&path)),
                ProtectionRule::CuratedDirectory { dir, draft_prefix } => {
                    ProtectionRule::CuratedDirectory {
                        dir: resolve_target(&dir),
                        draft_prefix,
                    }
                }
                ProtectionRule::DraftDirectory { root, name } => ProtectionRule::DraftDirectory {
                    root: resolve_target(&root),
                    name,
                },
            })
            .collect();
        Self { rules }
    }

    /// Compiled-in policy: the five curated files under `synth/`, non-draft
    /// procedures, `drafts/` directories inside the project, then curated
    /// topics.
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        let mut rules = CURATED_FILES
            .iter()
            .map(|name| ProtectionRule::CuratedFile(layout.synth.join(name)))
            .collect::<Vec<ProtectionRule>>();
        rules.push(ProtectionRule::CuratedDirectory {
            dir: layout.procedures.clone(),
            draft_prefix: DRAFT_PREFIX.to_string(),
        });
        rules.push(ProtectionRule::DraftDirectory {
            root: layout.root.clone(),
            name: DRAFTS_DIR.to_string(),
        });
        rules.push(ProtectionRule::CuratedDirectory {
            dir: layout.topics.clone(),
            draft_prefix: DRAFT_PREFIX.to_string(),
        });
        Self::new(rules)
    }

    /// Loads a JSON policy whose relative paths are resolved against `root`.
    pub fn from_file(root: &Path, path: &Path) -> Result<Self> {
        let file: PolicyFile = read_json(path)?;

        let mut rules = Vec::new();
        for curated in file.curated_files {
            rules.push(ProtectionRule::CuratedFile(root.join(curated)));
        }
        for entry in file.curated_directories {
            rules.push(ProtectionRule::CuratedDirectory {
                dir: root.join(entry.path),
                draft_prefix: entry.draft_prefix,
            });
        }
        for name in file.draft_directory_names {
            rules.push(ProtectionRule::DraftDirectory {
                root: root.to_path_buf(),
                name,
            });
        }

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[ProtectionRule] {
        &self.rules
    }

    /// First matching rule wins; unmatched paths are regenerable.
    pub fn classify(&self, path: &Path) -> WriteClass {
        let target = resolve_target(path);

        for rule in &self.rules {
            match rule {
                ProtectionRule::CuratedFile(curated) => {
                    if &target == curated {
                        return WriteClass::Protected {
                            rule: format!("curated file {}", curated.display()),
                        };
                    }
                }
                ProtectionRule::CuratedDirectory { dir, draft_prefix } => {
                    if target.starts_with(dir) {
                        let has_prefix = target
                            .file_name()
                            .and_then(|name| name.to_str())
                            .map(|name| name.starts_with(draft_prefix.as_str()))
                            .unwrap_or(false);
                        if has_prefix {
                            return WriteClass::Draft;
                        }
                        return WriteClass::Protected {
                            rule: format!(
                                "curated directory {} without {} prefix",
                                dir.display(),
                                draft_prefix
                            ),
                        };
                    }
                }
                ProtectionRule::DraftDirectory { root, name } => {
                    let in_drafts = target
                        .parent()
                        .and_then(|parent| parent.strip_prefix(root).ok())
                        .map(|inside| {
                            inside.components().any(|component| {
                                matches!(component, Component::Normal(value) if value == name.as_str())
                            })
                        })
                        .unwrap_or(false);
                    if in_drafts {
                        return WriteClass::Draft;
                    }
                }
            }
        }

        WriteClass::Regenerable
    }

    /// Gate for a write or delete. Refusals come back as
    /// [`PipelineError::GovernanceRefusal`].
    pub fn check_write(&self, path: &Path) -> Result<WriteClass, PipelineError> {
        match self.classify(path) {
            WriteClass::Protected { rule } => Err(PipelineError::GovernanceRefusal {
                path: path.to_path_buf(),
                rule,
            }),
            allowed => Ok(allowed),
        }
    }

    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.check_write(path)?;
        write_json_pretty(path, value)
    }

    pub fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        self.check_write(path)?;
        write_text(path, content)
    }

    pub fn remove_file(&self, path: &Path) -> Result<()> {
        self.check_write(path)?;
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))
    }
}

/// True when the error chain carries a governance refusal.
pub fn is_refusal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<PipelineError>()
        .map(PipelineError::is_refusal)
        .unwrap_or(false)
}

/// Absolute form of `path` with dot segments folded. Only the working
/// directory is read; symlinks are not resolved.
pub fn resolve_target(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_lexically(&absolute)
}

/// Resolves `.` and `..` without consulting the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
