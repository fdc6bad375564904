use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::session::SessionRecord;

const DEFAULTS_KEY: &str = "defaults";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {path}: {source}", path = .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}", path = .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid session `{name}` in {path}: {source}", path = .path.display())]
    InvalidSession {
        path: PathBuf,
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIgnore {
    Paths(Vec<String>),
    Detailed {
        #[serde(default)]
        paths: Vec<String>,
        #[serde(default)]
        vcs: Option<bool>,
    },
}

/// Ignore settings. Accepts either a bare path list or `{ paths, vcs }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "RawIgnore")]
pub struct IgnoreConfig {
    pub paths: Vec<String>,
    pub vcs: Option<bool>,
}

impl From<RawIgnore> for IgnoreConfig {
    fn from(raw: RawIgnore) -> Self {
        match raw {
            RawIgnore::Paths(paths) => Self { paths, vcs: None },
            RawIgnore::Detailed { paths, vcs } => Self { paths, vcs },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionDefinition {
    pub alpha: String,
    pub beta: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub ignore: Option<IgnoreConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl SessionDefinition {
    /// `symlink.mode` from the extension block, passed through unchanged.
    pub fn symlink_mode(&self) -> Option<&str> {
        self.extra
            .get("symlink")
            .and_then(|symlink| symlink.get("mode"))
            .and_then(serde_yaml::Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DefaultConfig {
    #[serde(default)]
    pub ignore: Option<IgnoreConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawProjectFile {
    #[serde(default, rename = "targetName")]
    target_name: Option<String>,
    #[serde(default)]
    sync: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub target_name: Option<String>,
    pub sessions: BTreeMap<String, SessionDefinition>,
    pub defaults: Option<DefaultConfig>,
}

impl ProjectFile {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let text = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parses a project document. The reserved `sync.defaults` entry becomes
    /// [`ProjectFile::defaults`] and never appears in `sessions`.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ProjectError> {
        let raw: RawProjectFile =
            serde_yaml::from_str(text).map_err(|source| ProjectError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = raw.sync.unwrap_or_default();
        let defaults = match entries.remove(DEFAULTS_KEY) {
            Some(value) => Some(serde_yaml::from_value::<DefaultConfig>(value).map_err(
                |source| ProjectError::InvalidSession {
                    path: path.to_path_buf(),
                    name: DEFAULTS_KEY.to_string(),
                    source,
                },
            )?),
            None => None,
        };

        let mut sessions = BTreeMap::new();
        for (name, value) in entries {
            let definition = serde_yaml::from_value::<SessionDefinition>(value).map_err(
                |source| ProjectError::InvalidSession {
                    path: path.to_path_buf(),
                    name: name.clone(),
                    source,
                },
            )?;
            sessions.insert(name, definition);
        }

        Ok(Self {
            path: path.to_path_buf(),
            target_name: raw.target_name,
            sessions,
            defaults,
        })
    }

    pub fn display_name(&self) -> String {
        if let Some(target) = self.target_name.as_deref().filter(|t| !t.is_empty()) {
            return format!("mutagen-{target}");
        }
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        for suffix in [".yml", ".yaml"] {
            if let Some(stem) = file_name.strip_suffix(suffix) {
                return stem.to_string();
            }
        }
        file_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSpecState {
    NotRunning,
    RunningTwoWay,
    RunningPush,
}

impl SyncSpecState {
    pub fn label(self) -> &'static str {
        match self {
            Self::NotRunning => "not running",
            Self::RunningTwoWay => "two-way",
            Self::RunningPush => "push",
        }
    }
}

/// A declared sync relationship and the session currently bound to it.
///
/// Only reconciliation assigns `state` and `running_session`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSpec {
    pub name: String,
    pub state: SyncSpecState,
    pub running_session: Option<Arc<SessionRecord>>,
}

impl SyncSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SyncSpecState::NotRunning,
            running_session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state != SyncSpecState::NotRunning
    }

    pub fn is_paused(&self) -> bool {
        self.running_session
            .as_ref()
            .is_some_and(|session| session.paused)
    }

    pub fn has_conflicts(&self) -> bool {
        self.running_session
            .as_ref()
            .is_some_and(|session| session.has_conflicts())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub file: ProjectFile,
    pub specs: Vec<SyncSpec>,
    pub folded: bool,
}

impl Project {
    pub fn new(file: ProjectFile) -> Self {
        let mut specs: Vec<SyncSpec> = file.sessions.keys().map(SyncSpec::new).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            file,
            specs,
            folded: true,
        }
    }

    pub fn display_name(&self) -> String {
        self.file.display_name()
    }

    pub fn definition(&self, spec_name: &str) -> Option<&SessionDefinition> {
        self.file.sessions.get(spec_name)
    }

    pub fn toggle_fold(&mut self) {
        self.folded = !self.folded;
    }

    pub fn running_count(&self) -> usize {
        self.specs.iter().filter(|spec| spec.is_running()).count()
    }

    pub fn conflict_count(&self) -> usize {
        self.specs
            .iter()
            .filter_map(|spec| spec.running_session.as_ref())
            .map(|session| session.conflict_count())
            .sum()
    }
}
