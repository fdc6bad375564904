use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::project::DefaultConfig;
use crate::project::SessionDefinition;
use crate::session::SessionRecord;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{}", render_failure(.command, .output, .hint))]
    Failed {
        command: String,
        output: String,
        hint: Option<&'static str>,
    },
    #[error("failed to parse session list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to create directory {path}: {source}", path = .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ControlError {
    /// A non-zero exit, with a hint derived from the captured output.
    pub fn failed(command: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into().trim().to_string();
        let hint = connection_hint(&output);
        Self::Failed {
            command: command.into(),
            output,
            hint,
        }
    }
}

fn render_failure(command: &str, output: &str, hint: &Option<&str>) -> String {
    let mut text = format!("`{command}` failed");
    if !output.is_empty() {
        text.push_str(": ");
        text.push_str(output);
    }
    if let Some(hint) = hint {
        text.push_str(" (hint: ");
        text.push_str(hint);
        text.push(')');
    }
    text
}

/// Maps daemon failure text onto an actionable suggestion.
pub fn connection_hint(output: &str) -> Option<&'static str> {
    let text = output.to_lowercase();
    if text.contains("connecting to agent") {
        Some("the remote agent looks stuck; run `pkill mutagen` on the remote host and retry")
    } else if text.contains("version")
        && (text.contains("incompatible") || text.contains("mismatch"))
    {
        Some("agent version mismatch; run `mutagen daemon stop` and retry")
    } else if text.contains("connection refused") || text.contains("timed out") {
        Some("the remote host is unreachable; check the network and that sshd is running")
    } else if text.contains("permission denied") || text.contains("authentication failed") {
        Some("check SSH authentication (keys, agent, user name)")
    } else if text.contains("host key verification failed") {
        Some("the host key changed or is unknown; update ~/.ssh/known_hosts")
    } else if text.contains("already exists") {
        Some("a session with this name already exists; terminate it first")
    } else if text.contains("cross-device link") {
        Some("endpoints span filesystems; check symlink mode and staging location")
    } else if text.contains("installation error") {
        Some("agent install failed on the remote host; check disk space and permissions")
    } else {
        None
    }
}

/// Create-time options after merging project defaults beneath a spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: Option<String>,
    pub ignore: Vec<String>,
    pub ignore_vcs: Option<bool>,
    pub symlink_mode: Option<String>,
}

/// Defaults' ignore paths come first, then the spec's. A spec-level VCS flag
/// replaces the default one.
pub fn merge_session_options(
    definition: &SessionDefinition,
    defaults: Option<&DefaultConfig>,
) -> SessionOptions {
    let default_ignore = defaults.and_then(|d| d.ignore.as_ref());
    let spec_ignore = definition.ignore.as_ref();

    let ignore = default_ignore
        .into_iter()
        .chain(spec_ignore)
        .flat_map(|config| config.paths.iter().cloned())
        .collect();
    let ignore_vcs = spec_ignore
        .and_then(|config| config.vcs)
        .or_else(|| default_ignore.and_then(|config| config.vcs));

    SessionOptions {
        mode: definition.mode.clone(),
        ignore,
        ignore_vcs,
        symlink_mode: definition.symlink_mode().map(str::to_string),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub name: String,
    pub alpha: String,
    pub beta: String,
    pub labels: BTreeMap<String, String>,
    pub options: SessionOptions,
    /// Forces one-way-replica regardless of `options.mode`.
    pub push: bool,
}

/// The daemon's control surface. Every call is a blocking RPC.
pub trait SessionControl {
    fn list_sessions(&self) -> Result<Vec<SessionRecord>, ControlError>;
    fn create_session(&self, request: &CreateSessionRequest) -> Result<(), ControlError>;
    fn terminate_session(&self, name: &str) -> Result<(), ControlError>;
    fn pause_session(&self, name: &str) -> Result<(), ControlError>;
    fn resume_session(&self, name: &str) -> Result<(), ControlError>;
    fn flush_session(&self, name: &str) -> Result<(), ControlError>;
    fn ensure_remote_dir(&self, host: &str, path: &str) -> Result<(), ControlError>;

    fn ensure_local_dir(&self, path: &Path) -> Result<(), ControlError> {
        fs::create_dir_all(path).map_err(|source| ControlError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One snapshot of every live session, shared by reference with the specs
/// it gets bound to.
pub fn fetch_snapshot(
    control: &dyn SessionControl,
) -> Result<Vec<Arc<SessionRecord>>, ControlError> {
    Ok(control.list_sessions()?.into_iter().map(Arc::new).collect())
}
