use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

pub const ONE_WAY_REPLICA: &str = "one-way-replica";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileState {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<FileState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<FileState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub alpha_changes: Vec<Change>,
    #[serde(default)]
    pub beta_changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingProgress {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub received_size: Option<u64>,
    #[serde(default)]
    pub expected_size: Option<u64>,
    #[serde(default)]
    pub received_files: Option<u64>,
    #[serde(default)]
    pub expected_files: Option<u64>,
    #[serde(default)]
    pub total_received_size: Option<u64>,
}

/// One side of a session as reported by the daemon.
///
/// Count fields stay `None` until the endpoint finishes its first scan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub scanned: bool,
    #[serde(default)]
    pub directories: Option<u64>,
    #[serde(default)]
    pub files: Option<u64>,
    #[serde(default)]
    pub symbolic_links: Option<u64>,
    #[serde(default)]
    pub total_file_size: Option<u64>,
    #[serde(default)]
    pub staging_progress: Option<StagingProgress>,
}

impl EndpointRecord {
    pub fn path_with_tilde(&self) -> String {
        match dirs::home_dir() {
            Some(home) => shorten_home(&self.path, &home),
            None => self.path.clone(),
        }
    }

    pub fn display_path(&self) -> String {
        let path = self.path_with_tilde();
        match &self.host {
            Some(host) => format!("{host}:{path}"),
            None => path,
        }
    }

    pub fn status_icon(&self) -> &'static str {
        if !self.connected {
            "⊗"
        } else if !self.scanned {
            "⟳"
        } else {
            "✓"
        }
    }
}

/// A session snapshot. Superseded wholesale by the next fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub alpha: EndpointRecord,
    #[serde(default)]
    pub beta: EndpointRecord,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub successful_cycles: Option<u64>,
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
}

impl SessionRecord {
    pub fn is_one_way_replica(&self) -> bool {
        self.mode.as_deref() == Some(ONE_WAY_REPLICA)
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn status_icon(&self) -> &'static str {
        let status = self.status.to_lowercase();
        if status.contains("watching") {
            "👁"
        } else if status.contains("scanning") {
            "🔍"
        } else if status.contains("staging") {
            "📦"
        } else if status.contains("reconcil") {
            "⚖"
        } else if status.contains("saving") {
            "💾"
        } else if status.contains("connect") {
            "🔌"
        } else if status.contains("transition") {
            "⏳"
        } else if status.contains("halt") {
            "⛔"
        } else {
            "•"
        }
    }

    /// Human-readable phase, with scan and staging progress when the daemon reports it.
    pub fn status_text(&self) -> String {
        let status = self.status.to_lowercase();
        if status.contains("watching") {
            "Watching".to_string()
        } else if status.contains("scanning") {
            self.scanning_text(&status)
        } else if status.contains("staging") {
            self.staging_text(&status)
        } else if status.contains("reconcil") {
            "Reconciling".to_string()
        } else if status.contains("saving") {
            "Saving".to_string()
        } else if status.contains("waiting") {
            "Waiting".to_string()
        } else if status.contains("connect") {
            "Connecting".to_string()
        } else if status.contains("transition") {
            "Transitioning".to_string()
        } else if status.contains("halt") {
            "Halted".to_string()
        } else {
            "Unknown".to_string()
        }
    }

    fn active_side(&self, status: &str) -> Option<(&'static str, &EndpointRecord)> {
        if status.contains("alpha") {
            Some(("α", &self.alpha))
        } else if status.contains("beta") {
            Some(("β", &self.beta))
        } else {
            None
        }
    }

    fn scanning_text(&self, status: &str) -> String {
        match self.active_side(status) {
            Some((side, endpoint)) => match endpoint.files {
                Some(files) if files >= 1000 => {
                    format!("Scanning {side} ({} files)", format_number(files))
                }
                _ => format!("Scanning {side}"),
            },
            None => "Scanning".to_string(),
        }
    }

    fn staging_text(&self, status: &str) -> String {
        let Some((side, endpoint)) = self.active_side(status) else {
            return "Staging".to_string();
        };
        let progress = endpoint
            .staging_progress
            .as_ref()
            .and_then(|p| Some((p.received_files?, p.expected_files?)))
            .filter(|(_, expected)| *expected > 0);
        match progress {
            Some((received, expected)) => format!(
                "Staging {side} ({}/{} {}%)",
                format_number(received),
                format_number(expected),
                received * 100 / expected
            ),
            None => format!("Staging {side}"),
        }
    }
}

/// Formats `n` with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn shorten_home(path: &str, home: &Path) -> String {
    let home = home.to_string_lossy();
    if !home.is_empty() && path.starts_with(home.as_ref()) {
        format!("~{}", &path[home.len()..])
    } else {
        path.to_string()
    }
}

/// Parses `sync list --template "{{json .}}"` output.
///
/// Empty or `null` output is a valid "no sessions" answer.
pub fn parse_session_list(output: &str) -> Result<Vec<SessionRecord>, serde_json::Error> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;

    fn session_with_status(status: &str) -> SessionRecord {
        SessionRecord {
            name: "web".to_string(),
            status: status.to_string(),
            ..SessionRecord::default()
        }
    }

    #[test]
    fn empty_and_null_output_mean_no_sessions() {
        assert_eq!(parse_session_list("").expect("empty"), Vec::new());
        assert_eq!(parse_session_list("  null\n").expect("null"), Vec::new());
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(parse_session_list("{not json").is_err());
    }

    #[test]
    fn list_output_parses_daemon_fields() {
        let output = r#"[{
            "name": "web",
            "identifier": "sync_abc",
            "labels": {"name": "web"},
            "alpha": {"protocol": "local", "path": "/src", "connected": true, "scanned": true, "files": 12},
            "beta": {"protocol": "ssh", "path": "/dst", "host": "box", "connected": true, "scanned": false,
                     "stagingProgress": {"receivedFiles": 3, "expectedFiles": 4}},
            "status": "staging-beta",
            "paused": false,
            "mode": "one-way-replica",
            "successfulCycles": 2,
            "conflicts": [{"root": "a", "alphaChanges": [{"path": "a", "new": {"kind": "file", "digest": "ff"}}],
                           "betaChanges": [{"path": "a"}]}]
        }]"#;

        let sessions = parse_session_list(output).expect("parse");
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert!(session.is_one_way_replica());
        assert_eq!(
            session.labels.as_ref().and_then(|labels| labels.get("name")),
            Some(&"web".to_string())
        );
        assert_eq!(session.beta.display_path(), "box:/dst");
        assert_eq!(session.alpha.files, Some(12));
        assert_eq!(session.beta.directories, None);
        assert_eq!(session.conflict_count(), 1);
        assert_eq!(session.conflicts[0].beta_changes[0].old, None);
        assert_eq!(session.status_text(), "Staging β (3/4 75%)");
    }

    #[test]
    fn status_text_covers_daemon_phases() {
        assert_eq!(session_with_status("watching").status_text(), "Watching");
        assert_eq!(session_with_status("scanning").status_text(), "Scanning");
        assert_eq!(session_with_status("reconciling").status_text(), "Reconciling");
        assert_eq!(session_with_status("waiting-for-rescan").status_text(), "Waiting");
        assert_eq!(session_with_status("connecting-beta").status_text(), "Connecting");
        assert_eq!(session_with_status("halted-on-root-deletion").status_text(), "Halted");
        assert_eq!(session_with_status("").status_text(), "Unknown");
    }

    #[test]
    fn scanning_shows_file_count_only_for_large_trees() {
        let mut session = session_with_status("scanning-alpha");
        session.alpha.files = Some(999);
        assert_eq!(session.status_text(), "Scanning α");
        session.alpha.files = Some(12_345);
        assert_eq!(session.status_text(), "Scanning α (12,345 files)");
    }

    #[test]
    fn number_and_byte_formatting() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn home_prefix_is_shortened() {
        let home = PathBuf::from("/home/dev");
        assert_eq!(shorten_home("/home/dev/src", &home), "~/src");
        assert_eq!(shorten_home("/srv/data", &home), "/srv/data");
    }
}
