use std::sync::Arc;

use tracing::warn;

use crate::project::Project;
use crate::project::SyncSpecState;
use crate::session::SessionRecord;

pub const PUSH_SUFFIX: &str = "-push";

/// Finds the session bound to `spec_name`, first match wins:
/// exact name in a two-way mode, then `<name>-push` one-way-replica,
/// then exact name one-way-replica.
pub fn match_session(
    spec_name: &str,
    sessions: &[Arc<SessionRecord>],
) -> (SyncSpecState, Option<Arc<SessionRecord>>) {
    let push_name = format!("{spec_name}{PUSH_SUFFIX}");

    if let Some(session) = sessions
        .iter()
        .find(|s| s.name == spec_name && !s.is_one_way_replica())
    {
        return (SyncSpecState::RunningTwoWay, Some(Arc::clone(session)));
    }

    let suffixed = sessions
        .iter()
        .find(|s| s.name == push_name && s.is_one_way_replica());
    let legacy = sessions
        .iter()
        .find(|s| s.name == spec_name && s.is_one_way_replica());

    match (suffixed, legacy) {
        (Some(session), other) => {
            if other.is_some() {
                warn!(
                    spec = spec_name,
                    "both `{spec_name}` and `{push_name}` push sessions exist; binding `{push_name}`"
                );
            }
            (SyncSpecState::RunningPush, Some(Arc::clone(session)))
        }
        (None, Some(session)) => (SyncSpecState::RunningPush, Some(Arc::clone(session))),
        (None, None) => (SyncSpecState::NotRunning, None),
    }
}

impl Project {
    /// Rebinds every spec against a fresh snapshot. Nothing carries over from
    /// the previous pass.
    pub fn update_from_sessions(&mut self, sessions: &[Arc<SessionRecord>]) {
        for spec in &mut self.specs {
            let (state, session) = match_session(&spec.name, sessions);
            spec.state = state;
            spec.running_session = session;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::project::ProjectFile;
    use crate::session::ONE_WAY_REPLICA;

    fn session(name: &str, mode: Option<&str>) -> Arc<SessionRecord> {
        Arc::new(SessionRecord {
            name: name.to_string(),
            mode: mode.map(str::to_string),
            ..SessionRecord::default()
        })
    }

    fn project(specs: &[&str]) -> Project {
        let mut text = String::from("sync:\n");
        for spec in specs {
            text.push_str(&format!("  {spec}:\n    alpha: /a/{spec}\n    beta: /b/{spec}\n"));
        }
        Project::new(ProjectFile::parse(Path::new("/p/mutagen.yml"), &text).expect("parse"))
    }

    fn states(project: &Project) -> Vec<(String, SyncSpecState, Option<String>)> {
        project
            .specs
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    spec.state,
                    spec.running_session.as_ref().map(|s| s.name.clone()),
                )
            })
            .collect()
    }

    #[test]
    fn two_way_match_wins_over_push_suffix() {
        let mut project = project(&["web"]);
        let sessions = vec![
            session("web-push", Some(ONE_WAY_REPLICA)),
            session("web", Some("two-way-safe")),
        ];
        project.update_from_sessions(&sessions);
        assert_eq!(
            states(&project),
            vec![("web".to_string(), SyncSpecState::RunningTwoWay, Some("web".to_string()))]
        );
    }

    #[test]
    fn session_without_mode_counts_as_two_way() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[session("web", None)]);
        assert_eq!(project.specs[0].state, SyncSpecState::RunningTwoWay);
    }

    #[test]
    fn push_suffix_binds_as_push() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[session("web-push", Some(ONE_WAY_REPLICA))]);
        assert_eq!(
            states(&project),
            vec![("web".to_string(), SyncSpecState::RunningPush, Some("web-push".to_string()))]
        );
    }

    #[test]
    fn legacy_exact_name_replica_binds_as_push() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[session("web", Some(ONE_WAY_REPLICA))]);
        assert_eq!(project.specs[0].state, SyncSpecState::RunningPush);
    }

    #[test]
    fn suffixed_push_preferred_when_both_push_names_exist() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[
            session("web", Some(ONE_WAY_REPLICA)),
            session("web-push", Some(ONE_WAY_REPLICA)),
        ]);
        assert_eq!(
            project.specs[0].running_session.as_ref().map(|s| s.name.as_str()),
            Some("web-push")
        );
    }

    #[test]
    fn push_suffix_in_two_way_mode_is_not_bound() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[session("web-push", Some("two-way-safe"))]);
        assert_eq!(project.specs[0].state, SyncSpecState::NotRunning);
    }

    #[test]
    fn empty_snapshot_clears_previous_binding() {
        let mut project = project(&["web"]);
        project.update_from_sessions(&[session("web", None)]);
        assert!(project.specs[0].running_session.is_some());

        project.update_from_sessions(&[]);
        assert_eq!(
            states(&project),
            vec![("web".to_string(), SyncSpecState::NotRunning, None)]
        );
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let mut project = project(&["api", "docs", "web"]);
        let sessions = vec![
            session("api", None),
            session("web-push", Some(ONE_WAY_REPLICA)),
            session("unrelated", None),
        ];
        project.update_from_sessions(&sessions);
        let first = project.specs.clone();
        project.update_from_sessions(&sessions);
        assert_eq!(project.specs, first);
        assert_eq!(project.running_count(), 2);
    }
}
