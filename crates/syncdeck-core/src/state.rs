use std::sync::Arc;

use chrono::DateTime;
use chrono::Local;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::project::Project;
use crate::project::SyncSpec;
use crate::selection::SelectableItem;
use crate::selection::SelectionManager;
use crate::session::ConflictRecord;
use crate::session::SessionRecord;

pub const INFO_STATUS_TTL_SECS: i64 = 3;

/// Routine refresh notice; the status bar prefers session status over it.
pub const REFRESHED_STATUS: &str = "Sessions refreshed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }

    pub fn is_routine(&self) -> bool {
        self.level == StatusLevel::Info && self.text == REFRESHED_STATUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Paths,
    LastRefresh,
}

impl DisplayMode {
    pub fn next(self) -> Self {
        match self {
            Self::Paths => Self::LastRefresh,
            Self::LastRefresh => Self::Paths,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Paths => "paths",
            Self::LastRefresh => "last refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Help,
    Conflicts,
    SyncStatus,
}

/// Conflicts of one spec's bound session, for the conflicts view.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConflicts {
    pub spec_name: String,
    pub session: Arc<SessionRecord>,
}

impl SessionConflicts {
    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.session.conflicts
    }
}

/// Owns the project list and the selection. Only the update loop mutates it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub projects: Vec<Project>,
    pub selection: SelectionManager,
    /// Latest snapshot, kept so reloaded projects can be reconciled at once.
    pub sessions: Vec<Arc<SessionRecord>>,
    pub status: Option<StatusMessage>,
    pub status_set_at: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Local>>,
    pub busy: Option<String>,
    pub refreshing: bool,
    /// Stamped on every snapshot request, refresh or dispatch.
    pub snapshot_generation: u64,
    /// Generation of the newest snapshot reconciled so far.
    pub applied_generation: u64,
    pub overlay: Overlay,
    pub display_mode: DisplayMode,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(projects: Vec<Project>, display_mode: DisplayMode) -> Self {
        let mut selection = SelectionManager::new();
        selection.rebuild_from_projects(&projects);
        Self {
            projects,
            selection,
            sessions: Vec::new(),
            status: None,
            status_set_at: None,
            last_refresh: None,
            busy: None,
            refreshing: false,
            snapshot_generation: 0,
            applied_generation: 0,
            overlay: Overlay::None,
            display_mode,
            should_quit: false,
        }
    }

    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
        self.status_set_at = Some(Utc::now());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
        self.status_set_at = None;
    }

    /// Drops an info message once it has been visible for a few seconds.
    /// Warnings and errors stay until replaced.
    pub fn expire_status(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match (&self.status, self.status_set_at) {
            (Some(status), Some(set_at)) => {
                status.level == StatusLevel::Info
                    && (now - set_at).num_seconds() >= INFO_STATUS_TTL_SECS
            }
            _ => false,
        };
        if expired {
            self.clear_status();
        }
        expired
    }

    pub fn next_snapshot_generation(&mut self) -> u64 {
        self.snapshot_generation += 1;
        self.snapshot_generation
    }

    /// Reconciles against `sessions` unless a snapshot requested later has
    /// already been applied. Returns whether it was applied.
    pub fn apply_snapshot(
        &mut self,
        generation: u64,
        sessions: Vec<Arc<SessionRecord>>,
    ) -> bool {
        if generation < self.applied_generation {
            return false;
        }
        self.applied_generation = generation;
        self.apply_sessions(sessions);
        true
    }

    /// Reconciles every project against a fresh snapshot.
    pub fn apply_sessions(&mut self, sessions: Vec<Arc<SessionRecord>>) {
        for project in &mut self.projects {
            project.update_from_sessions(&sessions);
        }
        self.sessions = sessions;
        self.last_refresh = Some(Local::now());
        self.rebuild_selection();
    }

    /// Swaps in a rediscovered project list, keeping fold state by file path.
    pub fn replace_projects(&mut self, mut projects: Vec<Project>) {
        for project in &mut projects {
            if let Some(previous) = self
                .projects
                .iter()
                .find(|previous| previous.file.path == project.file.path)
            {
                project.folded = previous.folded;
            }
            project.update_from_sessions(&self.sessions);
        }
        self.projects = projects;
        self.rebuild_selection();
    }

    pub fn is_idle(&self) -> bool {
        self.busy.is_none() && !self.refreshing
    }

    pub fn rebuild_selection(&mut self) {
        self.selection.rebuild_from_projects(&self.projects);
    }

    pub fn toggle_fold(&mut self, project: usize) {
        let Some(target) = self.projects.get_mut(project) else {
            return;
        };
        target.toggle_fold();
        self.rebuild_selection();
        self.selection.select_project(project);
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.projects.get(self.selection.selected_project_index()?)
    }

    pub fn selected_spec(&self) -> Option<(&Project, &SyncSpec)> {
        let (project, spec) = self.selection.selected_spec()?;
        let project = self.projects.get(project)?;
        Some((project, project.specs.get(spec)?))
    }

    pub fn selected_session(&self) -> Option<&Arc<SessionRecord>> {
        self.selected_spec()?.1.running_session.as_ref()
    }

    /// Conflicts of the selected spec, or of every spec when a project header
    /// is selected.
    pub fn conflicts_for_selection(&self) -> Vec<SessionConflicts> {
        let collect = |spec: &SyncSpec| {
            spec.running_session
                .as_ref()
                .filter(|session| session.has_conflicts())
                .map(|session| SessionConflicts {
                    spec_name: spec.name.clone(),
                    session: Arc::clone(session),
                })
        };

        match self.selection.selected_item() {
            Some(SelectableItem::Project { project }) => self
                .projects
                .get(project)
                .map(|project| project.specs.iter().filter_map(collect).collect())
                .unwrap_or_default(),
            Some(SelectableItem::Spec { .. }) => self
                .selected_spec()
                .and_then(|(_, spec)| collect(spec))
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn total_conflicts(&self) -> usize {
        self.projects.iter().map(Project::conflict_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::project::ProjectFile;

    fn state() -> AppState {
        let file = ProjectFile::parse(
            Path::new("/w/mutagen.yml"),
            "sync:\n  a: {alpha: /a, beta: /b}\n  b: {alpha: /c, beta: /d}\n",
        )
        .expect("parse");
        AppState::new(vec![Project::new(file)], DisplayMode::Paths)
    }

    #[test]
    fn info_status_expires_but_errors_stay() {
        let mut state = state();
        state.set_status(StatusMessage::info("Sessions refreshed"));
        let set_at = state.status_set_at.expect("timestamp");
        assert!(!state.expire_status(set_at + Duration::seconds(1)));
        assert!(state.expire_status(set_at + Duration::seconds(3)));
        assert_eq!(state.status, None);

        state.set_status(StatusMessage::error("boom"));
        let set_at = state.status_set_at.expect("timestamp");
        assert!(!state.expire_status(set_at + Duration::seconds(60)));
        assert_eq!(state.status, Some(StatusMessage::error("boom")));
    }

    #[test]
    fn folding_from_a_spec_keeps_cursor_on_project() {
        let mut state = state();
        state.toggle_fold(0);
        state.selection.set_index(2);
        assert!(state.selection.is_spec_selected());

        state.toggle_fold(0);
        assert_eq!(state.selection.total_items(), 1);
        assert!(state.selection.is_project_selected());
    }

    #[test]
    fn replaced_projects_keep_folds_and_sessions() {
        let mut state = state();
        state.toggle_fold(0);
        state.apply_sessions(vec![Arc::new(SessionRecord {
            name: "a".to_string(),
            ..SessionRecord::default()
        })]);
        assert!(state.last_refresh.is_some());

        let reloaded = ProjectFile::parse(
            Path::new("/w/mutagen.yml"),
            "sync:\n  a: {alpha: /a, beta: /b}\n",
        )
        .expect("parse");
        state.replace_projects(vec![Project::new(reloaded)]);

        assert!(!state.projects[0].folded);
        assert!(state.projects[0].specs[0].is_running());
        assert_eq!(state.selection.total_items(), 2);
    }

    #[test]
    fn conflicts_are_empty_without_sessions() {
        let state = state();
        assert!(state.conflicts_for_selection().is_empty());
        assert_eq!(state.total_conflicts(), 0);
    }
}
