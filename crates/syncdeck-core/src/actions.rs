use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::dispatcher::ControlAction;
use crate::project::Project;
use crate::session::SessionRecord;
use crate::state::StatusMessage;

#[derive(Debug, Clone)]
pub enum ShellAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SelectNext,
    SelectPrevious,
    /// Mouse click on a list row. Clicking the selected project header folds it.
    SelectIndex(usize),
    ToggleFold,
    Refresh,
    Control(ControlAction),
    OpenEditor,
    ToggleHelp,
    ToggleConflicts,
    ToggleSyncStatus,
    CloseOverlay,
    ToggleDisplayMode,
    Quit,
}

pub type SnapshotResult = Result<Vec<Arc<SessionRecord>>, String>;

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    ProjectsLoaded(Vec<Project>),
    /// Answer to `Effect::RequestRefresh` carrying its generation.
    SnapshotFetched {
        generation: u64,
        result: SnapshotResult,
    },
    /// A dispatched plan completed; `refresh` is the follow-up snapshot.
    ActionFinished {
        generation: u64,
        status: StatusMessage,
        refresh: SnapshotResult,
    },
    EditorFinished(Result<String, String>),
    AutoRefresh,
    Tick(DateTime<Utc>),
    SetStatus(StatusMessage),
}

impl UserAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelectNext => "next",
            Self::SelectPrevious => "previous",
            Self::SelectIndex(_) => "select",
            Self::ToggleFold => "fold",
            Self::Refresh => "refresh",
            Self::Control(action) => action.label(),
            Self::OpenEditor => "edit",
            Self::ToggleHelp => "help",
            Self::ToggleConflicts => "conflicts",
            Self::ToggleSyncStatus => "sync status",
            Self::CloseOverlay => "close",
            Self::ToggleDisplayMode => "display mode",
            Self::Quit => "quit",
        }
    }
}
