use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use super::actions::RuntimeAction;
use super::actions::ShellAction;
use super::actions::SnapshotResult;
use super::actions::UserAction;
use super::dispatcher::plan;
use super::dispatcher::ActionPlan;
use super::selection::SelectableItem;
use super::state::AppState;
use super::state::Overlay;
use super::state::StatusLevel;
use super::state::StatusMessage;
use super::state::REFRESHED_STATUS;

pub const BUSY_WARNING: &str = "Another operation is in progress";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch a snapshot off the UI thread; answer with `SnapshotFetched`.
    RequestRefresh { generation: u64 },
    /// Run a plan off the UI thread; answer with `ActionFinished`.
    Dispatch { plan: ActionPlan, generation: u64 },
    LaunchEditor(PathBuf),
    /// Rediscover project files; answer with `ProjectsLoaded`.
    ReloadProjects,
    RequestFrame,
    Quit,
}

pub fn reduce(state: &mut AppState, action: ShellAction) -> Vec<Effect> {
    match action {
        ShellAction::User(user) => reduce_user(state, user),
        ShellAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut AppState, action: UserAction) -> Vec<Effect> {
    debug!(action = action.label(), "user action");
    match action {
        UserAction::SelectNext => {
            state.selection.select_next();
            vec![Effect::RequestFrame]
        }
        UserAction::SelectPrevious => {
            state.selection.select_previous();
            vec![Effect::RequestFrame]
        }
        UserAction::SelectIndex(index) => {
            if index >= state.selection.total_items() {
                return Vec::new();
            }
            let refold = index == state.selection.raw_index()
                && matches!(
                    state.selection.item_at(index),
                    Some(SelectableItem::Project { .. })
                );
            if refold {
                if let Some(project) = state.selection.selected_project_index() {
                    state.toggle_fold(project);
                }
            } else {
                state.selection.set_index(index);
            }
            vec![Effect::RequestFrame]
        }
        UserAction::ToggleFold => {
            if let Some(project) = state.selection.selected_project_index() {
                state.toggle_fold(project);
            }
            vec![Effect::RequestFrame]
        }
        UserAction::Refresh => {
            if state.busy.is_some() {
                state.set_status(StatusMessage::warning(BUSY_WARNING));
                return vec![Effect::RequestFrame];
            }
            if state.refreshing {
                return Vec::new();
            }
            vec![start_refresh(state), Effect::RequestFrame]
        }
        UserAction::Control(action) => {
            if state.busy.is_some() {
                state.set_status(StatusMessage::warning(BUSY_WARNING));
                return vec![Effect::RequestFrame];
            }
            match plan(action, &state.projects, &state.selection) {
                Ok(plan) => {
                    state.busy = Some(plan.action.label().to_string());
                    let generation = state.next_snapshot_generation();
                    vec![Effect::Dispatch { plan, generation }, Effect::RequestFrame]
                }
                Err(status) => {
                    state.set_status(status);
                    vec![Effect::RequestFrame]
                }
            }
        }
        UserAction::OpenEditor => match state.selected_project() {
            Some(project) => vec![Effect::LaunchEditor(project.file.path.clone())],
            None => {
                state.set_status(StatusMessage::warning("No project selected"));
                vec![Effect::RequestFrame]
            }
        },
        UserAction::ToggleHelp => toggle_overlay(state, Overlay::Help),
        UserAction::ToggleConflicts => toggle_overlay(state, Overlay::Conflicts),
        UserAction::ToggleSyncStatus => toggle_overlay(state, Overlay::SyncStatus),
        UserAction::CloseOverlay => {
            state.overlay = Overlay::None;
            vec![Effect::RequestFrame]
        }
        UserAction::ToggleDisplayMode => {
            state.display_mode = state.display_mode.next();
            state.set_status(StatusMessage::info(format!(
                "Display: {}",
                state.display_mode.label()
            )));
            vec![Effect::RequestFrame]
        }
        UserAction::Quit => {
            state.should_quit = true;
            vec![Effect::Quit]
        }
    }
}

fn toggle_overlay(state: &mut AppState, overlay: Overlay) -> Vec<Effect> {
    state.overlay = if state.overlay == overlay {
        Overlay::None
    } else {
        overlay
    };
    vec![Effect::RequestFrame]
}

fn start_refresh(state: &mut AppState) -> Effect {
    state.refreshing = true;
    Effect::RequestRefresh {
        generation: state.next_snapshot_generation(),
    }
}

fn reduce_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<Effect> {
    match action {
        RuntimeAction::ProjectsLoaded(projects) => {
            state.replace_projects(projects);
            vec![Effect::RequestFrame]
        }
        RuntimeAction::SnapshotFetched { generation, result } => {
            state.refreshing = false;
            match result {
                Ok(sessions) => {
                    if !state.apply_snapshot(generation, sessions) {
                        debug!(generation, "dropping stale snapshot");
                        return vec![Effect::RequestFrame];
                    }
                    let quiet = state
                        .status
                        .as_ref()
                        .map_or(true, |status| status.level == StatusLevel::Info);
                    if quiet {
                        state.set_status(StatusMessage::info(REFRESHED_STATUS));
                    }
                }
                Err(err) => {
                    warn!("session refresh failed: {err}");
                    state.set_status(StatusMessage::warning(format!(
                        "Failed to refresh sessions: {err}"
                    )));
                }
            }
            vec![Effect::RequestFrame]
        }
        RuntimeAction::ActionFinished {
            generation,
            status,
            refresh,
        } => {
            state.busy = None;
            let status = finish_status(state, generation, status, refresh);
            state.set_status(status);
            vec![Effect::RequestFrame]
        }
        RuntimeAction::EditorFinished(result) => {
            state.set_status(match result {
                Ok(text) => StatusMessage::info(text),
                Err(text) => StatusMessage::error(text),
            });
            // A fetch already in flight or an action's follow-up covers it.
            let mut effects = vec![Effect::ReloadProjects];
            if state.is_idle() {
                effects.push(start_refresh(state));
            }
            effects.push(Effect::RequestFrame);
            effects
        }
        RuntimeAction::AutoRefresh => {
            if !state.is_idle() || state.should_quit {
                return Vec::new();
            }
            vec![start_refresh(state)]
        }
        RuntimeAction::Tick(now) => {
            if state.expire_status(now) {
                vec![Effect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        RuntimeAction::SetStatus(status) => {
            state.set_status(status);
            vec![Effect::RequestFrame]
        }
    }
}

/// The action's own outcome stays primary; a failed follow-up refresh is
/// appended and the previous reconciliation is kept.
fn finish_status(
    state: &mut AppState,
    generation: u64,
    mut status: StatusMessage,
    refresh: SnapshotResult,
) -> StatusMessage {
    match refresh {
        Ok(sessions) => {
            if !state.apply_snapshot(generation, sessions) {
                debug!(generation, "dropping stale follow-up snapshot");
            }
        }
        Err(err) => {
            warn!("refresh after action failed: {err}");
            status.text.push_str(&format!(" (refresh failed: {err})"));
        }
    }
    status
}

#[cfg(test)]
mod tests;
