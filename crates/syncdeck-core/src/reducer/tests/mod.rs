use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;

pub(super) use super::reduce;
pub(super) use super::Effect;
pub(super) use super::BUSY_WARNING;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::ShellAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::dispatcher::ControlAction;
pub(super) use crate::project::Project;
pub(super) use crate::project::ProjectFile;
pub(super) use crate::project::SyncSpecState;
pub(super) use crate::session::ConflictRecord;
pub(super) use crate::session::SessionRecord;
pub(super) use crate::session::ONE_WAY_REPLICA;
pub(super) use crate::state::AppState;
pub(super) use crate::state::DisplayMode;
pub(super) use crate::state::Overlay;
pub(super) use crate::state::StatusLevel;
pub(super) use crate::state::StatusMessage;
pub(super) use crate::state::REFRESHED_STATUS;

mod status_expiry;

fn project(path: &str, yaml: &str) -> Project {
    Project::new(ProjectFile::parse(Path::new(path), yaml).expect("parse"))
}

/// Two projects: `demo` with specs `a` and `b`, `tools` with spec `lint`.
fn state() -> AppState {
    AppState::new(
        vec![
            project(
                "/work/demo/mutagen.yml",
                "sync:\n  a: {alpha: /local/a, beta: /remote/a}\n  b: {alpha: /local/b, beta: /remote/b}\n",
            ),
            project(
                "/work/tools/mutagen.yml",
                "sync:\n  lint: {alpha: /local/lint, beta: /remote/lint}\n",
            ),
        ],
        DisplayMode::Paths,
    )
}

fn session(name: &str) -> Arc<SessionRecord> {
    Arc::new(SessionRecord {
        name: name.to_string(),
        ..SessionRecord::default()
    })
}

fn session_with(name: &str, mode: Option<&str>, paused: bool) -> Arc<SessionRecord> {
    Arc::new(SessionRecord {
        name: name.to_string(),
        mode: mode.map(str::to_string),
        paused,
        ..SessionRecord::default()
    })
}

fn user(state: &mut AppState, action: UserAction) -> Vec<Effect> {
    reduce(state, ShellAction::User(action))
}

fn runtime(state: &mut AppState, action: RuntimeAction) -> Vec<Effect> {
    reduce(state, ShellAction::Runtime(action))
}

/// Delivers a snapshot under a freshly issued generation.
fn fetched(state: &mut AppState, sessions: Vec<Arc<SessionRecord>>) {
    let generation = state.next_snapshot_generation();
    let effects = runtime(
        state,
        RuntimeAction::SnapshotFetched {
            generation,
            result: Ok(sessions),
        },
    );
    assert_eq!(effects, vec![Effect::RequestFrame]);
}

fn status_text(state: &AppState) -> Option<&str> {
    state.status.as_ref().map(|status| status.text.as_str())
}
