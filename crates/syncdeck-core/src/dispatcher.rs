use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::control::merge_session_options;
use crate::control::ControlError;
use crate::control::CreateSessionRequest;
use crate::control::SessionControl;
use crate::endpoint::expand_local_path;
use crate::endpoint::parse_endpoint;
use crate::endpoint::EndpointKind;
use crate::project::Project;
use crate::project::SyncSpec;
use crate::selection::SelectableItem;
use crate::selection::SelectionManager;
use crate::session::SessionRecord;
use crate::session::ONE_WAY_REPLICA;
use crate::state::StatusMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Terminate,
    Flush,
    Pause,
    Resume,
    TogglePause,
    Push,
    ResolveConflicts,
}

impl ControlAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Terminate => "Terminating",
            Self::Flush => "Flushing",
            Self::Pause => "Pausing",
            Self::Resume => "Resuming",
            Self::TogglePause => "Toggling pause",
            Self::Push => "Pushing",
            Self::ResolveConflicts => "Resolving conflicts",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Terminate => "terminate",
            Self::Flush => "flush",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::TogglePause => "toggle pause for",
            Self::Push | Self::ResolveConflicts => "create push session for",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Start => "Started",
            Self::Terminate => "Terminated",
            Self::Flush => "Flushed",
            Self::Pause => "Paused",
            Self::Resume => "Resumed",
            Self::TogglePause => "Toggled",
            Self::Push | Self::ResolveConflicts => "Created push",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanScope {
    Spec(String),
    Project(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOp {
    /// Terminate `stray` names (errors ignored), prepare both endpoints, create.
    Create {
        stray: Vec<String>,
        request: CreateSessionRequest,
    },
    Terminate(String),
    Pause(String),
    Resume(String),
    Flush(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOp {
    pub spec: String,
    pub op: SessionOp,
}

/// The control calls one user action resolves to, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub action: ControlAction,
    pub scope: PlanScope,
    pub ops: Vec<PlannedOp>,
}

enum Target<'a> {
    Spec(&'a Project, &'a SyncSpec),
    Project(&'a Project),
}

fn resolve_target<'a>(
    projects: &'a [Project],
    selection: &SelectionManager,
) -> Result<Target<'a>, StatusMessage> {
    match selection.selected_item() {
        Some(SelectableItem::Project { project }) => projects
            .get(project)
            .map(Target::Project)
            .ok_or_else(|| StatusMessage::warning("No project selected")),
        Some(SelectableItem::Spec { project, spec }) => projects
            .get(project)
            .and_then(|p| p.specs.get(spec).map(|s| Target::Spec(p, s)))
            .ok_or_else(|| StatusMessage::warning("No spec selected")),
        None => Err(StatusMessage::warning("Nothing selected")),
    }
}

fn bound_session(spec: &SyncSpec) -> Result<&Arc<SessionRecord>, StatusMessage> {
    spec.running_session
        .as_ref()
        .ok_or_else(|| StatusMessage::warning("Session not running"))
}

fn create_op(project: &Project, spec: &SyncSpec, push: bool) -> Result<PlannedOp, StatusMessage> {
    let definition = project
        .definition(&spec.name)
        .ok_or_else(|| StatusMessage::error("Session definition not found"))?;

    let mut options = merge_session_options(definition, project.file.defaults.as_ref());
    if push {
        options.mode = Some(ONE_WAY_REPLICA.to_string());
    }

    let mut stray = vec![spec.name.clone()];
    if let Some(session) = &spec.running_session {
        if session.name != spec.name {
            stray.push(session.name.clone());
        }
    }

    Ok(PlannedOp {
        spec: spec.name.clone(),
        op: SessionOp::Create {
            stray,
            request: CreateSessionRequest {
                name: spec.name.clone(),
                alpha: definition.alpha.clone(),
                beta: definition.beta.clone(),
                labels: BTreeMap::from([("name".to_string(), spec.name.clone())]),
                options,
                push,
            },
        },
    })
}

fn session_ops(
    project: &Project,
    mut filter: impl FnMut(&SyncSpec, &SessionRecord) -> bool,
    make: impl Fn(String) -> SessionOp,
) -> Vec<PlannedOp> {
    project
        .specs
        .iter()
        .filter_map(|spec| {
            let session = spec.running_session.as_ref()?;
            filter(spec, &**session).then(|| PlannedOp {
                spec: spec.name.clone(),
                op: make(session.name.clone()),
            })
        })
        .collect()
}

fn non_empty(ops: Vec<PlannedOp>, empty: &str) -> Result<Vec<PlannedOp>, StatusMessage> {
    if ops.is_empty() {
        Err(StatusMessage::warning(empty))
    } else {
        Ok(ops)
    }
}

/// Checks preconditions against the selection and fans out over a project.
/// Inapplicable requests come back as a warning and issue no control call.
pub fn plan(
    action: ControlAction,
    projects: &[Project],
    selection: &SelectionManager,
) -> Result<ActionPlan, StatusMessage> {
    let target = resolve_target(projects, selection)?;
    let scope = match &target {
        Target::Spec(_, spec) => PlanScope::Spec(spec.name.clone()),
        Target::Project(project) => PlanScope::Project(project.display_name()),
    };

    let (action, ops) = match (action, target) {
        (ControlAction::Start, Target::Spec(project, spec)) => {
            if spec.is_running() {
                return Err(StatusMessage::warning(format!(
                    "{} is already running",
                    spec.name
                )));
            }
            (action, vec![create_op(project, spec, false)?])
        }
        (ControlAction::Start, Target::Project(project)) => {
            let ops = project
                .specs
                .iter()
                .filter(|spec| !spec.is_running())
                .map(|spec| create_op(project, spec, false))
                .collect::<Result<Vec<_>, _>>()?;
            (action, non_empty(ops, "All sessions already running")?)
        }

        (ControlAction::Terminate, Target::Spec(_, spec)) => {
            let session = bound_session(spec)?;
            (action, vec![single(spec, SessionOp::Terminate(session.name.clone()))])
        }
        (ControlAction::Terminate, Target::Project(project)) => {
            let ops = session_ops(project, |_, _| true, SessionOp::Terminate);
            (action, non_empty(ops, "No sessions running")?)
        }

        (ControlAction::Flush, Target::Spec(_, spec)) => {
            let session = bound_session(spec)?;
            (action, vec![single(spec, SessionOp::Flush(session.name.clone()))])
        }
        (ControlAction::Flush, Target::Project(project)) => {
            let ops = session_ops(project, |_, _| true, SessionOp::Flush);
            (action, non_empty(ops, "No sessions running")?)
        }

        (ControlAction::Pause, Target::Spec(_, spec)) => {
            let session = bound_session(spec)?;
            if session.paused {
                return Err(StatusMessage::warning(format!(
                    "{} is already paused",
                    spec.name
                )));
            }
            (action, vec![single(spec, SessionOp::Pause(session.name.clone()))])
        }
        (ControlAction::Pause, Target::Project(project)) => {
            let ops = session_ops(project, |_, s| !s.paused, SessionOp::Pause);
            (action, non_empty(ops, "No sessions to pause")?)
        }

        (ControlAction::Resume, Target::Spec(_, spec)) => {
            let session = bound_session(spec)?;
            (action, vec![single(spec, SessionOp::Resume(session.name.clone()))])
        }
        (ControlAction::Resume, Target::Project(project)) => {
            let ops = session_ops(project, |_, _| true, SessionOp::Resume);
            (action, non_empty(ops, "No sessions to resume")?)
        }

        (ControlAction::TogglePause, Target::Spec(_, spec)) => {
            let session = bound_session(spec)?;
            if session.paused {
                (
                    ControlAction::Resume,
                    vec![single(spec, SessionOp::Resume(session.name.clone()))],
                )
            } else {
                (
                    ControlAction::Pause,
                    vec![single(spec, SessionOp::Pause(session.name.clone()))],
                )
            }
        }
        (ControlAction::TogglePause, Target::Project(project)) => {
            let unpaused = session_ops(project, |_, s| !s.paused, SessionOp::Pause);
            if unpaused.is_empty() {
                let paused = session_ops(project, |_, s| s.paused, SessionOp::Resume);
                (ControlAction::Resume, non_empty(paused, "No sessions to resume")?)
            } else {
                (ControlAction::Pause, unpaused)
            }
        }

        (ControlAction::Push, Target::Spec(project, spec)) => {
            (action, vec![create_op(project, spec, true)?])
        }
        (ControlAction::Push, Target::Project(project)) => {
            let ops = project
                .specs
                .iter()
                .map(|spec| create_op(project, spec, true))
                .collect::<Result<Vec<_>, _>>()?;
            (action, non_empty(ops, "No specs to push")?)
        }

        (ControlAction::ResolveConflicts, Target::Spec(project, spec)) => {
            if !spec.has_conflicts() {
                return Err(StatusMessage::warning("No conflicts to resolve"));
            }
            (action, vec![create_op(project, spec, true)?])
        }
        (ControlAction::ResolveConflicts, Target::Project(_)) => {
            return Err(StatusMessage::warning("No spec selected"));
        }
    };

    Ok(ActionPlan { action, scope, ops })
}

fn single(spec: &SyncSpec, op: SessionOp) -> PlannedOp {
    PlannedOp {
        spec: spec.name.clone(),
        op,
    }
}

enum OpFailure {
    Endpoints(String),
    Control(ControlError),
}

fn prepare_endpoint(
    control: &dyn SessionControl,
    endpoint: &str,
    side: &str,
) -> Result<(), String> {
    let result = match parse_endpoint(endpoint) {
        EndpointKind::Local(path) => control.ensure_local_dir(&expand_local_path(&path)),
        EndpointKind::Ssh { host, path } => control.ensure_remote_dir(&host, &path),
        EndpointKind::Scheme(_) => Ok(()),
    };
    result.map_err(|err| format!("{side}: {err}"))
}

fn run_op(control: &dyn SessionControl, op: &SessionOp) -> Result<(), OpFailure> {
    match op {
        SessionOp::Create { stray, request } => {
            for name in stray {
                if let Err(err) = control.terminate_session(name) {
                    debug!(session = %name, "stray terminate ignored: {err}");
                }
            }
            prepare_endpoint(control, &request.alpha, "alpha").map_err(OpFailure::Endpoints)?;
            prepare_endpoint(control, &request.beta, "beta").map_err(OpFailure::Endpoints)?;
            control.create_session(request).map_err(OpFailure::Control)
        }
        SessionOp::Terminate(name) => control.terminate_session(name).map_err(OpFailure::Control),
        SessionOp::Pause(name) => control.pause_session(name).map_err(OpFailure::Control),
        SessionOp::Resume(name) => control.resume_session(name).map_err(OpFailure::Control),
        SessionOp::Flush(name) => control.flush_session(name).map_err(OpFailure::Control),
    }
}

/// Issues the planned calls in order and stops at the first failure.
pub fn execute(plan: &ActionPlan, control: &dyn SessionControl) -> StatusMessage {
    let mut completed = 0usize;
    for planned in &plan.ops {
        info!(action = ?plan.action, spec = %planned.spec, "issuing control call");
        if let Err(failure) = run_op(control, &planned.op) {
            return failure_message(plan, &planned.spec, failure, completed);
        }
        completed += 1;
    }
    success_message(plan, completed)
}

fn failure_message(
    plan: &ActionPlan,
    spec: &str,
    failure: OpFailure,
    completed: usize,
) -> StatusMessage {
    let mut text = match (&plan.scope, failure) {
        (PlanScope::Spec(_), OpFailure::Endpoints(err)) => {
            format!("Failed to prepare endpoints: {err}")
        }
        (PlanScope::Project(_), OpFailure::Endpoints(err)) => {
            format!("Failed to prepare endpoints for {spec}: {err}")
        }
        (_, OpFailure::Control(err)) => {
            format!("Failed to {} {spec}: {err}", plan.action.verb())
        }
    };
    if completed > 0 {
        text.push_str(&format!(" ({completed} completed before the failure)"));
    }
    StatusMessage::error(text)
}

fn success_message(plan: &ActionPlan, completed: usize) -> StatusMessage {
    let text = match (&plan.action, &plan.scope) {
        (ControlAction::ResolveConflicts, PlanScope::Spec(name)) => {
            format!("Created push session to resolve conflicts: {name}")
        }
        (action, PlanScope::Spec(name)) => format!("{} session: {name}", action.past()),
        (ControlAction::Push, PlanScope::Project(_)) => {
            format!("Created {completed} push session(s)")
        }
        (action, PlanScope::Project(_)) => format!("{} {completed} session(s)", action.past()),
    };
    StatusMessage::info(text)
}
