use std::time::Duration;

use syncdeck_core::config::ControlConfig;
use syncdeck_core::control::ControlError;
use syncdeck_core::control::CreateSessionRequest;
use syncdeck_core::control::SessionControl;
use syncdeck_core::session::parse_session_list;
use syncdeck_core::session::SessionRecord;
use syncdeck_core::session::ONE_WAY_REPLICA;
use tracing::debug;

use crate::contracts::ExecOutput;
use crate::contracts::ExecRequest;
use crate::runner::CommandRunner;

pub const MUTAGEN_PROGRAM: &str = "mutagen";
const SSH_PROGRAM: &str = "ssh";
const INSTALL_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// [`SessionControl`] over the `mutagen` command line.
pub struct MutagenCli<R> {
    runner: R,
    timeout: Duration,
    list_timeout: Duration,
}

impl<R: CommandRunner> MutagenCli<R> {
    pub fn new(runner: R, config: &ControlConfig) -> Self {
        Self {
            runner,
            timeout: config.timeout(),
            list_timeout: config.list_timeout(),
        }
    }

    pub fn is_installed(&self) -> bool {
        let request = ExecRequest::new(MUTAGEN_PROGRAM, ["version"], INSTALL_CHECK_TIMEOUT);
        matches!(self.runner.run(&request), Ok(output) if output.success)
    }

    fn call(&self, request: ExecRequest) -> Result<ExecOutput, ControlError> {
        let output = self.runner.run(&request)?;
        if output.success {
            Ok(output)
        } else {
            Err(ControlError::failed(request.command_line(), output.combined()))
        }
    }

    fn sync(&self, args: Vec<String>) -> Result<(), ControlError> {
        let mut full = vec!["sync".to_string()];
        full.extend(args);
        self.call(ExecRequest::new(MUTAGEN_PROGRAM, full, self.timeout))
            .map(|_| ())
    }

    fn sync_named(&self, verb: &str, name: &str) -> Result<(), ControlError> {
        self.sync(vec![verb.to_string(), name.to_string()])
    }
}

pub fn create_args(request: &CreateSessionRequest) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        request.alpha.clone(),
        request.beta.clone(),
        "--name".to_string(),
        request.name.clone(),
    ];
    for (key, value) in &request.labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }

    let options = &request.options;
    let mode = if request.push {
        Some(ONE_WAY_REPLICA)
    } else {
        options.mode.as_deref().filter(|mode| !mode.is_empty())
    };
    if let Some(mode) = mode {
        args.push("--sync-mode".to_string());
        args.push(mode.to_string());
    }
    for pattern in &options.ignore {
        args.push("--ignore".to_string());
        args.push(pattern.clone());
    }
    if options.ignore_vcs == Some(false) {
        args.push("--no-ignore-vcs".to_string());
    }
    if let Some(symlink_mode) = &options.symlink_mode {
        args.push("--symlink-mode".to_string());
        args.push(symlink_mode.clone());
    }
    args
}

impl<R: CommandRunner> SessionControl for MutagenCli<R> {
    fn list_sessions(&self) -> Result<Vec<SessionRecord>, ControlError> {
        let output = self.call(ExecRequest::new(
            MUTAGEN_PROGRAM,
            ["sync", "list", "--template", "{{json .}}"],
            self.list_timeout,
        ))?;
        let sessions = parse_session_list(&output.stdout)?;
        debug!(count = sessions.len(), "listed sessions");
        Ok(sessions)
    }

    fn create_session(&self, request: &CreateSessionRequest) -> Result<(), ControlError> {
        self.sync(create_args(request))
    }

    fn terminate_session(&self, name: &str) -> Result<(), ControlError> {
        self.sync_named("terminate", name)
    }

    fn pause_session(&self, name: &str) -> Result<(), ControlError> {
        self.sync_named("pause", name)
    }

    fn resume_session(&self, name: &str) -> Result<(), ControlError> {
        self.sync_named("resume", name)
    }

    fn flush_session(&self, name: &str) -> Result<(), ControlError> {
        self.sync_named("flush", name)
    }

    fn ensure_remote_dir(&self, host: &str, path: &str) -> Result<(), ControlError> {
        self.call(ExecRequest::new(
            SSH_PROGRAM,
            [host, "mkdir", "-p", path],
            self.timeout,
        ))
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use syncdeck_core::control::SessionOptions;

    use super::*;

    /// Replays canned outputs and records every request.
    #[derive(Default)]
    struct ScriptedRunner {
        outputs: Mutex<VecDeque<ExecOutput>>,
        requests: Mutex<Vec<ExecRequest>>,
    }

    impl ScriptedRunner {
        fn with(outputs: Vec<ExecOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn command_lines(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("lock")
                .iter()
                .map(ExecRequest::command_line)
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ControlError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(self
                .outputs
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| ExecOutput::ok("")))
        }
    }

    struct TimingOutRunner;

    impl CommandRunner for TimingOutRunner {
        fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ControlError> {
            Err(ControlError::Timeout {
                command: request.command_line(),
                timeout: request.timeout,
            })
        }
    }

    fn cli(outputs: Vec<ExecOutput>) -> MutagenCli<ScriptedRunner> {
        MutagenCli::new(ScriptedRunner::with(outputs), &ControlConfig::default())
    }

    fn request(push: bool) -> CreateSessionRequest {
        CreateSessionRequest {
            name: "web".to_string(),
            alpha: "/local".to_string(),
            beta: "box:/srv".to_string(),
            labels: BTreeMap::from([("name".to_string(), "web".to_string())]),
            options: SessionOptions {
                mode: Some("two-way-resolved".to_string()),
                ignore: vec![".git".to_string(), "*.tmp".to_string()],
                ignore_vcs: Some(false),
                symlink_mode: Some("posix-raw".to_string()),
            },
            push,
        }
    }

    #[test]
    fn list_uses_json_template_and_list_timeout() {
        let cli = cli(vec![ExecOutput::ok(
            r#"[{"name":"web","mode":"one-way-replica","paused":true}]"#,
        )]);
        let sessions = cli.list_sessions().expect("list");
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_one_way_replica());

        let requests = cli.runner.requests.lock().expect("lock");
        assert_eq!(
            requests[0].args,
            vec!["sync", "list", "--template", "{{json .}}"]
        );
        assert_eq!(requests[0].timeout, Duration::from_secs(10));
    }

    #[test]
    fn empty_and_null_lists_are_empty() {
        let cli = cli(vec![ExecOutput::ok("  \n"), ExecOutput::ok("null\n")]);
        assert!(cli.list_sessions().expect("empty").is_empty());
        assert!(cli.list_sessions().expect("null").is_empty());
    }

    #[test]
    fn malformed_list_is_a_parse_error() {
        let cli = cli(vec![ExecOutput::ok("{not json")]);
        assert!(matches!(cli.list_sessions(), Err(ControlError::Parse(_))));
    }

    #[test]
    fn create_flags_follow_options() {
        assert_eq!(
            create_args(&request(false)),
            vec![
                "create",
                "/local",
                "box:/srv",
                "--name",
                "web",
                "--label",
                "name=web",
                "--sync-mode",
                "two-way-resolved",
                "--ignore",
                ".git",
                "--ignore",
                "*.tmp",
                "--no-ignore-vcs",
                "--symlink-mode",
                "posix-raw",
            ]
        );
    }

    #[test]
    fn push_forces_one_way_replica() {
        let args = create_args(&request(true));
        let mode = args
            .iter()
            .position(|arg| arg == "--sync-mode")
            .map(|index| args[index + 1].as_str());
        assert_eq!(mode, Some(ONE_WAY_REPLICA));
    }

    #[test]
    fn named_verbs_and_remote_mkdir() {
        let cli = cli(Vec::new());
        cli.terminate_session("web").expect("terminate");
        cli.pause_session("web").expect("pause");
        cli.resume_session("web").expect("resume");
        cli.flush_session("web").expect("flush");
        cli.ensure_remote_dir("box", "/srv/app").expect("mkdir");
        assert_eq!(
            cli.runner.command_lines(),
            vec![
                "mutagen sync terminate web",
                "mutagen sync pause web",
                "mutagen sync resume web",
                "mutagen sync flush web",
                "ssh box mkdir -p /srv/app",
            ]
        );
    }

    #[test]
    fn failure_output_becomes_hinted_error() {
        let cli = cli(vec![ExecOutput::failed(
            "Error: unable to connect: connecting to agent: EOF\n",
        )]);
        let err = cli.flush_session("web").expect_err("flush fails");
        assert!(err.to_string().starts_with("`mutagen sync flush web` failed: "));
        assert!(err.to_string().contains("pkill mutagen"), "{err}");
    }

    #[test]
    fn timeout_is_reported_per_call() {
        let cli = MutagenCli::new(TimingOutRunner, &ControlConfig::default());
        let err = cli.pause_session("web").expect_err("timeout");
        assert_eq!(err.to_string(), "`mutagen sync pause web` timed out after 30s");
    }

    #[test]
    fn install_check_runs_version() {
        let cli = cli(vec![ExecOutput::ok("0.18.0")]);
        assert!(cli.is_installed());
        assert_eq!(cli.runner.command_lines(), vec!["mutagen version"]);

        let missing = MutagenCli::new(TimingOutRunner, &ControlConfig::default());
        assert!(!missing.is_installed());
    }
}
