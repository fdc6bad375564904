use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use syncdeck_core::control::ControlError;
use tracing::debug;

use crate::contracts::ExecOutput;
use crate::contracts::ExecRequest;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub trait CommandRunner: Send + Sync {
    fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ControlError>;
}

/// Spawns real processes. A call past its deadline kills the child.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ControlError> {
        debug!(command = %request.command_line(), "exec");
        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ControlError::Spawn {
                command: request.command_line(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let success = match wait_with_deadline(&mut child, request.timeout) {
            Ok(Some(success)) => success,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ControlError::Timeout {
                    command: request.command_line(),
                    timeout: request.timeout,
                });
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ControlError::Spawn {
                    command: request.command_line(),
                    source,
                });
            }
        };

        Ok(ExecOutput {
            success,
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn drain<R>(stream: Option<R>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stream.read_to_string(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// `Ok(None)` when the deadline passed first.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<bool>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status.success()));
        }
        if started.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
