use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A structured command line. Arguments are never joined into a shell string.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub label: &'static str,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
}

#[derive(Debug)]
pub enum RunOutput {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

impl Invocation {
    pub fn new(label: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            label,
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Appends the renderer's own `-i/-o/-t/-b` arguments.
    pub fn render_args(self, input: &Path, output: &Path, theme: &str, background: &str) -> Self {
        self.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-t")
            .arg(theme)
            .arg("-b")
            .arg(background)
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Runs to completion or until `timeout` elapses, whichever comes first.
    ///
    /// `Err` is returned only when the process could not be spawned. A timed
    /// out child is killed and reaped before returning. The deadline also
    /// bounds output collection, so descendants holding the pipes open cannot
    /// stall the caller. A timeout too large to represent means no deadline.
    pub fn run(&self, timeout: Duration) -> io::Result<RunOutput> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            command.env(key, value);
        }

        debug!(
            op = "invoke::run",
            label = self.label,
            program = %self.program.display(),
            args = ?self.args,
            "spawning renderer"
        );

        let deadline = Instant::now().checked_add(timeout);
        let mut child = command.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match wait_with_deadline(&mut child, deadline)? {
            Some(status) => Ok(RunOutput::Exited {
                status,
                stdout: collect(&stdout, deadline),
                stderr: collect(&stderr, deadline),
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Ok(RunOutput::TimedOut)
            }
        }
    }
}

fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Instant>,
) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                POLL_INTERVAL.min(deadline - now)
            }
            None => POLL_INTERVAL,
        };
        thread::sleep(pause);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = tx.send(String::from_utf8_lossy(&buffer).into_owned());
        });
    }
    rx
}

// Whatever a stream produced by the deadline; empty if it is still held open.
fn collect(rx: &Receiver<String>, deadline: Option<Instant>) -> String {
    match deadline {
        Some(deadline) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_exit_status_and_streams() {
        let invocation = Invocation::new("test", "/bin/sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");

        match invocation.run(Duration::from_secs(10)).unwrap() {
            RunOutput::Exited {
                status,
                stdout,
                stderr,
            } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stdout, "out\n");
                assert_eq!(stderr, "err\n");
            }
            RunOutput::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn passes_arguments_without_shell_interpolation() {
        let tricky = "diagram \"1\"; $(rm -rf x).mmd";
        let invocation = Invocation::new("test", "/bin/sh")
            .arg("-c")
            .arg("printf '%s' \"$1\"")
            .arg("sh")
            .arg(tricky);

        match invocation.run(Duration::from_secs(10)).unwrap() {
            RunOutput::Exited { stdout, .. } => assert_eq!(stdout, tricky),
            RunOutput::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn reports_timeout() {
        let invocation = Invocation::new("test", "/bin/sh").arg("-c").arg("sleep 5");

        let started = Instant::now();
        let output = invocation.run(Duration::from_millis(200)).unwrap();

        assert!(matches!(output, RunOutput::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_descendant_cannot_outlive_deadline() {
        let invocation = Invocation::new("test", "/bin/sh")
            .arg("-c")
            .arg("sleep 6 & exit 0");

        let started = Instant::now();
        let output = invocation.run(Duration::from_secs(1)).unwrap();

        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
        match output {
            RunOutput::Exited { status, .. } => assert_eq!(status.code(), Some(0)),
            RunOutput::TimedOut => panic!("the direct child exited before the deadline"),
        }
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let invocation = Invocation::new("test", "/bin/sh").arg("-c").arg("echo done");

        match invocation.run(Duration::MAX).unwrap() {
            RunOutput::Exited { status, stdout, .. } => {
                assert!(status.success());
                assert_eq!(stdout, "done\n");
            }
            RunOutput::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let invocation = Invocation::new("test", "/definitely/not/a/renderer");
        let err = invocation.run(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn forwards_environment() {
        let invocation = Invocation::new("test", "/bin/sh")
            .arg("-c")
            .arg("printf '%s' \"$MERMAID_PROBE\"")
            .env("MERMAID_PROBE", "cache-dir");

        match invocation.run(Duration::from_secs(10)).unwrap() {
            RunOutput::Exited { stdout, .. } => assert_eq!(stdout, "cache-dir"),
            RunOutput::TimedOut => panic!("unexpected timeout"),
        }
    }
}
