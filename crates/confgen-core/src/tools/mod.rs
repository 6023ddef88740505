mod stream;

pub use stream::LineStream;

use crate::domain::{ConfgenError, ConfgenResult};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One external tool invocation: program, ordered arguments and an optional
/// working directory overriding the invoker's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ToolInvoker {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(working_dir: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Runs to completion with inherited stdio. A non-zero exit is fatal.
    pub fn run(&self, command: &ToolCommand) -> ConfgenResult<()> {
        let mut process = self.build(command);
        let mut child = spawn(&mut process, command)?;
        let status = wait_with_deadline(&mut child, self.deadline(), command)?;
        ensure_success(command, status)
    }

    /// Runs to completion with stdout and stderr captured into `log_path`.
    /// The exit status is returned unjudged.
    pub fn run_logged(&self, command: &ToolCommand, log_path: &Path) -> ConfgenResult<ExitStatus> {
        let log = File::create(log_path).map_err(|source| {
            ConfgenError::io_system(
                "IO.TOOL_LOG",
                format!(
                    "failed to create log file '{}' for '{}': {}",
                    log_path.display(),
                    command.program(),
                    source
                ),
            )
        })?;
        let log_for_stderr = log.try_clone().map_err(|source| {
            ConfgenError::io_system(
                "IO.TOOL_LOG",
                format!(
                    "failed to duplicate log handle '{}': {}",
                    log_path.display(),
                    source
                ),
            )
        })?;

        let mut process = self.build(command);
        process
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_for_stderr));
        let mut child = spawn(&mut process, command)?;
        wait_with_deadline(&mut child, self.deadline(), command)
    }

    /// Starts the tool and hands back its stdout as a lazy line sequence,
    /// echoing every line to our own stdout as it is consumed.
    pub fn stream(&self, command: &ToolCommand) -> ConfgenResult<LineStream> {
        let mut process = self.build(command);
        process.stdout(Stdio::piped());
        let child = spawn(&mut process, command)?;
        LineStream::start(child, command.clone(), self.deadline())
    }

    fn build(&self, command: &ToolCommand) -> Command {
        let dir = command
            .current_dir
            .as_deref()
            .unwrap_or(self.working_dir.as_path());
        debug!(dir = %dir.display(), "exec: {}", command.command_line());

        let mut process = Command::new(&command.program);
        process.args(&command.args).current_dir(dir).stdin(Stdio::null());
        process
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }
}

fn spawn(process: &mut Command, command: &ToolCommand) -> ConfgenResult<Child> {
    process.spawn().map_err(|source| {
        ConfgenError::io_system(
            "IO.TOOL_SPAWN",
            format!("failed to start '{}': {}", command.program(), source),
        )
    })
}

pub(crate) fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Instant>,
    command: &ToolCommand,
) -> ConfgenResult<ExitStatus> {
    let Some(deadline) = deadline else {
        return child.wait().map_err(|source| wait_error(command, source));
    };

    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| wait_error(command, source))?
        {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(timeout_error(command));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

pub(crate) fn wait_error(command: &ToolCommand, source: std::io::Error) -> ConfgenError {
    ConfgenError::io_system(
        "IO.TOOL_WAIT",
        format!("failed to wait for '{}': {}", command.program(), source),
    )
}

pub(crate) fn timeout_error(command: &ToolCommand) -> ConfgenError {
    ConfgenError::computation(
        "RUN.TOOL_TIMEOUT",
        format!(
            "'{}' exceeded the configured timeout and was killed",
            command.command_line()
        ),
    )
}

pub fn describe_status(status: ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exit code {}", code),
    )
}

pub fn ensure_success(command: &ToolCommand, status: ExitStatus) -> ConfgenResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(ConfgenError::computation(
        "RUN.TOOL_EXIT",
        format!(
            "'{}' failed with {}",
            command.command_line(),
            describe_status(status)
        ),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::{ToolCommand, ToolInvoker};
    use crate::domain::ConfgenErrorCategory;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn shell(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn command_line_joins_program_and_arguments() {
        let command = ToolCommand::new("obabel")
            .arg("step1.mol")
            .args(["-O", "step2.mol"]);
        assert_eq!(command.command_line(), "obabel step1.mol -O step2.mol");
        assert_eq!(command.arguments().len(), 3);
    }

    #[test]
    fn run_executes_in_working_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        invoker
            .run(&shell("echo built > marker.txt"))
            .expect("shell should succeed");
        let content = fs::read_to_string(temp.path().join("marker.txt"))
            .expect("marker should be written in the working directory");
        assert_eq!(content.trim(), "built");
    }

    #[test]
    fn run_reports_non_zero_exit_as_computation_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let error = invoker.run(&shell("exit 3")).expect_err("exit 3 should fail");
        assert_eq!(error.category(), ConfgenErrorCategory::Computation);
        assert_eq!(error.code(), "RUN.TOOL_EXIT");
        assert!(error.message().contains("exit code 3"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let error = invoker
            .run(&ToolCommand::new("confgen-definitely-not-installed"))
            .expect_err("missing program should fail");
        assert_eq!(error.category(), ConfgenErrorCategory::IoSystem);
        assert_eq!(error.code(), "IO.TOOL_SPAWN");
    }

    #[test]
    fn run_logged_captures_both_streams_and_keeps_status() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);
        let log_path = temp.path().join("tool.log");

        let status = invoker
            .run_logged(&shell("echo out; echo err >&2; exit 2"), &log_path)
            .expect("logged run should not judge the exit status");
        assert_eq!(status.code(), Some(2));

        let log = fs::read_to_string(&log_path).expect("log should be readable");
        assert!(log.contains("out"));
        assert!(log.contains("err"));
    }

    #[test]
    fn command_directory_overrides_invoker_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        let nested = temp.path().join("nested");
        fs::create_dir(&nested).expect("nested dir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        invoker
            .run(&shell("touch here").current_dir(&nested))
            .expect("shell should succeed");
        assert!(nested.join("here").is_file());
        assert!(!temp.path().join("here").exists());
    }

    #[test]
    fn timeout_kills_hung_tool() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), Some(Duration::from_millis(200)));

        let started = Instant::now();
        let error = invoker
            .run(&shell("sleep 30"))
            .expect_err("sleep should time out");
        assert_eq!(error.code(), "RUN.TOOL_TIMEOUT");
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
