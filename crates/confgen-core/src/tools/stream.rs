use super::{ToolCommand, timeout_error, wait_with_deadline};
use crate::domain::{ConfgenError, ConfgenResult};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

/// Lazy sequence of a running tool's stdout lines.
///
/// Each line is echoed to our stdout as it is yielded. Call [`finish`] to
/// drain the remainder and collect the exit status; dropping the stream
/// before that kills and reaps the child.
///
/// [`finish`]: LineStream::finish
pub struct LineStream {
    child: Child,
    command: ToolCommand,
    lines: Receiver<std::io::Result<String>>,
    deadline: Option<Instant>,
    exhausted: bool,
    reaped: bool,
}

impl LineStream {
    pub(super) fn start(
        mut child: Child,
        command: ToolCommand,
        deadline: Option<Instant>,
    ) -> ConfgenResult<Self> {
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConfgenError::internal(
                "SYS.TOOL_STDOUT",
                format!("stdout of '{}' was not captured", command.program()),
            ));
        };

        let (sender, lines) = mpsc::channel();
        thread::spawn(move || forward_lines(stdout, sender));

        Ok(Self {
            child,
            command,
            lines,
            deadline,
            exhausted: false,
            reaped: false,
        })
    }

    /// Consumes whatever output is left, waits for the child and returns its
    /// exit status. Judging the status is up to the caller.
    pub fn finish(mut self) -> ConfgenResult<ExitStatus> {
        while let Some(line) = self.next() {
            line?;
        }

        let status = wait_with_deadline(&mut self.child, self.deadline, &self.command);
        self.reaped = true;
        status
    }

    fn abort(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}

impl Iterator for LineStream {
    type Item = ConfgenResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let received = match self.deadline {
            Some(deadline) => self
                .lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(line)) => match echo_line(&mut io::stdout().lock(), &line) {
                Ok(()) => Some(Ok(line)),
                Err(source) => {
                    self.exhausted = true;
                    self.abort();
                    Some(Err(ConfgenError::io_system(
                        "IO.TOOL_OUTPUT",
                        format!(
                            "failed to echo output of '{}': {}",
                            self.command.program(),
                            source
                        ),
                    )))
                }
            },
            Ok(Err(source)) => {
                self.exhausted = true;
                self.abort();
                Some(Err(ConfgenError::io_system(
                    "IO.TOOL_OUTPUT",
                    format!(
                        "failed to read output of '{}': {}",
                        self.command.program(),
                        source
                    ),
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.exhausted = true;
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                self.exhausted = true;
                self.abort();
                Some(Err(timeout_error(&self.command)))
            }
        }
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        self.abort();
    }
}

/// A reader that went away (`confgen ... | head`) is not an error; the tool
/// output is still consumed and classified.
fn echo_line<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    match writeln!(out, "{line}") {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn forward_lines<R: Read>(stdout: R, sender: mpsc::Sender<std::io::Result<String>>) {
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if sender.send(Ok(line)).is_err() {
                    break;
                }
            }
            Err(error) => {
                let _ = sender.send(Err(error));
                break;
            }
        }
    }
}


#[cfg(all(test, unix))]
mod tests {
    use crate::tools::{ToolCommand, ToolInvoker};
    use std::time::Duration;
    use tempfile::TempDir;

    fn shell(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn stream_yields_lines_in_order_and_reports_exit() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let mut stream = invoker
            .stream(&shell("printf 'alpha\\r\\nbeta\\ngamma'"))
            .expect("stream should start");
        let lines = stream
            .by_ref()
            .collect::<Result<Vec<_>, _>>()
            .expect("lines should be readable");
        assert_eq!(lines, vec!["alpha", "beta", "gamma"]);

        let status = stream.finish().expect("finish should reap the child");
        assert!(status.success());
    }

    #[test]
    fn finish_drains_unread_output_and_returns_failure_status() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let mut stream = invoker
            .stream(&shell("echo first; echo second; exit 7"))
            .expect("stream should start");
        let first = stream
            .next()
            .expect("one line should be available")
            .expect("line should be readable");
        assert_eq!(first, "first");

        let status = stream.finish().expect("finish should drain the rest");
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn invalid_utf8_is_replaced_instead_of_failing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let stream = invoker
            .stream(&shell("printf 'ok \\377 line\\n'"))
            .expect("stream should start");
        let lines = stream
            .collect::<Result<Vec<_>, _>>()
            .expect("lossy decoding should not error");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
        assert!(lines[0].ends_with(" line"));
    }

    #[test]
    fn dropping_an_unfinished_stream_does_not_hang() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), None);

        let mut stream = invoker
            .stream(&shell("echo ready; sleep 30"))
            .expect("stream should start");
        let first = stream
            .next()
            .expect("first line should arrive")
            .expect("line should be readable");
        assert_eq!(first, "ready");
        drop(stream);
    }

    #[test]
    fn stream_timeout_surfaces_as_error_item() {
        let temp = TempDir::new().expect("tempdir should be created");
        let invoker = ToolInvoker::new(temp.path(), Some(Duration::from_millis(200)));

        let stream = invoker
            .stream(&shell("echo start; sleep 30"))
            .expect("stream should start");
        let error = stream
            .collect::<Result<Vec<_>, _>>()
            .expect_err("silent tool should time out");
        assert_eq!(error.code(), "RUN.TOOL_TIMEOUT");
    }
}
