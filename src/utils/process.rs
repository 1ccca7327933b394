//! Interface to external solver executables.

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use std::{fmt, thread};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Invokes `program`, feeding `input` on its standard input and collecting
/// its standard output.
///
/// When a timeout is given, the child is killed once it elapses and the
/// invocation fails with [`ProcessError::Timeout`].
pub fn run<S>(
    program: &OsStr,
    args: &[S],
    input: &[u8],
    timeout: Option<Duration>,
) -> Result<String, ProcessError>
where
    S: AsRef<OsStr>,
{
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let stdin = child.stdin.take().ok_or(ProcessError::Pipe)?;
    let mut stdout = child.stdout.take().ok_or(ProcessError::Pipe)?;

    // Helper threads are detached: descendants of the child may hold the
    // pipes open after it is killed.
    let input = input.to_vec();

    thread::spawn(move || feed(stdin, &input));

    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = stdout.read_to_end(&mut buffer).map(|_| buffer);

        let _ = sender.send(result);
    });

    let status = wait(&mut child, timeout)?;

    let output = match timeout {
        Some(limit) => {
            let remaining = limit.saturating_sub(start.elapsed());

            receiver.recv_timeout(remaining).map_err(|err| match err {
                RecvTimeoutError::Timeout => ProcessError::Timeout(limit),
                RecvTimeoutError::Disconnected => ProcessError::Pipe,
            })?
        }
        None => receiver.recv().map_err(|_| ProcessError::Pipe)?,
    }?;

    if !status.success() {
        return Err(ProcessError::Status(status.code()));
    }

    String::from_utf8(output).map_err(ProcessError::from)
}

fn feed<W: Write>(mut stdin: W, input: &[u8]) {
    // A solver is free to exit before consuming its input.
    if let Err(err) = stdin.write_all(input) {
        if err.kind() != io::ErrorKind::BrokenPipe {
            log::debug!("failed to write solver input: {err}");
        }
    }
}

fn wait(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, ProcessError> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if start.elapsed() >= limit {
            // The child may exit on its own between the poll and the kill.
            let _ = child.kill();
            child.wait()?;

            return Err(ProcessError::Timeout(limit));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// An error resulting from an external invocation.
#[derive(Debug)]
#[non_exhaustive]
pub enum ProcessError {
    Io(io::Error),
    Pipe,
    Utf8,
    Status(Option<i32>),
    Timeout(Duration),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessError::Io(err) => write!(f, "I/O error: {err}"),
            ProcessError::Pipe => write!(f, "lost pipe to child process"),
            ProcessError::Utf8 => {
                write!(f, "invocation returned invalid UTF-8")
            }
            ProcessError::Status(Some(code)) => {
                write!(f, "invocation failed with exit code {code}")
            }
            ProcessError::Status(None) => {
                write!(f, "invocation terminated by signal")
            }
            ProcessError::Timeout(limit) => {
                write!(f, "invocation timed out after {limit:?}")
            }
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<io::Error> for ProcessError {
    fn from(err: io::Error) -> Self {
        ProcessError::Io(err)
    }
}

impl From<FromUtf8Error> for ProcessError {
    fn from(_: FromUtf8Error) -> Self {
        ProcessError::Utf8
    }
}
