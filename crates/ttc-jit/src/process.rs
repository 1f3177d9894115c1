use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{TtcError, TtcResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished child.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs `command` to completion with both output pipes drained on threads.
///
/// Fails when the program cannot be started or `timeout` expires. A nonzero
/// exit is returned as a normal output; callers decide what it means.
pub(crate) fn run(
    mut command: Command,
    label: &str,
    timeout: Option<Duration>,
) -> TtcResult<ProcessOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .map_err(|err| TtcError::process(format!("failed to run {label}: {err}")))?;

    let stdout = drain(&mut child, Stream::Stdout, label)?;
    let stderr = drain(&mut child, Stream::Stderr, label)?;

    let status = match wait(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            // Grandchildren may still hold the pipes open; the readers are
            // left to finish on their own.
            drop((stdout, stderr));
            let limit = timeout.unwrap_or_default();
            return Err(TtcError::process(format!(
                "{label} timed out after {} ms",
                limit.as_millis()
            )));
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TtcError::process(format!("failed to wait for {label}: {err}")));
        }
    };

    Ok(ProcessOutput {
        status,
        stdout: join(stdout, label)?,
        stderr: join(stderr, label)?,
    })
}

/// Standard `status/stdout/stderr` failure message for a nonzero exit.
pub(crate) fn failure_message(label: &str, output: &ProcessOutput) -> String {
    format!(
        "{label} failed (status={}): stdout='{}' stderr='{}'",
        output.status,
        output.stdout_lossy(),
        output.stderr_lossy()
    )
}

enum Stream {
    Stdout,
    Stderr,
}

type Reader = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain(child: &mut Child, stream: Stream, label: &str) -> TtcResult<Reader> {
    let source: Option<Box<dyn Read + Send>> = match stream {
        Stream::Stdout => child.stdout.take().map(|pipe| Box::new(pipe) as Box<dyn Read + Send>),
        Stream::Stderr => child.stderr.take().map(|pipe| Box::new(pipe) as Box<dyn Read + Send>),
    };
    let Some(mut source) = source else {
        return Ok(None);
    };
    let handle = thread::Builder::new()
        .name(format!("{label}-pipe"))
        .spawn(move || {
            let mut buffer = Vec::new();
            source.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
        .map_err(|err| {
            let _ = child.kill();
            let _ = child.wait();
            TtcError::resource(format!("starting the {label} pipe reader"), err)
        })?;
    Ok(Some(handle))
}

fn join(reader: Reader, label: &str) -> TtcResult<Vec<u8>> {
    let Some(handle) = reader else {
        return Ok(Vec::new());
    };
    match handle.join() {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(err)) => Err(TtcError::resource(format!("reading {label} output"), err)),
        Err(_) => Err(TtcError::process(format!("{label} pipe reader panicked"))),
    }
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child.wait().map(Some);
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
