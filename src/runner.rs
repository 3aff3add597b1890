//! Spawns the child and drives recording and estimation.
//!
//! The child's stdout and stderr share one anonymous pipe, so the
//! reader sees lines interleaved in the order the OS saw the writes. A
//! reader thread drains the pipe while the main thread blocks in
//! `wait()`; the exit status crosses a one-slot channel only after the
//! stream has hit EOF. Draining never waits on the wait, which is what
//! keeps a chatty child from deadlocking against a full pipe buffer.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use crate::command::CommandSpec;
use crate::fingerprint::{FingerprintMode, LineLog};
use crate::progress::Estimator;
use crate::state::RunState;

/// What the driver hands back once the stream is drained and the child
/// has exited.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub status: ExitStatus,
}

/// Run the command to completion.
///
/// `epoch` is the instant all recorded timestamps are relative to;
/// the caller captures it once at startup. With a previous state the
/// progress bar is driven from it; without one, output is echoed live
/// instead. Every line lands in `log_file` either way.
pub fn run(
    spec: &CommandSpec,
    previous: Option<RunState>,
    log_file: File,
    mode: FingerprintMode,
    epoch: Instant,
) -> Result<RunOutcome> {
    let (pipe_reader, pipe_writer) = os_pipe::pipe().context("failed to create output pipe")?;
    let stderr_writer = pipe_writer
        .try_clone()
        .context("failed to clone output pipe")?;

    let mut command = spec.command();
    command
        .stdin(Stdio::inherit())
        .stdout(pipe_writer)
        .stderr(stderr_writer);

    debug!(command = %spec, "spawning");
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start command: {}", spec.program))?;

    // The builder keeps its own copies of the pipe's write end; drop
    // them so the reader sees EOF as soon as the child exits.
    drop(command);

    let (status_tx, status_rx) = mpsc::sync_channel::<ExitStatus>(1);

    let reader = thread::spawn(move || -> Result<LineLog> {
        let mut lines = LineLog::new(mode);
        let mut estimator = previous.map(Estimator::new);
        let mut log = BufWriter::new(log_file);
        let mut stream = BufReader::new(pipe_reader);
        let mut stdout = io::stdout();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = stream
                .read_until(b'\n', &mut buf)
                .context("failed to read command output")?;
            if n == 0 {
                break;
            }
            let line = trim_line_ending(&buf);

            let observation = lines.record(line, epoch.elapsed());

            log.write_all(line)
                .and_then(|()| log.write_all(b"\n"))
                .context("failed to append to log file")?;

            match estimator.as_mut() {
                Some(estimator) => estimator.observe(&observation.key, observation.index),
                None => {
                    // First run for this session: show output live.
                    let _ = stdout.write_all(line);
                    let _ = stdout.write_all(b"\n");
                    let _ = stdout.flush();
                }
            }
        }

        if let Some(estimator) = estimator.as_mut() {
            // EOF means the child is done. The bar lands on 100% only
            // for a clean exit; a dropped sender means the wait itself
            // failed and there is nothing to snap to.
            match status_rx.recv() {
                Ok(status) => estimator.finish(status.success()),
                Err(_) => estimator.finish(false),
            }
        }

        log.flush().context("failed to flush log file")?;
        Ok(lines)
    });

    let wait_result = child.wait();
    match &wait_result {
        Ok(status) => {
            let _ = status_tx.send(*status);
        }
        Err(_) => drop(status_tx),
    }

    let lines = reader
        .join()
        .map_err(|_| anyhow::anyhow!("output reader thread panicked"))??;

    let status = wait_result.context("failed to wait for command")?;
    let duration = epoch.elapsed();
    debug!(?duration, code = ?status.code(), "command finished");

    Ok(RunOutcome {
        state: lines.into_state(duration),
        status,
    })
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
