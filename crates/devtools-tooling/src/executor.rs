use core::time::Duration;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use devtools_core::{ProcessOutcome, ProcessStatus};
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tokio::process::Command;
use tokio::task::{JoinHandle, spawn};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::process_group::ProcessGroup;

/// Bytes read from a pipe per chunk.
const READ_CHUNK: usize = 8 * 1024;

/// How long to keep reading pipes after the process exits on its own.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How long to keep reading pipes after the process was killed.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(100);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Tool identifier the command was built for
    pub tool: String,
    /// Program to launch
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the child
    pub working_dir: PathBuf,
    /// Time budget before the child is killed
    pub timeout: Duration,
}

impl Invocation {
    /// Program and arguments joined for logging.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Seam between the dispatcher and process launching.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the invocation to completion or until its timeout elapses.
    async fn run(&self, invocation: &Invocation) -> ProcessOutcome;
}

/// Runs external programs as child processes with a time budget.
///
/// Output is captured by background reader tasks into shared buffers, so
/// whatever a killed process printed before its deadline is still reported.
///
/// Each child leads its own process group. Once the child is done, or the
/// call is dropped, the whole group is killed so nothing the tool forked
/// into the background can touch files afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Launch `program` and wait for it to exit or for `budget` to elapse.
    ///
    /// Never fails: launch errors, timeouts and signals are all reported
    /// through [`ProcessStatus`].
    pub async fn execute(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        budget: Duration,
    ) -> ProcessOutcome {
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                warn!("Failed to launch `{program}` in {working_dir:?}: {error}");
                return ProcessOutcome::launch_failed(error.to_string());
            }
        };
        let group = ProcessGroup::led_by(&child);

        let (stdout, stdout_reader) = capture(child.stdout.take());
        let (stderr, stderr_reader) = capture(child.stderr.take());

        let status = match timeout(budget, child.wait()).await {
            Ok(Ok(exit)) => exit
                .code()
                .map_or(ProcessStatus::Terminated, ProcessStatus::Exited),
            Ok(Err(error)) => {
                warn!("Failed to wait for `{program}`: {error}");
                group.kill();
                if let Err(kill_error) = child.kill().await {
                    debug!("Kill after wait failure did not succeed: {kill_error}");
                }
                ProcessStatus::Terminated
            }
            Err(_) => {
                warn!("`{program}` exceeded its {budget:?} budget, killing it");
                group.kill();
                if let Err(error) = child.kill().await {
                    warn!("Failed to kill `{program}`: {error}");
                }
                ProcessStatus::TimedOut
            }
        };
        let duration = start.elapsed();
        group.terminate().await;

        let grace = if status == ProcessStatus::TimedOut {
            KILL_DRAIN_GRACE
        } else {
            EXIT_DRAIN_GRACE
        };
        drain([stdout_reader, stderr_reader], grace).await;

        debug!("`{program}` finished with {status:?} in {duration:?}");

        ProcessOutcome {
            status,
            stdout: snapshot(&stdout),
            stderr: snapshot(&stderr),
            duration,
        }
    }
}

#[async_trait]
impl ProcessRunner for ProcessExecutor {
    async fn run(&self, invocation: &Invocation) -> ProcessOutcome {
        debug!(
            "Running {}: {} in {:?}",
            invocation.tool,
            invocation.command_line(),
            invocation.working_dir
        );
        self.execute(
            &invocation.program,
            &invocation.args,
            &invocation.working_dir,
            invocation.timeout,
        )
        .await
    }
}

/// Copy a child pipe into a shared buffer on a background task.
fn capture<R>(pipe: Option<R>) -> (SharedBuffer, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = SharedBuffer::default();
    let sink = Arc::clone(&buffer);

    let reader = spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..read]),
                Err(error) => {
                    debug!("Stopped reading child pipe: {error}");
                    break;
                }
            }
        }
    });

    (buffer, reader)
}

/// Wait briefly for readers to hit EOF, then stop them.
///
/// A grandchild that inherited the pipes can keep them open long after the
/// direct child is gone, so readers are never awaited unbounded.
async fn drain(mut readers: [JoinHandle<()>; 2], grace: Duration) {
    let finished = timeout(grace, async {
        for reader in &mut readers {
            if let Err(error) = reader.await {
                debug!("Pipe reader task failed: {error}");
            }
        }
    })
    .await;

    if finished.is_err() {
        debug!("Child pipes still open after {grace:?}, keeping output captured so far");
    }
    for reader in &readers {
        reader.abort();
    }
}

fn snapshot(buffer: &SharedBuffer) -> String {
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}
