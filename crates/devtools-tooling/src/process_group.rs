//! Ownership of every process a tool starts.
//!
//! Tools are spawned as process group leaders. Anything they fork into the
//! background stays in that group unless it calls `setsid`, so signalling the
//! group reaches helpers that outlive the direct child.

use tokio::process::Child;

#[cfg(unix)]
use core::time::Duration;
#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::{Instant, sleep};
#[cfg(unix)]
use tracing::{debug, warn};

/// How long to wait for a killed group to disappear.
#[cfg(unix)]
const REAP_WINDOW: Duration = Duration::from_millis(500);

#[cfg(unix)]
const REAP_POLL: Duration = Duration::from_millis(10);

/// Guard over the process group led by a spawned child.
///
/// Dropping the guard sends `SIGKILL` to the whole group. [`Self::terminate`]
/// does the same and then waits for the group to empty.
#[derive(Debug)]
pub(crate) struct ProcessGroup {
    #[cfg(unix)]
    leader: Option<Pid>,
}

#[cfg(unix)]
impl ProcessGroup {
    /// Take ownership of the group led by `child`.
    ///
    /// The child must have been spawned with `process_group(0)`.
    pub(crate) fn led_by(child: &Child) -> Self {
        let leader = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .map(Pid::from_raw);
        Self { leader }
    }

    /// Send `SIGKILL` to every member of the group.
    pub(crate) fn kill(&self) {
        if let Some(leader) = self.leader {
            signal_group(leader);
        }
    }

    /// Kill any stragglers and wait until the group has no members left.
    ///
    /// Gives up after a short window. A member stuck in uninterruptible sleep
    /// cannot be waited out, and the caller still needs an answer.
    pub(crate) async fn terminate(mut self) {
        let Some(leader) = self.leader.take() else {
            return;
        };
        signal_group(leader);

        let deadline = Instant::now() + REAP_WINDOW;
        while group_alive(leader) {
            if Instant::now() >= deadline {
                warn!("Process group {leader} still has members after {REAP_WINDOW:?}");
                return;
            }
            sleep(REAP_POLL).await;
        }
        debug!("Process group {leader} is gone");
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(leader) = self.leader.take() {
            signal_group(leader);
        }
    }
}

#[cfg(unix)]
fn signal_group(leader: Pid) {
    match killpg(leader, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(error) => warn!("Failed to kill process group {leader}: {error}"),
    }
}

#[cfg(unix)]
fn group_alive(leader: Pid) -> bool {
    killpg(leader, None).is_ok()
}

#[cfg(not(unix))]
impl ProcessGroup {
    pub(crate) const fn led_by(_child: &Child) -> Self {
        Self {}
    }

    pub(crate) const fn kill(&self) {}

    #[allow(clippy::unused_async, reason = "Matches the unix signature")]
    pub(crate) async fn terminate(self) {}
}
