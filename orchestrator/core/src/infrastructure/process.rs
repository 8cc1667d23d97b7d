// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bot Processes
//
// Each bot runs as a direct child in its own process group so that stopping
// it also takes down anything it spawned. Children are killed if their
// `Child` is dropped, which ties their lifetime to the supervising process.

use crate::domain::bot::{BotId, ContainerError, LaunchInfo};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Tracing target for bot stdout/stderr lines.
pub const BOT_LOG_TARGET: &str = "botfactory::bot";

/// Reference to a running bot process. The `Child` itself is owned by the
/// task that waits on it.
///
/// `exited` is set, under its lock, before the process is reaped. Signalling
/// happens under the same lock, so a reaped pid is never signalled.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exited: Arc<Mutex<bool>>,
}

impl ProcessHandle {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            exited: Arc::new(Mutex::new(false)),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        *self.exited.lock()
    }

    fn mark_exited(&self) {
        *self.exited.lock() = true;
    }

    /// Send SIGKILL to the bot's whole process group.
    #[cfg(unix)]
    pub fn kill_tree(&self) {
        let Some(pid) = self.pid else {
            return;
        };
        let exited = self.exited.lock();
        if *exited {
            debug!(pid, "Process already exited, not signalling");
            return;
        }
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            warn!(pid, "Process id out of range, not signalling");
            return;
        };
        // SAFETY: killpg only takes plain integers. The leader has not been
        // reaped (checked above), so the group id is still ours.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        drop(exited);
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            // ESRCH: the group is already gone.
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(pid, "Failed to kill process group: {}", err);
            }
        } else {
            debug!(pid, "Sent SIGKILL to process group");
        }
    }

    #[cfg(not(unix))]
    pub fn kill_tree(&self) {
        warn!(pid = ?self.pid, "Process tree termination is only supported on unix");
    }
}

/// Wait for the bot to exit and reap it.
///
/// On unix the exit is observed first without reaping (`waitid` with
/// `WNOWAIT`), then the handle is marked exited, then the child is reaped.
pub async fn wait_exit(handle: &ProcessHandle, child: &mut Child) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = handle.pid {
        match tokio::task::spawn_blocking(move || wait_without_reaping(pid)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(pid, "Non-reaping wait failed: {}", e),
            Err(e) => debug!(pid, "Non-reaping wait task failed: {}", e),
        }
    }
    handle.mark_exited();
    child.wait().await
}

#[cfg(unix)]
fn wait_without_reaping(pid: u32) -> std::io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data and waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Start a bot process in its working directory.
///
/// `env` is layered over the inherited environment.
pub fn spawn_bot(
    launch: &LaunchInfo,
    env: &BTreeMap<String, String>,
) -> Result<(ProcessHandle, Child), ContainerError> {
    let mut cmd = Command::new(&launch.command);
    cmd.args(&launch.arguments)
        .current_dir(&launch.working_directory)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ContainerError::SpawnFailed {
        command: launch.command.clone(),
        source,
    })?;

    let handle = ProcessHandle::new(child.id());
    Ok((handle, child))
}

/// Forward the child's stdout and stderr to the log, one line per event.
pub fn forward_output(bot_id: &BotId, child: &mut Child) {
    let pid = child.id();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(bot_id.clone(), pid, "stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(bot_id.clone(), pid, "stderr", stderr));
    }
}

async fn forward_lines<R>(bot_id: BotId, pid: Option<u32>, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(target: BOT_LOG_TARGET, pid = ?pid, bot_id = %bot_id, stream, "{}", line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(target: BOT_LOG_TARGET, pid = ?pid, bot_id = %bot_id, stream, "Output read error: {}", e);
                break;
            }
        }
    }
}
