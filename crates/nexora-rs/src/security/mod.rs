use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;

const STDOUT_TAIL: usize = 6000;
const STDERR_TAIL: usize = 3000;

/// Captured result of one bounded external-tool invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Combined log for storage, stdout then stderr, tail-truncated.
    pub fn combined_log(&self) -> String {
        let mut log = tail(&self.stdout, STDOUT_TAIL).to_string();
        if !self.stderr.is_empty() {
            if !log.is_empty() {
                log.push('\n');
            }
            log.push_str("--- stderr ---\n");
            log.push_str(tail(&self.stderr, STDERR_TAIL));
        }
        log
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Resolves a tool binary: an explicit configured path wins if it exists,
/// otherwise the candidate command names are looked up on PATH in order.
/// `None` means the tool is unavailable and the adapter must skip.
pub fn resolve_binary(configured: Option<&str>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(path) = configured {
        let p = Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
        return None;
    }
    candidates.iter().find_map(|name| which::which(name).ok())
}

/// Spawns `bin` with `args`, capturing stdout and stderr, bounded by
/// `timeout`. The child is made the leader of its own process group, so a
/// timeout kills the whole group: wrapper-script tools (zap.sh launching a
/// JVM) cannot leave their real work running as an orphan. Spawn errors are
/// the only `Err` case; a non-zero exit or timeout is reported in the
/// returned `CommandOutput`.
pub async fn run_command(
    bin: &Path,
    args: &[String],
    limit: Duration,
) -> std::io::Result<CommandOutput> {
    info!(command = %bin.display(), ?args, "launching external tool");

    let mut cmd = Command::new(bin);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn()?;
    let pid = child.id();

    match timeout(limit, child.wait_with_output()).await {
        Ok(out) => {
            let out = out?;
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                exit_code: out.status.code(),
                timed_out: false,
            })
        }
        Err(_) => {
            // The dropped future already killed the direct child; sweep the
            // rest of its group.
            kill_process_group(pid);
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: true,
            })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // The child was spawned as its own group leader, so the group id is its
    // pid.
    unsafe {
        libc::killpg(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
