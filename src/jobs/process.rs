//! OS process helpers for trainers started by an earlier host process
//!
//! Trainers run in their own process group (group id == trainer pid), so a
//! kill reaches whatever the trainer itself spawned.

use std::process::{Command, Stdio};

/// Force-kill a trainer and its process group. Returns whether the signal
/// was delivered.
#[cfg(unix)]
pub fn kill_tree(pid: u32) -> std::io::Result<bool> {
    let output = Command::new("kill")
        .args(["-9", "--", &format!("-{}", pid)])
        .stdin(Stdio::null())
        .output()?;
    if output.status.success() {
        return Ok(true);
    }

    // Not a group leader: fall back to the single process
    let output = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .output()?;
    Ok(output.status.success())
}

#[cfg(windows)]
pub fn kill_tree(pid: u32) -> std::io::Result<bool> {
    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .output()?;
    Ok(output.status.success())
}

#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let signalled = Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    signalled && !is_zombie(pid)
}

/// An exited child nobody reaped still answers `kill -0`
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // The state field follows the parenthesised command name
            stat.rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next().map(|s| s == "Z"))
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(windows)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(output) = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .stdin(Stdio::null())
        .output()
    else {
        return false;
    };
    String::from_utf8_lossy(&output.stdout).contains(&pid.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::time::Duration;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn test_kill_running_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        assert!(kill_tree(child.id()).unwrap());
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_kill_reaches_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(r#"(sleep 1; touch "$1") & wait"#)
            .arg("sh")
            .arg(&marker)
            .process_group(0)
            .spawn()
            .unwrap();

        assert!(kill_tree(child.id()).unwrap());
        child.wait().unwrap();

        std::thread::sleep(Duration::from_secs(2));
        assert!(!marker.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreaped_child_is_not_alive() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        std::thread::sleep(Duration::from_millis(300));
        assert!(!is_alive(pid));
        child.wait().unwrap();
    }
}
