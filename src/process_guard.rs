//! Child process lifecycle management
//!
//! Install scripts can run for minutes (source builds) and survive a TUI
//! crash as orphans unless we take explicit measures. This module ensures
//! every spawned bash child is terminated when the parent exits, gracefully
//! or otherwise.
//!
//! Mechanics:
//! - Children are spawned in their own process group so one signal reaches
//!   the whole script tree (bash plus whatever it spawned)
//! - All child PIDs live in a global registry
//! - On parent exit (Drop, SIGINT/SIGTERM/SIGHUP) the registry sends SIGTERM
//!   to every group, waits a grace period, then SIGKILLs stragglers
//! - PR_SET_PDEATHSIG covers the hard-crash path where no Drop runs

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all spawned script children.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// PIDs (= process group ids) of running children
    pids: HashSet<u32>,
    /// Set once a cleanup sweep has started, to prevent a second sweep
    cleanup_started: bool,
}

impl ChildRegistry {
    /// Get or create the global registry.
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Register a newly spawned child.
    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        log::debug!("registered child pid {}", pid);
    }

    /// Unregister a child that exited normally.
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        log::debug!("unregistered child pid {}", pid);
    }

    /// Number of tracked children.
    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate every tracked child: SIGTERM to the group, wait up to
    /// `grace`, then SIGKILL whatever is left.
    pub fn terminate_all(&mut self, grace: Duration) {
        if self.cleanup_started {
            return;
        }
        self.cleanup_started = true;

        if self.pids.is_empty() {
            return;
        }
        log::info!("terminating {} child process(es)", self.pids.len());

        let targets: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &targets {
            if let Err(e) = signal_group(pid, Signal::SIGTERM) {
                log::warn!("SIGTERM to group {} failed: {}", pid, e);
                let _ = signal_pid(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace {
            if targets.iter().all(|&pid| !process_alive(pid)) {
                self.pids.clear();
                log::info!("all children exited within grace period");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &targets {
            if process_alive(pid) {
                log::warn!("group {} ignored SIGTERM, sending SIGKILL", pid);
                if signal_group(pid, Signal::SIGKILL).is_err() {
                    let _ = signal_pid(pid, Signal::SIGKILL);
                }
            }
        }
        self.pids.clear();
    }
}

fn signal_pid(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// Negative PID signals the whole group, catching grandchildren
/// (compilers, curl, npm) the script spawned.
fn signal_group(pgid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), sig)
}

/// True if the PID exists and is not a zombie.
fn process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    // Zombies still accept signals but are done; field 3 of /proc/pid/stat
    // is the state char.
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }
    true
}

/// Kill one child's process group immediately (cancellation path).
/// SIGTERM first so trap handlers can clean up; the registry's exit sweep
/// catches anything that lingers.
pub fn kill_child_group(pid: u32) {
    if let Err(e) = signal_group(pid, Signal::SIGTERM) {
        log::warn!("cancel: SIGTERM to group {} failed: {}", pid, e);
        let _ = signal_pid(pid, Signal::SIGTERM);
    }
}

/// RAII guard that terminates all children on drop.
/// The orchestrator owns one for the lifetime of the event loop.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }

    /// Number of tracked children (debug/tests).
    #[allow(dead_code)]
    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install handlers for SIGINT/SIGTERM/SIGHUP that sweep children before
/// exiting with 128+signo. Call once at startup.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            log::info!("received signal {}, cleaning up children", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait configuring a Command to run in its own process group.
pub trait ProcessGroupExt {
    /// Make the child the leader of a new process group and arrange for it
    /// to receive SIGTERM if the parent dies.
    fn new_process_group(&mut self) -> &mut Self;
}

impl ProcessGroupExt for std::process::Command {
    fn new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);
        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_real_process() {
        let child = Command::new("bash")
            .args(["-c", "sleep 60"])
            .spawn()
            .expect("spawn bash");
        let pid = child.id();

        let mut registry = ChildRegistry::default();
        registry.register(pid);
        assert!(process_alive(pid));

        registry.terminate_all(Duration::from_millis(500));

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline && process_alive(pid) {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!process_alive(pid), "child should be dead after sweep");
    }

    #[test]
    fn test_terminate_all_handles_already_dead_process() {
        let mut child = Command::new("bash")
            .args(["-c", "exit 0"])
            .spawn()
            .expect("spawn bash");
        let pid = child.id();
        let _ = child.wait();

        let mut registry = ChildRegistry::default();
        registry.register(pid);
        registry.terminate_all(Duration::from_millis(100));
    }

    #[test]
    fn test_cleanup_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(12345);
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_started);
        // Second sweep returns early without touching the fake pid again.
        registry.terminate_all(Duration::from_millis(10));
    }

    #[test]
    fn test_process_alive_nonexistent() {
        assert!(!process_alive(999_999));
    }
}
