//! Privilege (sudo) probing and priming
//!
//! The pipeline executor never prompts for a password: it does not own the
//! terminal, and an interactive `sudo` under the TUI would hang forever.
//! Instead it asks [`sudo_cached`] (non-interactive validation) and fails
//! fast with `AuthRequired` when credentials are missing. The orchestrator
//! then suspends the TUI and runs [`prime_sudo_interactive`], which owns
//! the terminal for the duration of the prompt.

use std::process::{Command, Stdio};

/// The leading token that marks a fix command as privileged.
pub const SUDO_PREFIX: &str = "sudo ";

/// Non-interactive check that sudo credentials are currently cached.
/// Never prompts; `sudo -n true` exits non-zero when a password would be
/// required. Root needs no escalation at all.
pub fn sudo_cached() -> bool {
    if nix::unistd::geteuid().is_root() {
        return true;
    }
    Command::new("sudo")
        .args(["-n", "true"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Interactive credential priming. The caller must have surrendered the
/// terminal (raw mode off, alternate screen left) before calling; stdio is
/// inherited so sudo can prompt. Returns whether authentication succeeded.
pub fn prime_sudo_interactive() -> std::io::Result<bool> {
    let status = Command::new("sudo").arg("-v").status()?;
    Ok(status.success())
}

/// Whether a fix command needs elevated privileges.
pub fn requires_sudo(command: &str) -> bool {
    command.starts_with(SUDO_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_sudo_prefix_only() {
        assert!(requires_sudo("sudo systemctl restart foo"));
        assert!(!requires_sudo("systemctl --user restart foo"));
        // Only a leading token counts.
        assert!(!requires_sudo("echo sudo"));
        assert!(!requires_sudo("sudoedit /etc/hosts"));
    }
}
