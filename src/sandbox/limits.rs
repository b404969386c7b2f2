//! Per-process resource limits applied to script children.

use serde::Deserialize;
use tokio::process::Command;

/// Kernel resource limits for a spawned script (Unix only; ignored elsewhere).
///
/// Every field is optional. Core dumps are always disabled when any limit is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceLimits {
    /// CPU time in seconds (`RLIMIT_CPU`).
    #[serde(default)]
    pub cpu_seconds: Option<u64>,
    /// Address space in bytes (`RLIMIT_AS`, Linux only).
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    /// Open file descriptors (`RLIMIT_NOFILE`).
    #[serde(default)]
    pub max_open_files: Option<u64>,
    /// Processes for the executing user (`RLIMIT_NPROC`).
    #[serde(default)]
    pub max_processes: Option<u64>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.cpu_seconds.is_none()
            && self.memory_bytes.is_none()
            && self.max_open_files.is_none()
            && self.max_processes.is_none()
    }
}

/// Install the limits on `command` so they apply to the child only.
#[cfg(unix)]
pub(crate) fn install(command: &mut Command, limits: &ResourceLimits) {
    if limits.is_empty() {
        return;
    }
    let limits = limits.clone();
    // SAFETY: the hook only calls setrlimit, which is async-signal-safe,
    // and does not allocate.
    unsafe {
        command.pre_exec(move || apply(&limits));
    }
}

#[cfg(not(unix))]
pub(crate) fn install(_command: &mut Command, limits: &ResourceLimits) {
    if !limits.is_empty() {
        tracing::warn!("Resource limits are not supported on this platform");
    }
}

#[cfg(unix)]
fn rlimit(value: u64) -> libc::rlimit {
    libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    }
}

#[cfg(unix)]
fn apply(limits: &ResourceLimits) -> std::io::Result<()> {
    // SAFETY: setrlimit reads a fully initialised struct and only affects
    // the calling (child) process.
    unsafe {
        if let Some(cpu) = limits.cpu_seconds
            && libc::setrlimit(libc::RLIMIT_CPU, &rlimit(cpu)) != 0
        {
            return Err(std::io::Error::last_os_error());
        }

        #[cfg(any(target_os = "linux", target_os = "android"))]
        if let Some(bytes) = limits.memory_bytes
            && libc::setrlimit(libc::RLIMIT_AS, &rlimit(bytes)) != 0
        {
            return Err(std::io::Error::last_os_error());
        }

        if let Some(files) = limits.max_open_files
            && libc::setrlimit(libc::RLIMIT_NOFILE, &rlimit(files)) != 0
        {
            return Err(std::io::Error::last_os_error());
        }

        #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
        if let Some(procs) = limits.max_processes
            && libc::setrlimit(libc::RLIMIT_NPROC, &rlimit(procs)) != 0
        {
            return Err(std::io::Error::last_os_error());
        }

        if libc::setrlimit(libc::RLIMIT_CORE, &rlimit(0)) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
