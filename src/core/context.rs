//! Build context and shared teardown
//!
//! One [`BuildContext`] is threaded through every pipeline stage. Its
//! [`CleanupState`] is the single slot both teardown paths read: the normal
//! finalizer and the interrupt guardian share the same idempotent routine,
//! so a stray signal after a completed run finds nothing left to undo.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::defaults;
use crate::core::target::StorageTarget;
use crate::infra::blockdev;
use crate::infra::process::Cmd;

/// Per-run context: scratch space, the rootfs mount point and the cleanup
/// slot.
pub struct BuildContext {
    scratch_dir: PathBuf,
    mount_point: PathBuf,
    cleanup: Arc<CleanupState>,
}

impl BuildContext {
    /// Create the scratch and mount directories and an inert cleanup slot.
    pub fn new() -> Result<Self> {
        let scratch_dir = PathBuf::from(defaults::SCRATCH_DIR);
        let mount_point = PathBuf::from(defaults::ROOTFS_MOUNT);
        std::fs::create_dir_all(&scratch_dir)
            .with_context(|| format!("Failed to create {}", scratch_dir.display()))?;
        std::fs::create_dir_all(&mount_point)
            .with_context(|| format!("Failed to create {}", mount_point.display()))?;
        Ok(Self {
            cleanup: Arc::new(CleanupState::new(mount_point.clone())),
            scratch_dir,
            mount_point,
        })
    }

    /// Scratch directory for downloads, staging and nested mounts.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path of a file or directory inside the scratch directory.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch_dir.join(name)
    }

    /// Where the target rootfs partition is mounted.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Path of an entry inside the mounted target root.
    pub fn target_path(&self, relative: &str) -> PathBuf {
        self.mount_point.join(relative)
    }

    /// The cleanup slot shared with the interrupt guardian.
    pub fn cleanup_state(&self) -> Arc<CleanupState> {
        Arc::clone(&self.cleanup)
    }

    /// Run the shared teardown routine.
    pub fn teardown(&self) {
        self.cleanup.teardown();
    }
}

#[derive(Default)]
struct CleanupInner {
    target: Option<StorageTarget>,
    extra_mounts: Vec<PathBuf>,
    extra_loops: Vec<String>,
}

/// Everything teardown needs to leave the host clean, guarded by a mutex so
/// the signal task and the pipeline can share it.
pub struct CleanupState {
    mount_point: PathBuf,
    inner: Mutex<CleanupInner>,
}

impl CleanupState {
    fn new(mount_point: PathBuf) -> Self {
        Self {
            mount_point,
            inner: Mutex::new(CleanupInner::default()),
        }
    }

    /// Publish the active storage target.
    pub fn set_target(&self, target: StorageTarget) {
        self.lock().target = Some(target);
    }

    /// The active storage target, if one has been resolved yet.
    pub fn target(&self) -> Option<StorageTarget> {
        self.lock().target.clone()
    }

    /// Remember a scratch mount (ISO or nested image) for teardown.
    pub fn register_mount(&self, path: &Path) {
        self.lock().extra_mounts.push(path.to_path_buf());
    }

    /// Remember a scratch loop device for teardown.
    pub fn register_loop(&self, device: &str) {
        self.lock().extra_loops.push(device.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CleanupInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Best-effort teardown: kill stray helper daemons, then unmount the
    /// rootfs mount point, every partition of the active target and every
    /// registered scratch mount, then detach scratch loop devices. Every
    /// step suppresses its own errors, so running this twice is harmless.
    pub fn teardown(&self) {
        if kill_stray_gpg_agents() > 0 {
            // Give the agents a moment to drop their sockets inside the
            // chroot before the unmounts below.
            std::thread::sleep(Duration::from_secs(2));
        }

        blockdev::umount_lazy(&self.mount_point.to_string_lossy());

        let (target, extra_mounts, extra_loops) = {
            let inner = self.lock();
            (
                inner.target.clone(),
                inner.extra_mounts.clone(),
                inner.extra_loops.clone(),
            )
        };

        if let Some(target) = target {
            for index in 1..=3 {
                blockdev::umount_lazy(&target.partition(index));
            }
            blockdev::umount_lazy(&target.device);
        }

        for mount in extra_mounts {
            blockdev::umount_recursive(&mount);
        }
        for device in extra_loops {
            blockdev::detach_loop(&device);
        }
    }
}

/// Kill leftover pacman gpg-agent processes spawned inside the chroot; they
/// would otherwise keep the rootfs mount busy. Returns how many were killed.
fn kill_stray_gpg_agents() -> usize {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    let mut killed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(cmdline) = std::fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        let cmdline = String::from_utf8_lossy(&cmdline).replace('\0', " ");
        if cmdline.contains("gpg-agent") && cmdline.contains("/etc/pacman.d/gnupg") {
            tracing::info!("killing stray gpg-agent (pid {pid})");
            Cmd::new("kill").arg(pid.to_string()).run_best_effort();
            killed += 1;
        }
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::{StorageTarget, TargetKind};

    #[test]
    fn test_teardown_before_target_exists_is_a_safe_noop() {
        let dir = tempfile::tempdir().unwrap();
        let state = CleanupState::new(dir.path().to_path_buf());
        // An interrupt before target resolution finds the slot inert.
        state.teardown();
        assert!(state.target().is_none());
    }

    #[test]
    fn test_double_teardown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = CleanupState::new(dir.path().to_path_buf());
        state.set_target(StorageTarget {
            device: dir.path().join("loopdev").to_string_lossy().into_owned(),
            kind: TargetKind::Usb,
        });
        state.register_mount(&dir.path().join("iso-mount"));
        // Completion followed by a stray interrupt runs the routine twice;
        // neither invocation may error out.
        state.teardown();
        state.teardown();
    }
}
