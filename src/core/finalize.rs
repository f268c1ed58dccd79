//! Finalization
//!
//! Unmounts everything, strips transient state, optionally shrinks the
//! image to its real content size and detaches the loop device. All
//! unmount sub-steps are best-effort so finalization after a partial run
//! still converges.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::config::defaults;
use crate::core::context::BuildContext;
use crate::core::options::BuildOptions;
use crate::core::target::StorageTarget;
use crate::infra::process::Cmd;
use crate::infra::{blockdev, host};

/// Transient subtrees removed from the finished rootfs to cut image size.
const TRANSIENT_DIRS: &[&str] = &[
    "tmp",
    "var/tmp",
    "var/cache",
    "proc",
    "run",
    "sys",
    "lost+found",
    "dev",
];

/// Tear the run down and finish the output artifact.
pub fn finalize(ctx: &BuildContext, options: &BuildOptions, target: &StorageTarget) -> Result<()> {
    tracing::info!("unmounting image/device");
    blockdev::umount_recursive(ctx.mount_point());
    clean_transient_dirs(ctx.mount_point());

    // Flush pending writes before the device goes away.
    Cmd::new("sync").run_best_effort();

    // Shared with the interrupt guardian; a second invocation is a no-op.
    ctx.teardown();

    let Some(backing) = target.backing_file() else {
        // Physical targets are left partitioned and bootable in place.
        return Ok(());
    };

    if host::is_crostini() {
        // The ChromeOS recovery utility only flashes .bin files, and
        // shrinking is broken under crostini anyway.
        let renamed = backing.with_extension("bin");
        fs::rename(backing, &renamed)
            .with_context(|| format!("Failed to rename {}", backing.display()))?;
        tracing::info!("image ready at {}", renamed.display());
    } else if !options.no_shrink {
        shrink_image(target, backing)?;
    }

    blockdev::detach_loop(&target.device);
    Ok(())
}

fn clean_transient_dirs(mount: &Path) {
    for dir in TRANSIENT_DIRS {
        let path = mount.join(dir);
        if let Err(e) = fs::remove_dir_all(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("could not remove {}: {e}", path.display());
            }
        }
    }
}

/// Shrink the rootfs to its minimum size and truncate the backing file to
/// rootfs + kernel partitions + boot margin.
fn shrink_image(target: &StorageTarget, backing: &Path) -> Result<()> {
    tracing::info!("shrinking image");
    let rootfs = target.partition(3);

    // e2fsck -p exits 1 after fixing problems; only codes above 2 mean the
    // filesystem is actually damaged.
    let fsck = Cmd::new("e2fsck").args(["-fpv", &rootfs]).run_check()?;
    if fsck.code() > 2 {
        bail!(
            "e2fsck reported unfixable errors on {rootfs}: {}",
            fsck.stderr_trimmed()
        );
    }

    Cmd::new("resize2fs")
        .args(["-f", "-M", &rootfs])
        .run()
        .with_context(|| format!("Failed to shrink {rootfs}"))?;

    let blocks = blockdev::block_count(&rootfs)?;
    let final_size = final_image_bytes(blocks, kernel_partitions_bytes(target));
    tracing::info!("truncating {} to {final_size} bytes", backing.display());
    fs::OpenOptions::new()
        .write(true)
        .open(backing)
        .and_then(|file| file.set_len(final_size))
        .with_context(|| format!("Failed to truncate {}", backing.display()))?;
    Ok(())
}

/// Combined size of the two kernel partitions, read back from the partition
/// table so layout changes cannot drift silently; falls back to the fixed
/// constant when the table cannot be read.
fn kernel_partitions_bytes(target: &StorageTarget) -> u64 {
    let mut total = 0;
    for index in [1, 2] {
        match blockdev::device_size_bytes(&target.partition(index)) {
            Ok(size) => total += size,
            Err(e) => {
                tracing::debug!("using fixed kernel partition size: {e:#}");
                return defaults::KERNEL_PARTITIONS_FALLBACK_BYTES;
            }
        }
    }
    total
}

/// Final image size: the shrunk rootfs, the kernel partitions and a margin
/// so the kernel can still boot.
pub fn final_image_bytes(block_count: u64, kernel_partitions: u64) -> u64 {
    block_count * defaults::EXT4_BLOCK_SIZE + kernel_partitions + defaults::BOOT_MARGIN_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_image_bytes_arithmetic() {
        // 524288 blocks of 4 KiB = 2 GiB of rootfs.
        let size = final_image_bytes(524_288, defaults::KERNEL_PARTITIONS_FALLBACK_BYTES);
        assert_eq!(
            size,
            524_288 * 4096 + 134_217_728 + 20_971_520
        );
    }

    #[test]
    fn test_final_image_bytes_grows_with_block_count() {
        let small = final_image_bytes(1000, 0);
        let large = final_image_bytes(2000, 0);
        assert_eq!(large - small, 1000 * defaults::EXT4_BLOCK_SIZE);
    }
}
