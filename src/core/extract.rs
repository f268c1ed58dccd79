//! Rootfs extraction
//!
//! Unpacks a resolved tarball into the mounted target root, or copies an
//! already-unpacked tree while preserving permissions, ownership and
//! symlinks. Extraction never cleans up after itself on failure; teardown
//! owns the mounts and the partial state.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::{lchown, MetadataExt};
use std::path::Path;

use crate::core::context::BuildContext;
use crate::core::source::RootfsSource;
use crate::infra::process::Cmd;

/// Extract the resolved source into the mounted target root.
pub fn extract(ctx: &BuildContext, source: &RootfsSource) -> Result<()> {
    tracing::info!("extracting rootfs");
    match source {
        RootfsSource::Tarball {
            path,
            inner_root: None,
        } => untar(path, ctx.mount_point())?,
        RootfsSource::Tarball {
            path,
            inner_root: Some(subdir),
        } => {
            // The tree sits one level down inside the tarball; stage it in
            // scratch and copy the inner directory across.
            let staging = ctx.scratch_path("staging");
            fs::create_dir_all(&staging)?;
            untar(path, &staging)?;
            copy_tree(&staging.join(subdir), ctx.mount_point())?;
        }
        RootfsSource::Tree(path) => copy_tree(path, ctx.mount_point())?,
    }
    tracing::info!("rootfs extraction complete");
    Ok(())
}

/// Unpack a tarball (any compression tar understands) preserving
/// permissions.
pub fn untar(archive: &Path, dest: &Path) -> Result<()> {
    tracing::info!("unpacking {} to {}", archive.display(), dest.display());
    Cmd::new("tar")
        .arg("-xpf")
        .arg_path(archive)
        .arg("-C")
        .arg_path(dest)
        .run()
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(())
}

/// Recursively copy `src`'s contents into `dst`, preserving permissions,
/// ownership and symlinks. Special files (device nodes, fifos, sockets)
/// are skipped; the target system recreates those at boot.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let entries = fs::read_dir(src)
        .with_context(|| format!("Failed to read directory {}", src.display()))?;
    for entry in entries {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&from)
            .with_context(|| format!("Failed to stat {}", from.display()))?;
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            let link_target = fs::read_link(&from)?;
            if fs::symlink_metadata(&to).is_ok() {
                fs::remove_file(&to)?;
            }
            std::os::unix::fs::symlink(&link_target, &to)
                .with_context(|| format!("Failed to create symlink {}", to.display()))?;
            let _ = lchown(&to, Some(metadata.uid()), Some(metadata.gid()));
        } else if file_type.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree(&from, &to)?;
            fs::set_permissions(&to, metadata.permissions())?;
            let _ = lchown(&to, Some(metadata.uid()), Some(metadata.gid()));
        } else if file_type.is_file() {
            fs::copy(&from, &to)
                .with_context(|| format!("Failed to copy {}", from.display()))?;
            let _ = lchown(&to, Some(metadata.uid()), Some(metadata.gid()));
        } else {
            tracing::debug!("skipping special file {}", from.display());
        }
    }
    Ok(())
}
