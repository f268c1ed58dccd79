//! Rootfs source resolution
//!
//! Obtains a local archive or directory tree for the selected distro:
//! a straight download for the single-archive distros, a concatenation of
//! split parts for pop-os, and a nested search through an installer ISO for
//! the generic path.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cli::output;
use crate::config::{defaults, urls};
use crate::core::context::BuildContext;
use crate::core::options::{BuildOptions, Distro};
use crate::infra::download::{DownloadManager, ProgressCallback};
use crate::infra::{blockdev, host};
use crate::infra::process::Cmd;

/// A resolved rootfs, ready for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootfsSource {
    /// A tarball; `inner_root` names a subdirectory holding the actual tree
    Tarball {
        path: PathBuf,
        inner_root: Option<String>,
    },
    /// An already-unpacked directory tree
    Tree(PathBuf),
}

/// Resolve the rootfs source for this run.
pub async fn resolve(ctx: &BuildContext, options: &BuildOptions) -> Result<RootfsSource> {
    match options.distro {
        Distro::Arch => {
            let path = fetch_archive(
                ctx,
                options,
                urls::ARCH_BOOTSTRAP_URL,
                "arch-rootfs.tar.gz",
            )
            .await?;
            // The bootstrap tarball nests the tree one level down.
            Ok(RootfsSource::Tarball {
                path,
                inner_root: Some("root.x86_64".to_string()),
            })
        }
        Distro::Ubuntu | Distro::Fedora => {
            let name = format!("{}-rootfs.tar.xz", options.distro.as_str());
            let url = urls::eupnea_rootfs_url(options.distro.as_str(), &options.distro_version);
            let path = fetch_archive(ctx, options, &url, &name).await?;
            Ok(RootfsSource::Tarball {
                path,
                inner_root: None,
            })
        }
        Distro::PopOs => resolve_pop_os(ctx, options).await,
        Distro::Generic => resolve_generic(ctx, options),
    }
}

/// Copy the archive from `--local-path` when present, otherwise download.
async fn fetch_archive(
    ctx: &BuildContext,
    options: &BuildOptions,
    url: &str,
    file_name: &str,
) -> Result<PathBuf> {
    let dest = ctx.scratch_path(file_name);

    if let Some(local) = &options.local_path {
        let local_archive = local.join("rootfs.tar.xz");
        if local_archive.is_file() {
            tracing::info!("copying local rootfs from {}", local_archive.display());
            std::fs::copy(&local_archive, &dest).with_context(|| {
                format!("Failed to copy {} to scratch", local_archive.display())
            })?;
            return Ok(dest);
        }
        tracing::warn!(
            "'rootfs.tar.xz' not found in {}; downloading instead",
            local.display()
        );
    }

    download(url, &dest).await?;
    Ok(dest)
}

async fn download(url: &str, dest: &Path) -> Result<()> {
    tracing::info!("downloading {url}");
    let bar = output::create_download_bar(0);
    let progress_bar = bar.clone();
    let progress: ProgressCallback = Box::new(move |downloaded, total| {
        if total > 0 {
            progress_bar.set_length(total);
        }
        progress_bar.set_position(downloaded);
    });

    let result = DownloadManager::new()
        .download(url, dest, Some(progress))
        .await;
    bar.finish_and_clear();

    result.context(
        "Couldn't download rootfs. Check your internet connection and try again. \
         If the error persists, report it with the distro and version in the issue title",
    )?;
    Ok(())
}

async fn resolve_pop_os(ctx: &BuildContext, options: &BuildOptions) -> Result<RootfsSource> {
    let combined = ctx.scratch_path("pop-os-rootfs.tar.xz");

    if let Some(local) = &options.local_path {
        let local_archive = local.join("rootfs.tar.xz");
        if local_archive.is_file() {
            tracing::info!("copying local rootfs from {}", local_archive.display());
            std::fs::copy(&local_archive, &combined)?;
            return Ok(RootfsSource::Tarball {
                path: combined,
                inner_root: None,
            });
        }
        tracing::warn!(
            "'rootfs.tar.xz' not found in {}; downloading instead",
            local.display()
        );
    }

    for (name, url) in urls::pop_os_split_urls(&options.distro_version) {
        download(&url, &ctx.scratch_path(&name)).await?;
    }

    tracing::info!("combining split pop-os rootfs, might take a while");
    concat_split_parts(ctx.scratch_dir(), "pop-os-rootfs.split.", &combined)?;
    Ok(RootfsSource::Tarball {
        path: combined,
        inner_root: None,
    })
}

/// Concatenate all files in `dir` whose names start with `prefix` into
/// `dest`, in lexical order.
pub fn concat_split_parts(dir: &Path, prefix: &str, dest: &Path) -> Result<()> {
    let mut parts: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    if parts.is_empty() {
        bail!("No split archive parts matching '{prefix}*' in {}", dir.display());
    }
    parts.sort();

    let mut out = std::fs::File::create(dest)?;
    for part in &parts {
        let mut input = std::fs::File::open(part)
            .with_context(|| format!("Failed to open {}", part.display()))?;
        std::io::copy(&mut input, &mut out)
            .with_context(|| format!("Failed to append {}", part.display()))?;
    }
    Ok(())
}

fn resolve_generic(ctx: &BuildContext, options: &BuildOptions) -> Result<RootfsSource> {
    if let Some(source) = discover_from_iso(ctx, options)? {
        return Ok(source);
    }
    manual_rootfs(options)
}

/// The generic path's last resort: a rootfs tree the user extracted
/// themselves.
fn manual_rootfs(options: &BuildOptions) -> Result<RootfsSource> {
    let path = options.rootfs_path.as_ref().context(
        "Could not locate a root filesystem automatically. Re-run with --rootfs-path \
         pointing at a manually extracted rootfs directory",
    )?;
    if !is_rootfs_tree(path) {
        bail!(
            "'{}' does not look like a rootfs: expected usr/ and bin/ at its top level",
            path.display()
        );
    }
    Ok(RootfsSource::Tree(path.clone()))
}

/// Search an installer ISO for a usable rootfs. `Ok(None)` means every
/// automated strategy came up empty and the manual fallback applies.
fn discover_from_iso(ctx: &BuildContext, options: &BuildOptions) -> Result<Option<RootfsSource>> {
    let Some(iso) = &options.iso_path else {
        return Ok(None);
    };
    if !iso.is_file() {
        bail!("'{}' does not exist or is not a file", iso.display());
    }
    if host::is_crostini() {
        tracing::warn!("crostini cannot loop-mount ISO files; use --rootfs-path instead");
        return Ok(None);
    }

    tracing::info!("mounting {}", iso.display());
    let iso_device = blockdev::attach_loop(iso, true)?;
    ctx.cleanup_state().register_loop(&iso_device);

    let index = blockdev::largest_partition(&iso_device)?;
    let iso_partition = format!("{iso_device}p{index}");
    let iso_mount = ctx.scratch_path("iso-mount");
    std::fs::create_dir_all(&iso_mount)?;
    tracing::info!("mounting biggest partition {iso_partition}");
    blockdev::mount(&iso_partition, &iso_mount, true)?;
    ctx.cleanup_state().register_mount(&iso_mount);

    tracing::info!("searching for squashfs");
    let Some(squashfs) = find_squashfs(&iso_mount) else {
        tracing::warn!("could not find a squashfs image inside {}", iso.display());
        return Ok(None);
    };
    tracing::info!("found {}", squashfs.display());

    let extract_dir = ctx.scratch_path("squashfs-extract");
    Cmd::new("unsquashfs")
        .arg("-d")
        .arg_path(&extract_dir)
        .arg_path(&squashfs)
        .run()
        .context("Failed to unpack squashfs")?;

    if is_rootfs_tree(&extract_dir) {
        tracing::info!("found rootfs in squashfs");
        return Ok(Some(RootfsSource::Tree(extract_dir)));
    }

    // Some ISOs wrap a raw disk image inside the squashfs instead of a tree.
    tracing::info!("searching for a disk image in the extracted squashfs");
    let Some(image) = find_disk_image(&extract_dir) else {
        tracing::warn!("could not find a rootfs image in the squashfs");
        return Ok(None);
    };
    tracing::info!("found {}", image.display());

    let image_device = blockdev::attach_loop(&image, false)?;
    ctx.cleanup_state().register_loop(&image_device);
    let image_mount = ctx.scratch_path("img-mount");
    std::fs::create_dir_all(&image_mount)?;
    blockdev::mount(&image_device, &image_mount, true)?;
    ctx.cleanup_state().register_mount(&image_mount);

    tracing::info!("searching for rootfs inside the image");
    match find_rootfs_tree(&image_mount) {
        Some(tree) => {
            tracing::info!("found rootfs at {}", tree.display());
            Ok(Some(RootfsSource::Tree(tree)))
        }
        None => {
            tracing::warn!("could not find a rootfs inside the image");
            Ok(None)
        }
    }
}

/// Depth-first search for the first directory containing one of the known
/// squashfs file names. Within a directory the candidates are checked in
/// priority order; the first hit ends the whole search.
pub fn find_squashfs(root: &Path) -> Option<PathBuf> {
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_dir() {
            continue;
        }
        for candidate in defaults::SQUASHFS_CANDIDATES {
            let path = entry.path().join(candidate);
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

/// First `.img` file anywhere under `root`.
pub fn find_disk_image(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "img")
        })
        .map(|entry| entry.into_path())
}

/// First directory under `root` (including `root` itself) that looks like a
/// rootfs.
pub fn find_rootfs_tree(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .find(|path| is_rootfs_tree(path))
}

/// A tree qualifies as a rootfs when both `usr/` and `bin/` exist at its
/// top level.
pub fn is_rootfs_tree(path: &Path) -> bool {
    path.join("usr").is_dir() && path.join("bin").exists()
}
