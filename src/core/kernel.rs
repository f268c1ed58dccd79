//! Kernel signing and flashing
//!
//! Builds the kernel command line around the rootfs PARTUUID, signs the
//! kernel with the platform devkeys and writes the one signed image to both
//! kernel partitions: the firmware falls back to the second copy when the
//! first fails to boot.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::context::BuildContext;
use crate::core::extract::untar;
use crate::core::options::{BuildOptions, Distro};
use crate::core::target::StorageTarget;
use crate::infra::blockdev;
use crate::infra::process::{chroot_cmd, Cmd};

const SELINUX_MOUNTS: &str = include_str!("../../assets/selinux/mounts");
const SELINUX_MOUNTINFO: &str = include_str!("../../assets/selinux/mountinfo");
const SELINUX_UNLABELED: &str = include_str!("../../assets/selinux/unlabeled");
const SELINUX_FIXFILES: &str = include_str!("../../assets/selinux/fixfiles");

/// Sign the kernel and flash it to both kernel partitions.
pub fn flash_kernel(
    ctx: &BuildContext,
    options: &BuildOptions,
    target: &StorageTarget,
) -> Result<()> {
    let kernel_image = resolve_kernel_image(ctx, options)?;

    let rootfs_partition = target.partition(3);
    let partuuid = blockdev::partuuid(&rootfs_partition)?;
    tracing::info!("rootfs partition UUID: {partuuid}");

    let cmdline = build_cmdline(options.distro, options.verbose_kernel, &partuuid);
    let flags_file = ctx.scratch_path("kernel.flags");
    fs::write(&flags_file, &cmdline)
        .with_context(|| format!("Failed to write {}", flags_file.display()))?;

    let signed = ctx.scratch_path("bzImage.signed");
    sign_kernel(&kernel_image, &flags_file, &signed)?;

    tracing::info!("flashing kernel to device/image");
    for index in [1, 2] {
        let partition = target.partition(index);
        Cmd::new("dd")
            .arg(format!("if={}", signed.display()))
            .arg(format!("of={partition}"))
            .run()
            .with_context(|| format!("Failed to write the signed kernel to {partition}"))?;
    }

    if options.distro == Distro::Fedora {
        relabel_selinux(ctx)?;
    }
    Ok(())
}

/// A local kernel (image + modules) wins over the one the distro package
/// installed into the chroot's /boot.
fn resolve_kernel_image(ctx: &BuildContext, options: &BuildOptions) -> Result<PathBuf> {
    if let Some(local) = &options.local_path {
        let modules = local.join("modules.tar.xz");
        let image = local.join("bzImage");
        // Without matching modules a local kernel image will not boot.
        if modules.is_file() && image.is_file() {
            tracing::info!("extracting local kernel modules into the rootfs");
            let modules_dir = ctx.target_path("lib/modules");
            fs::create_dir_all(&modules_dir)?;
            untar(&modules, &modules_dir)?;

            let headers = local.join("headers.tar.xz");
            if headers.is_file() {
                tracing::info!("extracting local kernel headers");
                let src_dir = ctx.target_path("usr/src");
                fs::create_dir_all(&src_dir)?;
                untar(&headers, &src_dir)?;
            }
            return Ok(image);
        }
    }
    Ok(ctx.target_path(&format!(
        "boot/vmlinuz-eupnea-{}",
        options.kernel_variant.as_str()
    )))
}

/// Build the kernel command line: PARTUUID substituted, security module
/// appended per distro, console directive switched to a loud loglevel in
/// verbose mode.
pub fn build_cmdline(distro: Distro, verbose: bool, partuuid: &str) -> String {
    let mut cmdline = defaults::CMDLINE_TEMPLATE.to_string();
    if let Some(module) = distro.security_module() {
        cmdline.push_str(&format!(" security={module}"));
    }
    if verbose {
        cmdline = cmdline.replace("console=", "loglevel=15");
    }
    cmdline.replace(defaults::PARTUUID_PLACEHOLDER, partuuid)
}

fn sign_kernel(kernel: &Path, flags: &Path, dest: &Path) -> Result<()> {
    tracing::info!("signing {}", kernel.display());
    Cmd::new("futility")
        .args(["vbutil_kernel", "--arch", "x86_64", "--version", "1"])
        .args(["--keyblock", defaults::VBOOT_KEYBLOCK])
        .args(["--signprivate", defaults::VBOOT_PRIVATE_KEY])
        .arg("--bootloader")
        .arg_path(flags)
        .arg("--config")
        .arg_path(flags)
        .arg("--vmlinuz")
        .arg_path(kernel)
        .arg("--pack")
        .arg_path(dest)
        .run()
        .context("Kernel signing failed")?;
    Ok(())
}

/// Fedora requires a full relabel pass, or SELinux denies logins on first
/// boot. fixfiles needs specific proc-state files, which have to be static
/// substitutes rather than the live /proc mount.
fn relabel_selinux(ctx: &BuildContext) -> Result<()> {
    tracing::info!("relabeling files for SELinux");
    let mount = ctx.mount_point();

    blockdev::umount_recursive(&mount.join("proc"));

    let proc_self = mount.join("proc/self");
    fs::create_dir_all(&proc_self)?;
    fs::write(proc_self.join("mounts"), SELINUX_MOUNTS)?;
    fs::write(proc_self.join("mountinfo"), SELINUX_MOUNTINFO)?;

    let contexts = mount.join("sys/fs/selinux/initial_contexts");
    fs::create_dir_all(&contexts)?;
    fs::write(contexts.join("unlabeled"), SELINUX_UNLABELED)?;

    // Swap in the patched fixfiles for the duration of the relabel.
    let fixfiles = mount.join("usr/sbin/fixfiles");
    let backup = mount.join("usr/sbin/fixfiles.bak");
    fs::copy(&fixfiles, &backup)
        .with_context(|| format!("fixfiles not found at {}", fixfiles.display()))?;
    fs::write(&fixfiles, SELINUX_FIXFILES)?;
    fs::set_permissions(&fixfiles, fs::Permissions::from_mode(0o755))?;

    let relabel = chroot_cmd(mount, "/sbin/fixfiles -T 0 restore").run();

    fs::copy(&backup, &fixfiles)?;
    fs::remove_file(&backup)?;

    relabel.map(|_| ()).context("SELinux relabel failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTUUID: &str = "f1f7bd8e-72b0-4b4e-92f5-c665a1df06a1";

    #[test]
    fn test_cmdline_contains_partuuid_once() {
        let cmdline = build_cmdline(Distro::Arch, false, PARTUUID);
        assert_eq!(cmdline.matches(PARTUUID).count(), 1);
        assert!(!cmdline.contains(defaults::PARTUUID_PLACEHOLDER));
    }

    #[test]
    fn test_cmdline_security_module() {
        assert!(build_cmdline(Distro::Ubuntu, false, PARTUUID).contains("security=apparmor"));
        assert!(build_cmdline(Distro::Fedora, false, PARTUUID).contains("security=selinux"));
        assert!(!build_cmdline(Distro::Arch, false, PARTUUID).contains("security="));
    }

    #[test]
    fn test_verbose_replaces_console_with_loglevel() {
        let cmdline = build_cmdline(Distro::Arch, true, PARTUUID);
        assert!(cmdline.contains("loglevel=15"));
        assert!(!cmdline.contains("console="));
    }

    #[test]
    fn test_verbose_substitution_is_idempotent() {
        let cmdline = build_cmdline(Distro::Arch, true, PARTUUID);
        // Re-applying the substitution to an already-verbose string changes
        // nothing.
        assert_eq!(cmdline.replace("console=", "loglevel=15"), cmdline);
    }
}
