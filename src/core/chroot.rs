//! Distro-agnostic chroot configuration
//!
//! Prepares the extracted root for the distro configurator and for first
//! boot: networking stub, virtual filesystem mounts, settings record,
//! hardware quirks, user account and timezone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::context::BuildContext;
use crate::core::options::{BuildOptions, Distro};
use crate::infra::blockdev;
use crate::infra::process::chroot_cmd;

const SENSOR_HWDB: &str = include_str!("../../assets/61-sensor.hwdb");

/// Settings record written to `/etc/eupnea.json`, read by first-boot
/// tooling inside the produced system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub distro_name: String,
    pub distro_version: String,
    pub de_name: String,
    pub shell: String,
    pub install_type: String,
}

impl SettingsRecord {
    pub fn from_options(options: &BuildOptions) -> Self {
        Self {
            distro_name: options.distro.as_str().to_string(),
            distro_version: options.distro_version.clone(),
            de_name: options.desktop_environment.clone(),
            shell: options.shell.clone(),
            install_type: options.install_type().to_string(),
        }
    }
}

/// Apply all distro-agnostic configuration to the mounted root.
pub fn configure_common(ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
    tracing::info!("applying distro agnostic configuration");

    // The generic path has no networking assumptions and no eupnea tooling
    // inside the target; only the account and timezone steps apply to it.
    if options.distro != Distro::Generic {
        setup_chroot_mounts(ctx)?;
        write_settings(ctx, options)?;
        install_sensor_hwdb(ctx)?;
        clear_stock_boot(ctx)?;
    }

    if options.distro == Distro::Fedora {
        // systemd-resolved creates the /etc/resolv.conf link at first boot;
        // NetworkManager covers this on the other distros.
        tracing::info!("enabling systemd-resolved service");
        chroot_cmd(ctx.mount_point(), "systemctl enable systemd-resolved")
            .run()
            .context("Failed to enable systemd-resolved")?;
    }

    configure_user(ctx, options)?;
    copy_host_timezone(ctx);

    tracing::info!("distro agnostic configuration complete");
    Ok(())
}

/// Enable the first-boot postinstall service. Not present on generic
/// installs.
pub fn enable_postinstall(ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
    if options.distro == Distro::Generic {
        return Ok(());
    }
    tracing::info!("enabling postinstall service");
    chroot_cmd(ctx.mount_point(), "systemctl enable eupnea-postinstall.service")
        .run()
        .context("Failed to enable the postinstall service")?;
    Ok(())
}

fn setup_chroot_mounts(ctx: &BuildContext) -> Result<()> {
    let mount = ctx.mount_point();

    // systemd has not run inside the target yet, so the resolved stub
    // directory does not exist; create it and bind the host resolver over
    // it to give the chroot working DNS.
    let resolve_dir = mount.join("run/systemd/resolve");
    fs::create_dir_all(&resolve_dir)?;
    fs::write(resolve_dir.join("stub-resolv.conf"), "")?;
    blockdev::bind_mount(Path::new("/etc/resolv.conf"), &mount.join("etc/resolv.conf"))?;

    // systemd tools inside the chroot want /proc mounted.
    blockdev::mount_proc(&mount.join("proc"))?;

    // pacman wants /dev/fd.
    let dev_fd = mount.join("dev/fd");
    if fs::symlink_metadata(&dev_fd).is_err() {
        std::os::unix::fs::symlink("/proc/self/fd", &dev_fd)
            .context("Failed to link dev/fd")?;
    }

    // apt writes its logs through a pty.
    let pts = mount.join("dev/pts");
    fs::create_dir_all(&pts)?;
    blockdev::mount_devpts(&pts)?;

    Ok(())
}

fn write_settings(ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
    let settings = SettingsRecord::from_options(options);
    let path = ctx.target_path("etc/eupnea.json");
    fs::write(&path, serde_json::to_string(&settings)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Install the hwdb fragment that fixes flipped auto-rotation on some
/// devices, then refresh the hardware database.
fn install_sensor_hwdb(ctx: &BuildContext) -> Result<()> {
    tracing::info!("fixing screen rotation");
    let dest = ctx.target_path("etc/udev/hwdb.d/61-sensor.hwdb");
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, SENSOR_HWDB)?;
    chroot_cmd(ctx.mount_point(), "systemd-hwdb update")
        .run()
        .context("Failed to update the hardware database")?;
    Ok(())
}

/// Remove stock kernels: the signed kernel lives in the partition table,
/// not in /boot.
fn clear_stock_boot(ctx: &BuildContext) -> Result<()> {
    tracing::info!("cleaning /boot");
    let boot = ctx.target_path("boot");
    match fs::remove_dir_all(&boot) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to clean {}", boot.display())),
    }
}

fn configure_user(ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
    tracing::info!("configuring user {}", options.username);
    let mount = ctx.mount_point();

    chroot_cmd(
        mount,
        &format!(
            "useradd --create-home --shell /bin/{} {}",
            options.shell, options.username
        ),
    )
    .run()
    .context("Failed to create the user account")?;

    // chpasswd reads "user:password" from stdin, so the password never
    // appears in a command line.
    chroot_cmd(mount, "chpasswd")
        .stdin(format!("{}:{}\n", options.username, options.password))
        .run()
        .context("Failed to set the user password")?;

    let group_file = fs::read_to_string(mount.join("etc/group")).unwrap_or_default();
    for group in privilege_groups(&group_file) {
        chroot_cmd(mount, &format!("usermod -aG {group} {}", options.username))
            .run()
            .with_context(|| format!("Failed to add the user to '{group}'"))?;
    }

    Ok(())
}

/// Privilege groups that actually exist in the chroot's group database.
/// Which of sudo/wheel/doas is present differs per distro, so the group
/// file is scanned rather than assumed.
pub fn privilege_groups(group_file: &str) -> Vec<&str> {
    group_file
        .lines()
        .filter_map(|line| line.split(':').next())
        .filter(|name| matches!(*name, "sudo" | "wheel" | "doas"))
        .collect()
}

/// Recreate the host's timezone link inside the chroot. Hosts without a
/// configured timezone (Crouton) are skipped quietly.
fn copy_host_timezone(ctx: &BuildContext) {
    let Ok(zone) = fs::read_link("/etc/localtime") else {
        tracing::debug!("host has no /etc/localtime link; skipping timezone");
        return;
    };
    let dest = ctx.target_path("etc/localtime");
    let _ = fs::remove_file(&dest);
    if let Err(e) = std::os::unix::fs::symlink(&zone, &dest) {
        tracing::debug!("could not set the target timezone: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_groups_picks_existing_entries() {
        let group_file = "root:x:0:\n\
                          wheel:x:10:\n\
                          users:x:100:\n\
                          sudo:x:27:\n";
        assert_eq!(privilege_groups(group_file), vec!["wheel", "sudo"]);
    }

    #[test]
    fn test_privilege_groups_empty_when_none_exist() {
        let group_file = "root:x:0:\nusers:x:100:\n";
        assert!(privilege_groups(group_file).is_empty());
    }

    #[test]
    fn test_privilege_groups_ignores_substring_matches() {
        let group_file = "sudoers:x:50:\nnowheel:x:51:\ndoas:x:52:\n";
        assert_eq!(privilege_groups(group_file), vec!["doas"]);
    }
}
