//! Build options
//!
//! The immutable input record for one provisioning run. The interactive
//! front end (or a script) collects these; the pipeline only validates and
//! consumes them.

use clap::ValueEnum;
use regex::Regex;
use std::path::PathBuf;

use crate::error::OptionError;

/// Supported distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distro {
    /// Arch Linux, bootstrap tarball
    Arch,
    /// Ubuntu, eupnea rootfs tarball
    Ubuntu,
    /// Pop!_OS, split eupnea rootfs tarball
    #[value(name = "pop-os")]
    PopOs,
    /// Fedora, eupnea rootfs tarball
    Fedora,
    /// Any other distro, extracted from an installer ISO
    Generic,
}

impl Distro {
    /// Canonical lowercase name, as used in URLs and the settings record.
    pub fn as_str(self) -> &'static str {
        match self {
            Distro::Arch => "arch",
            Distro::Ubuntu => "ubuntu",
            Distro::PopOs => "pop-os",
            Distro::Fedora => "fedora",
            Distro::Generic => "generic",
        }
    }

    /// Kernel security module the distro expects on its command line.
    pub fn security_module(self) -> Option<&'static str> {
        match self {
            Distro::Ubuntu | Distro::PopOs => Some("apparmor"),
            Distro::Fedora => Some("selinux"),
            Distro::Arch | Distro::Generic => None,
        }
    }
}

impl std::fmt::Display for Distro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kernel flavor installed into the rootfs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KernelVariant {
    /// ChromeOS-derived kernel
    Chromeos,
    /// Mainline kernel
    Mainline,
}

impl KernelVariant {
    /// Suffix of the installed kernel image name.
    pub fn as_str(self) -> &'static str {
        match self {
            KernelVariant::Chromeos => "chromeos",
            KernelVariant::Mainline => "mainline",
        }
    }
}

impl std::fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the provisioned system ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// A `depthboot.img` file of the given size, attached to a loop device
    Image { size_gib: u64 },
    /// A physical block device (USB stick or SD card)
    Device(String),
}

impl TargetSelector {
    /// Whether this run writes directly to a physical device.
    pub fn is_device(&self) -> bool {
        matches!(self, TargetSelector::Device(_))
    }
}

/// Options for one provisioning run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub distro: Distro,
    pub distro_version: String,
    pub desktop_environment: String,
    pub shell: String,
    pub username: String,
    pub password: String,
    pub target: TargetSelector,
    pub kernel_variant: KernelVariant,
    pub verbose_kernel: bool,
    /// Verbose build output, forwarded to the distro configurator
    pub verbose: bool,
    /// Directory holding a pre-downloaded rootfs and optionally a kernel
    pub local_path: Option<PathBuf>,
    /// Installer ISO for the generic path
    pub iso_path: Option<PathBuf>,
    /// Manually extracted rootfs tree, the generic path's last resort
    pub rootfs_path: Option<PathBuf>,
    pub no_shrink: bool,
}

impl BuildOptions {
    /// Validate the fields that later stages bake into the target system.
    pub fn validate(&self) -> Result<(), OptionError> {
        let username_re = Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex");
        if !username_re.is_match(&self.username) {
            return Err(OptionError::InvalidUsername {
                name: self.username.clone(),
            });
        }
        if self.password.is_empty() {
            return Err(OptionError::EmptyPassword);
        }
        if let TargetSelector::Image { size_gib } = self.target {
            // The fixed layout alone takes 129 MiB; anything under a GiB
            // leaves no room for a rootfs.
            if size_gib < 1 {
                return Err(OptionError::ImageTooSmall {
                    size: size_gib,
                    min: 1,
                });
            }
        }
        Ok(())
    }

    /// Install type recorded in the settings file.
    pub fn install_type(&self) -> &'static str {
        if self.target.is_device() {
            "direct"
        } else {
            "image"
        }
    }
}
