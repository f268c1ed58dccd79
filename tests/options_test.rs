//! Build option validation tests

use depthboot::core::options::{BuildOptions, Distro, KernelVariant, TargetSelector};
use depthboot::error::OptionError;
use proptest::prelude::*;

fn options() -> BuildOptions {
    BuildOptions {
        distro: Distro::Arch,
        distro_version: "latest".to_string(),
        desktop_environment: "cli".to_string(),
        shell: "bash".to_string(),
        username: "localuser".to_string(),
        password: "secret".to_string(),
        target: TargetSelector::Image { size_gib: 8 },
        kernel_variant: KernelVariant::Chromeos,
        verbose_kernel: false,
        verbose: false,
        local_path: None,
        iso_path: None,
        rootfs_path: None,
        no_shrink: false,
    }
}

#[test]
fn default_record_validates() {
    assert!(options().validate().is_ok());
}

#[test]
fn shell_metacharacters_in_username_rejected() {
    for bad in ["a b", "a;b", "a|b", "a'b", "a\"b", "a$(x)", "käse"] {
        let mut opts = options();
        opts.username = bad.to_string();
        assert!(
            matches!(opts.validate(), Err(OptionError::InvalidUsername { .. })),
            "expected rejection of {bad:?}"
        );
    }
}

#[test]
fn empty_password_rejected() {
    let mut opts = options();
    opts.password = String::new();
    assert!(matches!(opts.validate(), Err(OptionError::EmptyPassword)));
}

#[test]
fn zero_size_image_rejected() {
    let mut opts = options();
    opts.target = TargetSelector::Image { size_gib: 0 };
    assert!(matches!(
        opts.validate(),
        Err(OptionError::ImageTooSmall { .. })
    ));
}

#[test]
fn device_target_skips_size_check() {
    let mut opts = options();
    opts.target = TargetSelector::Device("/dev/sdb".to_string());
    assert!(opts.validate().is_ok());
}

proptest! {
    /// Usernames drawn from the allowed alphabet always validate.
    #[test]
    fn prop_allowed_usernames_validate(name in "[A-Za-z0-9._-]{1,32}") {
        let mut opts = options();
        opts.username = name;
        prop_assert!(opts.validate().is_ok());
    }
}
