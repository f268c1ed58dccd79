//! Settings record tests
//!
//! `/etc/eupnea.json` is a flat JSON object with fixed field names; the
//! first-boot tooling inside the produced system depends on the exact
//! shape.

use depthboot::core::chroot::SettingsRecord;
use depthboot::core::options::{BuildOptions, Distro, KernelVariant, TargetSelector};

fn options(target: TargetSelector) -> BuildOptions {
    BuildOptions {
        distro: Distro::Fedora,
        distro_version: "38".to_string(),
        desktop_environment: "kde".to_string(),
        shell: "fish".to_string(),
        username: "localuser".to_string(),
        password: "secret".to_string(),
        target,
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
fn settings_json_field_names_are_stable() {
    let record = SettingsRecord::from_options(&options(TargetSelector::Image { size_gib: 8 }));
    let value: serde_json::Value = serde_json::to_value(&record).unwrap();
    let object = value.as_object().unwrap();

    for field in [
        "distro_name",
        "distro_version",
        "de_name",
        "shell",
        "install_type",
    ] {
        assert!(object.contains_key(field), "missing field {field}");
    }
    assert_eq!(object.len(), 5);
}

#[test]
fn image_target_records_image_install_type() {
    let record = SettingsRecord::from_options(&options(TargetSelector::Image { size_gib: 8 }));
    assert_eq!(record.install_type, "image");
}

#[test]
fn device_target_records_direct_install_type() {
    let record = SettingsRecord::from_options(&options(TargetSelector::Device(
        "/dev/sdb".to_string(),
    )));
    assert_eq!(record.install_type, "direct");
}

#[test]
fn settings_round_trip() {
    let record = SettingsRecord::from_options(&options(TargetSelector::Image { size_gib: 8 }));
    let json = serde_json::to_string(&record).unwrap();
    let parsed: SettingsRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
    assert_eq!(parsed.distro_name, "fedora");
    assert_eq!(parsed.de_name, "kde");
}
