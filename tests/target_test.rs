//! Storage target naming tests
//!
//! Partition paths must carry the `p` infix for loop and MMC targets and
//! never for USB targets; device name normalization mirrors what the
//! interactive front end may hand over.

use depthboot::core::target::{normalize_device_name, StorageTarget, TargetKind};
use std::path::PathBuf;

#[test]
fn loop_target_partitions_have_infix() {
    let target = StorageTarget {
        device: "/dev/loop7".to_string(),
        kind: TargetKind::LoopImage {
            backing: PathBuf::from("depthboot.img"),
        },
    };
    for index in 1..=3 {
        let partition = target.partition(index);
        assert_eq!(partition, format!("/dev/loop7p{index}"));
    }
}

#[test]
fn mmc_target_partitions_have_infix() {
    let target = StorageTarget {
        device: "/dev/mmcblk0".to_string(),
        kind: TargetKind::Mmc,
    };
    assert!(!target.is_usb());
    assert_eq!(target.partition(3), "/dev/mmcblk0p3");
}

#[test]
fn usb_target_partitions_have_no_infix() {
    let target = StorageTarget {
        device: "/dev/sdb".to_string(),
        kind: TargetKind::Usb,
    };
    assert!(target.is_usb());
    assert_eq!(target.partition(1), "/dev/sdb1");
    assert_eq!(target.partition(2), "/dev/sdb2");
    assert_eq!(target.partition(3), "/dev/sdb3");
}

#[test]
fn normalization_strips_trailing_junk() {
    assert_eq!(normalize_device_name("sdb1"), "/dev/sdb");
    assert_eq!(normalize_device_name("sdb2"), "/dev/sdb");
    assert_eq!(normalize_device_name("sdb/"), "/dev/sdb");
    assert_eq!(normalize_device_name("/dev/sdb1"), "/dev/sdb");
}

#[test]
fn normalization_adds_dev_prefix_once() {
    assert_eq!(normalize_device_name("sdb"), "/dev/sdb");
    assert_eq!(normalize_device_name("/dev/sdb"), "/dev/sdb");
}

#[test]
fn normalization_preserves_mmc_device_numbers() {
    assert_eq!(normalize_device_name("mmcblk0"), "/dev/mmcblk0");
    assert_eq!(normalize_device_name("/dev/mmcblk0"), "/dev/mmcblk0");
}

#[test]
fn backing_file_reported_for_images_only() {
    let image = StorageTarget {
        device: "/dev/loop0".to_string(),
        kind: TargetKind::LoopImage {
            backing: PathBuf::from("depthboot.img"),
        },
    };
    assert_eq!(image.backing_file(), Some(PathBuf::from("depthboot.img").as_path()));

    let usb = StorageTarget {
        device: "/dev/sdb".to_string(),
        kind: TargetKind::Usb,
    };
    assert_eq!(usb.backing_file(), None);
}
