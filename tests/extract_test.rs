//! Rootfs tree copy tests
//!
//! Tree sources (unpacked generic rootfs) are copied recursively while
//! preserving permissions and symlinks.

mod common;

use common::TestTree;
use depthboot::core::extract::copy_tree;
use std::fs;
use std::os::unix::fs::PermissionsExt;

#[test]
fn copies_nested_files_and_directories() {
    let src = TestTree::new();
    src.write("etc/os-release", b"NAME=test\n");
    src.write("usr/share/doc/README", b"docs");
    src.mkdir("var/empty");

    let dst = TestTree::new();
    copy_tree(src.path(), dst.path()).unwrap();

    assert_eq!(
        fs::read(dst.path().join("etc/os-release")).unwrap(),
        b"NAME=test\n"
    );
    assert_eq!(
        fs::read(dst.path().join("usr/share/doc/README")).unwrap(),
        b"docs"
    );
    assert!(dst.path().join("var/empty").is_dir());
}

#[test]
fn preserves_file_permissions() {
    let src = TestTree::new();
    let script = src.write("usr/bin/tool", b"#!/bin/sh\n");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let dst = TestTree::new();
    copy_tree(src.path(), dst.path()).unwrap();

    let mode = fs::metadata(dst.path().join("usr/bin/tool"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn preserves_symlinks_as_symlinks() {
    let src = TestTree::new();
    src.mkdir("usr/bin");
    src.write("usr/bin/sh", b"shell");
    std::os::unix::fs::symlink("usr/bin", src.path().join("bin")).unwrap();

    let dst = TestTree::new();
    copy_tree(src.path(), dst.path()).unwrap();

    let link = dst.path().join("bin");
    let metadata = fs::symlink_metadata(&link).unwrap();
    assert!(metadata.file_type().is_symlink());
    assert_eq!(
        fs::read_link(&link).unwrap(),
        std::path::PathBuf::from("usr/bin")
    );
    // The link resolves inside the copied tree.
    assert!(link.join("sh").exists());
}

#[test]
fn preserves_dangling_symlinks() {
    let src = TestTree::new();
    std::os::unix::fs::symlink("/nonexistent/target", src.path().join("broken")).unwrap();

    let dst = TestTree::new();
    copy_tree(src.path(), dst.path()).unwrap();

    let link = dst.path().join("broken");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(
        fs::read_link(&link).unwrap(),
        std::path::PathBuf::from("/nonexistent/target")
    );
}

#[test]
fn overwrites_existing_symlink_at_destination() {
    let src = TestTree::new();
    std::os::unix::fs::symlink("new-target", src.path().join("link")).unwrap();

    let dst = TestTree::new();
    std::os::unix::fs::symlink("old-target", dst.path().join("link")).unwrap();

    copy_tree(src.path(), dst.path()).unwrap();
    assert_eq!(
        fs::read_link(dst.path().join("link")).unwrap(),
        std::path::PathBuf::from("new-target")
    );
}

#[test]
fn copies_into_partially_populated_destination() {
    let src = TestTree::new();
    src.write("etc/fstab", b"src");

    let dst = TestTree::new();
    dst.write("etc/hostname", b"keep");

    copy_tree(src.path(), dst.path()).unwrap();
    assert_eq!(fs::read(dst.path().join("etc/fstab")).unwrap(), b"src");
    assert_eq!(fs::read(dst.path().join("etc/hostname")).unwrap(), b"keep");
}
