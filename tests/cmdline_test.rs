//! Kernel command-line construction tests
//!
//! The command line must carry the resolved rootfs PARTUUID exactly once,
//! never the placeholder, the right security module per distro, and a
//! loglevel directive instead of the console directive in verbose mode.

use depthboot::core::kernel::build_cmdline;
use depthboot::core::options::Distro;
use proptest::prelude::*;

const PARTUUID: &str = "a3b09bf8-0e5c-4a6c-b473-f5c912ab09e2";

#[test]
fn cmdline_contains_partuuid_exactly_once() {
    for distro in [
        Distro::Arch,
        Distro::Ubuntu,
        Distro::PopOs,
        Distro::Fedora,
        Distro::Generic,
    ] {
        for verbose in [false, true] {
            let cmdline = build_cmdline(distro, verbose, PARTUUID);
            assert_eq!(
                cmdline.matches(PARTUUID).count(),
                1,
                "distro {distro}, verbose {verbose}"
            );
            assert!(!cmdline.contains("insert_partuuid"));
        }
    }
}

#[test]
fn cmdline_roots_on_partuuid() {
    let cmdline = build_cmdline(Distro::Arch, false, PARTUUID);
    assert!(cmdline.contains(&format!("root=PARTUUID={PARTUUID}")));
}

#[test]
fn apparmor_for_ubuntu_and_pop_os() {
    assert!(build_cmdline(Distro::Ubuntu, false, PARTUUID).contains("security=apparmor"));
    assert!(build_cmdline(Distro::PopOs, false, PARTUUID).contains("security=apparmor"));
}

#[test]
fn selinux_for_fedora_only() {
    assert!(build_cmdline(Distro::Fedora, false, PARTUUID).contains("security=selinux"));
    for distro in [Distro::Arch, Distro::Ubuntu, Distro::PopOs, Distro::Generic] {
        assert!(!build_cmdline(distro, false, PARTUUID).contains("security=selinux"));
    }
}

#[test]
fn verbose_swaps_console_for_loglevel() {
    let quiet = build_cmdline(Distro::Fedora, false, PARTUUID);
    let verbose = build_cmdline(Distro::Fedora, true, PARTUUID);
    assert!(quiet.contains("console="));
    assert!(!quiet.contains("loglevel="));
    assert!(verbose.contains("loglevel=15"));
    assert!(!verbose.contains("console="));
}

#[test]
fn verbose_substitution_is_idempotent() {
    let verbose = build_cmdline(Distro::Ubuntu, true, PARTUUID);
    assert_eq!(verbose.replace("console=", "loglevel=15"), verbose);
}

proptest! {
    /// Any plausible PARTUUID lands in the command line exactly once, with
    /// no placeholder left behind.
    #[test]
    fn prop_partuuid_substitution(uuid in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}") {
        let cmdline = build_cmdline(Distro::Arch, false, &uuid);
        prop_assert_eq!(cmdline.matches(uuid.as_str()).count(), 1);
        prop_assert!(!cmdline.contains("insert_partuuid"));
    }

    /// Verbose mode never leaves a console directive behind.
    #[test]
    fn prop_verbose_removes_console(uuid in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}") {
        let cmdline = build_cmdline(Distro::Fedora, true, &uuid);
        prop_assert!(!cmdline.contains("console="));
        prop_assert!(cmdline.contains("loglevel=15"));
    }
}
