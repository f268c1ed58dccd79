//! Rootfs download locations

/// Arch bootstrap tarball, always the latest snapshot
pub const ARCH_BOOTSTRAP_URL: &str =
    "https://geo.mirror.pkgbuild.com/iso/latest/archlinux-bootstrap-x86_64.tar.gz";

/// Versioned rootfs tarball published on the eupnea GitHub releases
pub fn eupnea_rootfs_url(distro: &str, version: &str) -> String {
    format!(
        "https://github.com/eupnea-linux/{distro}-rootfs/releases/latest/download/\
         {distro}-rootfs-{version}.tar.xz"
    )
}

/// Split pop-os rootfs parts, concatenated in lexical order before extraction
pub fn pop_os_split_urls(version: &str) -> Vec<(String, String)> {
    vec![(
        "pop-os-rootfs.split.aa".to_string(),
        format!(
            "https://github.com/eupnea-linux/pop-os-rootfs/releases/latest/download/\
             pop-os-rootfs-{version}.split.aa"
        ),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eupnea_url_contains_distro_and_version() {
        let url = eupnea_rootfs_url("fedora", "38");
        assert!(url.contains("fedora-rootfs"));
        assert!(url.ends_with("fedora-rootfs-38.tar.xz"));
    }

    #[test]
    fn test_pop_os_split_part_names_sort_lexically() {
        let parts = pop_os_split_urls("22.04");
        let mut names: Vec<_> = parts.iter().map(|(name, _)| name.clone()).collect();
        let sorted = {
            let mut s = names.clone();
            s.sort();
            s
        };
        names.sort();
        assert_eq!(names, sorted);
    }
}
