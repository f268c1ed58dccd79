//! Default configuration values and layout constants

/// Mount point for the target root filesystem
pub const ROOTFS_MOUNT: &str = "/mnt/depthboot";

/// Scratch directory for downloads, staging and nested mounts
pub const SCRATCH_DIR: &str = "/tmp/depthboot-build";

/// Output image file name
pub const IMAGE_NAME: &str = "depthboot.img";

/// Output image file name under crostini, whose flashing utility wants .bin
pub const IMAGE_NAME_CROSTINI: &str = "depthboot.bin";

/// Primary kernel partition boundaries (MiB)
pub const KERNEL_A_START_MIB: u64 = 1;
pub const KERNEL_A_END_MIB: u64 = 65;

/// Backup kernel partition boundaries (MiB)
pub const KERNEL_B_START_MIB: u64 = 65;
pub const KERNEL_B_END_MIB: u64 = 129;

/// Start of the rootfs partition (MiB); it extends to the end of the device
pub const ROOTFS_START_MIB: u64 = 129;

/// ChromeOS GPT attributes for the kernel partitions
pub const KERNEL_A_PRIORITY: u32 = 15;
pub const KERNEL_B_PRIORITY: u32 = 1;
pub const KERNEL_TRIES: u32 = 5;

/// Kernel command-line template; the placeholder is substituted with the
/// rootfs PARTUUID once the partition table exists
pub const CMDLINE_TEMPLATE: &str = "console= root=PARTUUID=insert_partuuid i915.modeset=1 \
                                    rootwait rw fbcon=logo-pos:center,logo-count:1";

/// PARTUUID placeholder inside [`CMDLINE_TEMPLATE`]
pub const PARTUUID_PLACEHOLDER: &str = "insert_partuuid";

/// Candidate squashfs file names inside installer ISOs, in priority order
pub const SQUASHFS_CANDIDATES: &[&str] = &[
    "squashfs.img",
    "filesystem.squashfs",
    "rootfs.sfs",
    "image.squashfs",
];

/// Verified-boot developer key pair shipped by the vboot reference tools
pub const VBOOT_KEYBLOCK: &str = "/usr/share/vboot/devkeys/kernel.keyblock";
pub const VBOOT_PRIVATE_KEY: &str = "/usr/share/vboot/devkeys/kernel_data_key.vbprivk";

/// Combined size of the two kernel partitions, used as a fallback when the
/// partition table cannot be read back during image shrinking
pub const KERNEL_PARTITIONS_FALLBACK_BYTES: u64 = 134_217_728;

/// Extra slack appended to a shrunk image so the kernel can still boot
pub const BOOT_MARGIN_BYTES: u64 = 20_971_520;

/// ext4 block size assumed when converting block counts to bytes
pub const EXT4_BLOCK_SIZE: u64 = 4096;

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;
