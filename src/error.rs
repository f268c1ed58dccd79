//! Error types for depthboot
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Build option validation errors
#[derive(Error, Debug)]
pub enum OptionError {
    /// Username contains characters outside the allowed set
    #[error("Invalid username '{name}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidUsername { name: String },

    /// Empty password
    #[error("Password must not be empty")]
    EmptyPassword,

    /// Image size outside the usable range
    #[error("Image size {size} GiB is too small: the partition layout needs at least {min} GiB")]
    ImageTooSmall { size: u64, min: u64 },
}

/// Storage target resolution errors
#[derive(Error, Debug)]
pub enum TargetError {
    /// Loop attach failed under WSL1, which cannot host loop devices
    #[error("Loop device setup failed. Make sure you are using WSL version 2 (WSL2)")]
    VirtualizationUnsupported,

    /// Loop attach failed for an unknown reason
    #[error("Failed to attach '{path}' to a loop device: {error}")]
    AttachFailed { path: PathBuf, error: String },

    /// Image file allocation failed
    #[error("Failed to allocate image file '{path}': {error}")]
    AllocationFailed { path: PathBuf, error: String },
}

/// Partitioning errors
#[derive(Error, Debug)]
pub enum PartitionError {
    /// The kernel may not pick up a rewritten table on an already-open device
    #[error(
        "Failed to create partition table on '{device}'. \
         Try physically unplugging and replugging the USB/SD-card, then retry"
    )]
    TableWrite { device: String },

    /// mkfs failed on the rootfs partition
    #[error("Failed to format '{partition}' as ext4: {error}")]
    Format { partition: String, error: String },

    /// Mounting the freshly formatted rootfs partition failed
    #[error("Failed to mount '{partition}' at '{mount_point}': {error}")]
    Mount {
        partition: String,
        mount_point: PathBuf,
        error: String,
    },
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },
}
