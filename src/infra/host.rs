//! Host environment detection
//!
//! Some hosts change the pipeline's behavior: WSL1 cannot attach loop
//! devices at all, and crostini (crosvm) can neither loop-mount ISOs nor
//! flash a shrunk `.img`.

use crate::infra::process::Cmd;

/// DMI product name, absent on hosts without DMI data (e.g. WSL).
pub fn product_name() -> Option<String> {
    std::fs::read_to_string("/sys/devices/virtual/dmi/id/product_name")
        .ok()
        .map(|s| s.trim().to_string())
}

/// Whether the build is running inside crostini's VM.
pub fn is_crostini() -> bool {
    product_name().as_deref() == Some("crosvm")
}

/// Whether the build is running under WSL (either version).
pub fn is_wsl() -> bool {
    match Cmd::new("systemd-detect-virt").run_check() {
        Ok(out) => out.stdout_trimmed().to_lowercase().contains("wsl"),
        Err(_) => false,
    }
}
