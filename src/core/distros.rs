//! Distro configurator registry
//!
//! Distro-specific package installation is an external collaborator: each
//! known distro maps to a configurator that runs an opaque script inside
//! the already-prepared chroot. The generic path has no registry entry,
//! which is a valid no-op rather than a lookup failure.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::core::context::BuildContext;
use crate::core::options::{BuildOptions, Distro};
use crate::infra::process::Cmd;

/// Distro-specific configuration step, run after the common chroot setup.
pub trait DistroConfigurator {
    fn configure(&self, ctx: &BuildContext, options: &BuildOptions) -> Result<()>;
}

/// Look up the configurator for a distro. `None` for generic installs.
pub fn configurator_for(distro: Distro) -> Option<Box<dyn DistroConfigurator>> {
    match distro {
        Distro::Generic => None,
        Distro::Arch | Distro::Ubuntu | Distro::PopOs | Distro::Fedora => {
            Some(Box::new(ScriptConfigurator { distro }))
        }
    }
}

/// Runs `distros/<name>.sh` with the collaborator contract arguments:
/// desktop environment, distro version, verbose flag, kernel variant and
/// login shell.
struct ScriptConfigurator {
    distro: Distro,
}

impl DistroConfigurator for ScriptConfigurator {
    fn configure(&self, _ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
        let script = PathBuf::from("distros").join(format!("{}.sh", self.distro.as_str()));
        if !script.is_file() {
            tracing::warn!(
                "no configuration script at {}; skipping distro specific setup",
                script.display()
            );
            return Ok(());
        }

        tracing::info!("running {} specific configuration", self.distro);
        Cmd::new(script.to_string_lossy().into_owned())
            .arg(&options.desktop_environment)
            .arg(&options.distro_version)
            .arg(if options.verbose { "true" } else { "false" })
            .arg(options.kernel_variant.as_str())
            .arg(&options.shell)
            .run()
            .with_context(|| format!("{} configuration failed", self.distro))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_has_no_configurator() {
        assert!(configurator_for(Distro::Generic).is_none());
    }

    #[test]
    fn test_known_distros_have_configurators() {
        for distro in [Distro::Arch, Distro::Ubuntu, Distro::PopOs, Distro::Fedora] {
            assert!(configurator_for(distro).is_some());
        }
    }
}
