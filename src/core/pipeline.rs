//! The provisioning pipeline
//!
//! Strictly sequential: target resolution, partitioning, rootfs
//! resolution, extraction, chroot configuration, kernel flash,
//! finalization. The interrupt guardian wraps the whole run; error returns
//! tear down through the same shared routine before the process exits.

use anyhow::{Context, Result};

use crate::core::context::BuildContext;
use crate::core::options::BuildOptions;
use crate::core::{chroot, distros, extract, finalize, guard, kernel, partition, source, target};

/// Run one full provisioning pipeline.
pub async fn run(options: BuildOptions) -> Result<()> {
    options.validate().context("Invalid build options")?;

    let ctx = BuildContext::new()?;
    guard::install(ctx.cleanup_state());

    tracing::info!("starting build");
    let result = run_stages(&ctx, &options).await;
    if result.is_err() {
        // The happy path cleans up in finalize; make sure an aborted run
        // leaves the host just as clean.
        ctx.teardown();
    }
    result
}

async fn run_stages(ctx: &BuildContext, options: &BuildOptions) -> Result<()> {
    let target = target::resolve(ctx, &options.target)?;
    partition::create_partitions(ctx, &target)?;

    let source = source::resolve(ctx, options).await?;
    extract::extract(ctx, &source)?;

    chroot::configure_common(ctx, options)?;
    if let Some(configurator) = distros::configurator_for(options.distro) {
        configurator.configure(ctx, options)?;
    } else {
        tracing::info!("generic install, skipping distro specific configuration");
    }
    chroot::enable_postinstall(ctx, options)?;

    kernel::flash_kernel(ctx, options, &target)?;
    finalize::finalize(ctx, options, &target)?;
    Ok(())
}
