//! Core provisioning logic
//!
//! The pipeline stages, in control-flow order: [`target`] resolution,
//! [`partition`] planning, [`source`] resolution, [`extract`]ion,
//! [`chroot`] configuration (plus the [`distros`] registry), [`kernel`]
//! signing/flashing and [`finalize`]. [`context`] and [`guard`] carry the
//! shared teardown state.

pub mod chroot;
pub mod context;
pub mod distros;
pub mod extract;
pub mod finalize;
pub mod guard;
pub mod kernel;
pub mod options;
pub mod partition;
pub mod pipeline;
pub mod source;
pub mod target;
