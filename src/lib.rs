//! Hour-by-hour PV + battery (BESS) dispatch simulator.
//!
//! The [`physics`] module holds the per-timestep planners, SoC updater and
//! invariant validators. [`sim`] composes them into a full-trace [`sim::engine::Engine`].
//! Everything else ([`config`], [`io`], [`synthetic`], [`projection`]) is the
//! boundary around that core.

pub mod checks;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod physics;
pub mod projection;
/// Dispatch engine, tariff schedule and KPI reporting.
pub mod sim;
pub mod synthetic;
pub mod telemetry;

pub use error::{DispatchError, Result};
