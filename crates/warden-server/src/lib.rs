//! Warden Server - node bootstrap and operational tooling
//!
//! This crate provides:
//! - Configuration loading (file, environment, command line)
//! - Logging bootstrap
//! - The contention soak run used to exercise the lock coordinator locally

pub mod model;
pub mod soak;
pub mod startup;
