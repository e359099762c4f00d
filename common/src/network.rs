//! # Network Models
//!
//! Shared types describing monitored devices and the targets the discovery feed
//! sweeps for them.

pub mod address;
pub mod device;
pub mod range;
pub mod target;
