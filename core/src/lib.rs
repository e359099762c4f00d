//! # watchr core
//!
//! The concurrent device-state engine: a shared [`registry::DeviceRegistry`] fed by
//! the [`discovery`] feed and per-device [`monitor`] tasks, kept in step with the
//! running monitors by [`reconcile`] and trimmed by [`prune`].

pub mod discovery;
pub mod engine;
pub mod monitor;
pub mod network;
pub mod ports;
pub mod prune;
pub mod reconcile;
pub mod registry;
pub mod suspension;
