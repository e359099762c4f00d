//! # Integration Tests
//!
//! End-to-end scenarios across the registry, the reconciliation and pruning
//! loops and the engine, driven by in-memory probers on paused tokio time.

#![cfg(test)]

mod engine;
mod lifecycle;
mod support;
mod suspension;
