//! Concrete network adapters for the outbound ports.

pub mod tcp;
