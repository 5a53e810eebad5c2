//! Infrastructure layer for the bridge.
//!
//! Contains the I/O-facing adapters: the UDP transport, the simulated
//! controller, publisher adapters, and configuration storage.

pub mod network;
pub mod publisher;
pub mod simulator;
pub mod storage;
