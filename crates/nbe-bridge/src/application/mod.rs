//! Application layer use cases for the bridge.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the protocol (pure encoding rules in
//! `nbe-core`) and the infrastructure (sockets, files, the simulator).  Its
//! use cases depend on traits such as [`device::DeviceApi`] and
//! [`monitor::Publisher`], so tests can run them without a network.
//!
//! # Sub-modules
//!
//! - **`device`**   – The device facade: `get`/`set` over `category.key`
//!   paths, translated into protocol requests.
//! - **`monitor`**  – Poll → diff → publish loops, one per data category,
//!   with a one-shot readiness signal.
//! - **`commands`** – Maps bus-facing commands (such as the power alias)
//!   onto device writes.

pub mod commands;
pub mod device;
pub mod monitor;
