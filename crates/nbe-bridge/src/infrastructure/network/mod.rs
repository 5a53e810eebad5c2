//! Network infrastructure: the UDP transport to the boiler controller.

pub mod transport;

pub use transport::{DeviceIdentity, Transport, TransportConfig, TransportError};
