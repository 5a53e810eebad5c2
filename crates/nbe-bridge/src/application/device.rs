//! Device facade: `category.key` reads and writes on top of the transport.
//!
//! # Addressing (for beginners)
//!
//! Every setting on the controller lives under a category:
//!
//! ```text
//! boiler.temp          one key
//! boiler.*             every key in the boiler category
//! *                    everything the chosen function returns
//! ```
//!
//! Reads of a single key always go out as `GetSetup`; bulk reads use the
//! function the caller asks for, so `get(GetOperatingData, "*")` returns live
//! telemetry.  Writes always go out as an encrypted `SetSetup` whose payload
//! is `category.key=value`.
//!
//! The [`DeviceApi`] trait is the seam the monitors and the command layer
//! depend on; tests substitute a mock or a scripted fake.

use std::sync::Arc;

use async_trait::async_trait;
use nbe_core::{Function, InvalidPath, Payload, Response, SettingPath};
use thiserror::Error;
use tracing::debug;

use crate::infrastructure::network::{DeviceIdentity, Transport, TransportError};

/// Errors returned by the device facade.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The path does not follow the `category.key` scheme.  Raised before any
    /// network traffic.
    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),

    /// `get` was asked to read with a function that does not read.
    #[error("{0:?} cannot be used for reads")]
    UnsupportedFunction(Function),

    /// The controller answered with a non-zero status.
    #[error("device reported status {0}")]
    DeviceStatus(u8),

    /// The request could not be delivered or was not answered.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reads and writes on one controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Reads `path` (`*`, `category.*`, or `category.key`).
    async fn get(&self, function: Function, path: &str) -> Result<Payload, DeviceError>;

    /// Writes `value` to the concrete setting `path`.
    async fn set(&self, path: &str, value: &str) -> Result<Response, DeviceError>;
}

/// [`DeviceApi`] backed by a live [`Transport`].
#[derive(Clone)]
pub struct Device {
    transport: Arc<Transport>,
}

impl Device {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Runs Discovery and caches the controller's public key.
    ///
    /// # Errors
    ///
    /// Propagates any [`TransportError`] from the exchange.
    pub async fn discover(&self) -> Result<DeviceIdentity, DeviceError> {
        Ok(self.transport.discover().await?)
    }
}

/// Picks the function and wire path for a read.
fn read_request(function: Function, path: &str) -> Result<(Function, SettingPath), DeviceError> {
    let parsed: SettingPath = path.parse()?;
    if !parsed.is_bulk() {
        return Ok((Function::GetSetup, parsed));
    }
    match function {
        Function::GetSetup | Function::GetOperatingData | Function::GetAdvancedData => {
            Ok((function, parsed))
        }
        Function::Discovery | Function::SetSetup => Err(DeviceError::UnsupportedFunction(function)),
    }
}

/// Builds the `category.key=value` write payload.
fn write_payload(path: &str, value: &str) -> Result<String, DeviceError> {
    let parsed: SettingPath = path.parse()?;
    if parsed.is_bulk() {
        return Err(InvalidPath {
            path: path.to_string(),
            reason: "writes need a concrete category.key",
        }
        .into());
    }
    if path.contains(&['=', ';'][..]) || value.contains(';') {
        return Err(InvalidPath {
            path: path.to_string(),
            reason: "path must not contain '=' or ';' and value must not contain ';'",
        }
        .into());
    }
    Ok(format!("{parsed}={value}"))
}

#[async_trait]
impl DeviceApi for Device {
    async fn get(&self, function: Function, path: &str) -> Result<Payload, DeviceError> {
        let (function, parsed) = read_request(function, path)?;
        let response = self.transport.send(function, parsed.to_string()).await?;
        if !response.is_success() {
            return Err(DeviceError::DeviceStatus(response.status));
        }
        debug!(?function, %parsed, entries = response.payload.len(), "read complete");
        Ok(response.payload)
    }

    async fn set(&self, path: &str, value: &str) -> Result<Response, DeviceError> {
        let payload = write_payload(path, value)?;
        let response = self.transport.send(Function::SetSetup, payload).await?;
        if !response.is_success() {
            return Err(DeviceError::DeviceStatus(response.status));
        }
        debug!(path, value, "write acknowledged");
        Ok(response)
    }
}
