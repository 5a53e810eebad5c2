//! Command translation: turns bus-facing commands into device writes.
//!
//! Most commands address a setting directly (`boiler.temp` ← `75`).  The
//! controller has no single power setting, so the `device.power_switch`
//! alias is mapped onto the two write-only triggers `misc.start` and
//! `misc.stop`.

use nbe_core::Response;
use tracing::info;

use crate::application::device::{DeviceApi, DeviceError};

/// Path of the power alias.
pub const POWER_SWITCH: &str = "device.power_switch";

/// A concrete write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub path: String,
    pub value: String,
}

impl Command {
    fn new(path: &str, value: &str) -> Self {
        Self {
            path: path.to_string(),
            value: value.to_string(),
        }
    }
}

/// Maps a command onto the write the controller understands.
pub fn translate_command(path: &str, value: &str) -> Command {
    if path != POWER_SWITCH {
        return Command::new(path, value);
    }
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Command::new("misc.start", "1"),
        "off" | "0" | "false" => Command::new("misc.stop", "1"),
        _ => Command::new(path, value),
    }
}

/// Translates and sends one command.
///
/// # Errors
///
/// Returns whatever the device facade returns for the translated write.
pub async fn apply_command(
    device: &dyn DeviceApi,
    path: &str,
    value: &str,
) -> Result<Response, DeviceError> {
    let command = translate_command(path, value);
    info!(requested = path, path = %command.path, value = %command.value, "applying command");
    device.set(&command.path, &command.value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::MockDeviceApi;
    use nbe_core::{AppId, ControllerId, Function, Request};

    fn ack() -> Response {
        Response::reply_to(&Request::new(
            AppId::default(),
            ControllerId::default(),
            Function::SetSetup,
            0,
            "",
            "",
        ))
    }

    #[test]
    fn test_power_on_aliases_map_to_start() {
        for value in ["ON", "on", "1", "true", "True"] {
            assert_eq!(
                translate_command(POWER_SWITCH, value),
                Command::new("misc.start", "1"),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_power_off_aliases_map_to_stop() {
        for value in ["OFF", "off", "0", "false", "FALSE"] {
            assert_eq!(
                translate_command(POWER_SWITCH, value),
                Command::new("misc.stop", "1"),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_other_commands_pass_through() {
        assert_eq!(
            translate_command("boiler.temp", "75"),
            Command::new("boiler.temp", "75")
        );
        assert_eq!(
            translate_command(POWER_SWITCH, "maybe"),
            Command::new(POWER_SWITCH, "maybe")
        );
    }

    #[tokio::test]
    async fn test_apply_command_writes_translated_path() {
        // Arrange
        let mut device = MockDeviceApi::new();
        device
            .expect_set()
            .withf(|path, value| path == "misc.stop" && value == "1")
            .times(1)
            .returning(|_, _| Ok(ack()));

        // Act
        let response = apply_command(&device, POWER_SWITCH, "OFF").await.unwrap();

        // Assert
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_apply_command_propagates_device_error() {
        let mut device = MockDeviceApi::new();
        device
            .expect_set()
            .times(1)
            .returning(|_, _| Err(DeviceError::DeviceStatus(2)));

        let result = apply_command(&device, "boiler.temp", "75").await;

        assert!(matches!(result, Err(DeviceError::DeviceStatus(2))));
    }
}
