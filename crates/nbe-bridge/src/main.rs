//! NBE bridge entry point.
//!
//! Loads the configuration, connects to the boiler controller, and runs one
//! monitor per data category until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()            -- TOML file, defaults if absent
//!  └─ SimulatedBoiler::start()      -- only with --simulate
//!  └─ Transport::connect()          -- UDP socket + receive task
//!  └─ Device::discover()            -- serial check, public key cached
//!  └─ Monitor::start() × N          -- settings categories, operating, advanced
//!  └─ Readiness::wait() × N         -- announce once every snapshot exists
//!  └─ ctrl_c                        -- stop monitors, close transport (also
//!                                     honoured while still waiting for readiness)
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nbe_bridge::application::device::{Device, DeviceApi};
use nbe_bridge::application::monitor::{Monitor, MonitorHandle, MonitorSpec, Publisher};
use nbe_bridge::infrastructure::network::Transport;
use nbe_bridge::infrastructure::publisher::LogPublisher;
use nbe_bridge::infrastructure::simulator::SimulatedBoiler;
use nbe_bridge::infrastructure::storage::config::{load_config_from, AppConfig, MonitorConfig};

/// Serial the simulated controller reports when none is configured.
const SIMULATOR_SERIAL: &str = "ABC123";

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "nbe-bridge", version, about = "Bridge for NBE pellet-boiler controllers")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "NBE_BRIDGE_CONFIG", default_value = "nbe-bridge.toml")]
    config: PathBuf,

    /// Run against a built-in simulated controller instead of real hardware.
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = load_config_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Initialise structured logging; RUST_LOG overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(config = %args.config.display(), "NBE bridge starting");

    // Kept alive for the whole run; dropping it stops the simulator.
    let _simulator = if args.simulate {
        let serial = if config.device.serial.is_empty() {
            SIMULATOR_SERIAL.to_string()
        } else {
            config.device.serial.clone()
        };
        let simulator = SimulatedBoiler::start(&serial)
            .await
            .context("starting simulated controller")?;
        config.device.address = simulator.addr().to_string();
        config.device.serial = serial;
        Some(simulator)
    } else {
        None
    };

    let transport_config = config.transport_config().context("invalid configuration")?;
    let transport = Arc::new(
        Transport::connect(transport_config)
            .await
            .context("connecting to controller")?,
    );
    let device = Device::new(Arc::clone(&transport));
    let identity = device.discover().await.context("discovering controller")?;

    let publisher: Arc<dyn Publisher> = Arc::new(LogPublisher::new(format!("nbe/{}", identity.serial)));
    let device: Arc<dyn DeviceApi> = Arc::new(device);
    let monitors = start_monitors(&config, &device, &publisher);

    let reached_ready = wait_for_shutdown(&monitors, tokio::signal::ctrl_c())
        .await
        .context("waiting for shutdown signal")?;
    if !reached_ready {
        warn!("shutdown requested before every monitor was ready");
    }
    info!("shutdown signal received");

    for handle in monitors {
        handle.stop().await;
    }
    transport.close();
    info!("NBE bridge stopped");
    Ok(())
}

/// Waits for `shutdown`, announcing readiness once every monitor has its
/// first snapshot.  Returns whether readiness was reached first.
///
/// `shutdown` is honoured while monitors are still waiting for a silent device.
async fn wait_for_shutdown<F>(monitors: &[MonitorHandle], shutdown: F) -> std::io::Result<bool>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    tokio::select! {
        () = wait_until_ready(monitors) => {}
        signal = &mut shutdown => {
            signal?;
            return Ok(false);
        }
    }
    info!(monitors = monitors.len(), "device ready");
    shutdown.await?;
    Ok(true)
}

async fn wait_until_ready(monitors: &[MonitorHandle]) {
    for handle in monitors {
        if !handle.readiness().wait().await {
            warn!(category = handle.category(), "monitor ended before its first snapshot");
        }
    }
}

fn start_monitors(
    config: &AppConfig,
    device: &Arc<dyn DeviceApi>,
    publisher: &Arc<dyn Publisher>,
) -> Vec<MonitorHandle> {
    monitor_specs(&config.monitor)
        .into_iter()
        .map(|spec| Monitor::new(spec, Arc::clone(device), Arc::clone(publisher)).start())
        .collect()
}

/// One settings monitor per category plus the telemetry monitors; a zero
/// interval disables a monitor.
fn monitor_specs(config: &MonitorConfig) -> Vec<MonitorSpec> {
    let mut specs = Vec::new();
    if config.settings_interval_secs > 0 {
        let interval = Duration::from_secs(config.settings_interval_secs);
        specs.extend(
            config
                .settings_categories
                .iter()
                .map(|category| MonitorSpec::settings(category, interval)),
        );
    }
    if config.operating_interval_secs > 0 {
        specs.push(MonitorSpec::operating(Duration::from_secs(
            config.operating_interval_secs,
        )));
    }
    if config.advanced_interval_secs > 0 {
        specs.push(MonitorSpec::advanced(Duration::from_secs(
            config.advanced_interval_secs,
        )));
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nbe_bridge::application::device::DeviceError;
    use nbe_core::{Function, Payload, Response, Value};
    use tokio::time;

    /// A device that answers every read, or none at all.
    struct FixedDevice {
        answers: bool,
    }

    #[async_trait]
    impl DeviceApi for FixedDevice {
        async fn get(&self, _function: Function, _path: &str) -> Result<Payload, DeviceError> {
            if self.answers {
                Ok(Payload::from([("state".to_string(), Value::Int(5))]))
            } else {
                Err(DeviceError::DeviceStatus(1))
            }
        }

        async fn set(&self, _path: &str, _value: &str) -> Result<Response, DeviceError> {
            Err(DeviceError::DeviceStatus(1))
        }
    }

    fn operating_monitor(answers: bool) -> MonitorHandle {
        Monitor::new(
            MonitorSpec::operating(Duration::from_secs(60)),
            Arc::new(FixedDevice { answers }),
            Arc::new(LogPublisher::new("nbe/test")),
        )
        .start()
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_readiness() {
        // Arrange – the device never answers, so readiness never arrives
        let monitors = vec![operating_monitor(false)];

        // Act
        let result = time::timeout(
            Duration::from_secs(2),
            wait_for_shutdown(&monitors, async { Ok::<(), std::io::Error>(()) }),
        )
        .await
        .expect("shutdown must not wait for readiness");

        // Assert
        assert!(!result.unwrap());
        for handle in monitors {
            handle.stop().await;
        }
    }

    #[tokio::test]
    async fn test_readiness_reported_before_shutdown() {
        // Arrange
        let monitors = vec![operating_monitor(true)];

        // Act
        let result = wait_for_shutdown(&monitors, async {
            time::sleep(Duration::from_millis(200)).await;
            Ok::<(), std::io::Error>(())
        })
        .await;

        // Assert
        assert!(result.unwrap());
        for handle in monitors {
            handle.stop().await;
        }
    }

    #[test]
    fn test_monitor_specs_cover_every_category() {
        let config = MonitorConfig::default();

        let specs = monitor_specs(&config);

        assert_eq!(specs.len(), config.settings_categories.len() + 2);
        assert!(specs.iter().any(|s| s.category == "operating"));
        assert!(specs.iter().any(|s| s.category == "advanced"));
    }

    #[test]
    fn test_zero_interval_disables_monitor() {
        let config = MonitorConfig {
            advanced_interval_secs: 0,
            ..MonitorConfig::default()
        };

        let specs = monitor_specs(&config);

        assert!(specs.iter().all(|s| s.category != "advanced"));
    }

    #[test]
    fn test_args_default_config_path() {
        let args = Args::parse_from(["nbe-bridge", "--simulate"]);
        assert!(args.simulate);
        assert_eq!(args.config, PathBuf::from("nbe-bridge.toml"));
    }
}
