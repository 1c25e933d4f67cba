//! Talk to a Power Watchdog through the platform's Bluetooth stack.
//!
//! The device exposes a single service (0xFFE0). Live readings are pushed as
//! notifications on characteristic 0xFFE2, alternating an energy message and
//! the line message it belongs to. Nothing has to be written to start the
//! stream; subscribing is enough.

use std::future::Future;
use std::time::Duration;

use bluest::Adapter;
use bluest::AdvertisingDevice;
use bluest::Characteristic;
use bluest::Device;
use futures_util::future;
use futures_util::Stream;
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::identity::DeviceIdentity;
use crate::scan_cache::ScanCache;
use crate::status_stream::StatusStream;
use crate::uuids;

/// How long to wait for the adapter before telling the user it is still off
const POWER_ON_WARNING: Duration = Duration::from_secs(3);

/// A Power Watchdog seen while scanning
#[derive(Debug, Clone)]
pub struct DiscoveredWatchdog {
    pub device: Device,
    pub identity: DeviceIdentity,
    pub rssi: Option<i16>,
}

impl DiscoveredWatchdog {
    /// Whether `target` names this device, by identifier or by platform address.
    pub fn matches(&self, target: &str) -> bool {
        is_target(&self.identity, &self.device.id().to_string(), target)
    }
}

pub struct WatchdogClient {
    adapter: Adapter,
    device: Device,
    identity: DeviceIdentity,
    telemetry: Characteristic,
    config: ClientConfig,
}

impl WatchdogClient {
    /// The default Bluetooth adapter, once it is powered on.
    ///
    /// Fails with [`Error::BluetoothUnavailable`] if the adapter is still off after
    /// `config.power_on_timeout`.
    pub async fn default_adapter(config: &ClientConfig) -> Result<Adapter, Error> {
        let adapter = Adapter::default().await.ok_or(Error::BluetoothUnavailable)?;
        wait_powered_on(adapter.wait_available(), config.power_on_timeout).await?;
        Ok(adapter)
    }

    /// Scan for Power Watchdogs.
    ///
    /// Each device is yielded once, as soon as both its advertisement and its scan
    /// response have been seen. Scanning stops when the stream is dropped.
    pub async fn scan(
        adapter: &Adapter,
    ) -> Result<impl Stream<Item = DiscoveredWatchdog> + Send + Unpin + '_, Error> {
        let advertisements = adapter.scan(&[uuids::SERVICE]).await?;
        let mut cache = ScanCache::new();

        Ok(advertisements.filter_map(move |advertisement| {
            let AdvertisingDevice { device, adv_data, rssi, .. } = advertisement;
            let discovered = cache
                .record(device.id(), adv_data.into())
                .map(|identity| {
                    info!(
                        id = %identity.id,
                        hardware_revision = %identity.hardware_revision,
                        "discovered power watchdog"
                    );
                    DiscoveredWatchdog { device, identity, rssi }
                });
            future::ready(discovered)
        }))
    }

    /// Find the device named by `target` and connect to it.
    ///
    /// `target` is the device identifier, either bare (`25E62E208`) or as a label
    /// (`APMS25E62E208`), or the platform address printed by a scan.
    pub async fn connect(adapter: &Adapter, target: &str, config: ClientConfig) -> Result<Self, Error> {
        let DiscoveredWatchdog { device, identity, .. } =
            Self::discover_device(adapter, target, &config).await?;

        connect_with_retries(adapter, &device, config.connect_retries).await?;
        info!(id = %identity.id, "connected");

        let service = device
            .discover_services_with_uuid(uuids::SERVICE)
            .await?
            .first()
            .ok_or(Error::ServiceNotFound(uuids::SERVICE))?
            .clone();
        let telemetry = service
            .discover_characteristics_with_uuid(uuids::TELEMETRY_CHARACTERISTIC)
            .await?
            .first()
            .ok_or(Error::CharacteristicNotFound(uuids::TELEMETRY_CHARACTERISTIC))?
            .clone();

        Ok(Self {
            adapter: adapter.clone(),
            device,
            identity,
            telemetry,
            config,
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Subscribe to live readings.
    ///
    /// Every call starts a new subscription with fresh pairing state. Dropping the
    /// returned stream unsubscribes.
    pub async fn status(
        &self,
    ) -> Result<StatusStream<impl Stream<Item = bluest::Result<Vec<u8>>> + Send + Unpin + '_>, Error> {
        if !self.device.is_connected().await {
            connect_with_retries(&self.adapter, &self.device, self.config.connect_retries).await?;
        }

        let characteristic = self.telemetry.uuid_async().await?;
        let notifications = self.telemetry.notify().await?;
        debug!(id = %self.identity.id, "subscribed to telemetry");
        StatusStream::new(characteristic, notifications)
    }

    /// Disconnect from the device
    pub async fn stop(self) -> Result<(), Error> {
        self.adapter.disconnect_device(&self.device).await?;
        info!(id = %self.identity.id, "disconnected");
        Ok(())
    }

    async fn discover_device(
        adapter: &Adapter,
        target: &str,
        config: &ClientConfig,
    ) -> Result<DiscoveredWatchdog, Error> {
        let not_found = || Error::DeviceNotFound(target.to_string());

        let mut discovered = Self::scan(adapter)
            .await?
            .filter(|watchdog| future::ready(watchdog.matches(target)));

        timeout(config.discovery_timeout, discovered.next())
            .await
            .map_err(|_| not_found())?
            .ok_or_else(not_found)
    }
}

/// Wait for `available` to resolve, warning once if it takes a while.
async fn wait_powered_on<F>(available: F, power_on_timeout: Duration) -> Result<(), Error>
where
    F: Future<Output = bluest::Result<()>>,
{
    let available = timeout(power_on_timeout, available);
    tokio::pin!(available);

    let result = match timeout(POWER_ON_WARNING, &mut available).await {
        Ok(result) => result,
        Err(_) => {
            warn!("waiting for Bluetooth to power on");
            available.await
        }
    };
    result.map_err(|_| Error::BluetoothUnavailable)?.map_err(Error::from)
}

fn is_target(identity: &DeviceIdentity, address: &str, target: &str) -> bool {
    let target = target.trim();
    identity.id.matches(target) || (!target.is_empty() && address.eq_ignore_ascii_case(target))
}

async fn connect_with_retries(adapter: &Adapter, device: &Device, retries: u32) -> Result<(), Error> {
    let mut retries = retries;
    loop {
        match adapter.connect_device(device).await {
            Ok(()) => return Ok(()),
            Err(err) if retries > 0 => {
                warn!(%err, retries, "failed to connect");
                retries -= 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
fn captured_identity() -> DeviceIdentity {
    let mfr = crate::advertisement::ManufacturerData {
        company_id: 0x9860,
        data: hex::decode("66f25e620000").unwrap(),
    };
    DeviceIdentity::from_advertisement("PMS      025E62E208", &[uuids::SERVICE], &mfr).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_wait_powered_on_gives_up_after_timeout() {
    let started = tokio::time::Instant::now();
    let result = wait_powered_on(future::pending(), Duration::from_secs(10)).await;

    assert!(matches!(result, Err(Error::BluetoothUnavailable)));
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_wait_powered_on_survives_the_warning() {
    let available = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    };
    assert!(wait_powered_on(available, Duration::from_secs(10)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_wait_powered_on_timeout_shorter_than_warning() {
    let started = tokio::time::Instant::now();
    let result = wait_powered_on(future::pending(), Duration::from_secs(1)).await;

    assert!(matches!(result, Err(Error::BluetoothUnavailable)));
    assert!(started.elapsed() < POWER_ON_WARNING);
}

#[tokio::test]
async fn test_wait_powered_on_passes_adapter_errors_through() {
    let result = wait_powered_on(
        future::ready(Err(bluest::Error::from(bluest::error::ErrorKind::AdapterUnavailable))),
        Duration::from_secs(10),
    )
    .await;
    assert!(matches!(result, Err(Error::Bluetooth(_))));
}

#[test]
fn test_target_matches_identifier_or_address() {
    let identity = captured_identity();
    let address = "60:98:66:F2:5E:62";

    assert!(is_target(&identity, address, "APMS25E62E208"));
    assert!(is_target(&identity, address, "25e62e208"));
    assert!(is_target(&identity, address, "60:98:66:F2:5E:62"));
    assert!(is_target(&identity, address, " 60:98:66:f2:5e:62 "));
    assert!(!is_target(&identity, address, "60:98:66:F2:5E:63"));
    assert!(!is_target(&identity, address, "APMS25E62E209"));
    assert!(!is_target(&identity, "", ""));
}
