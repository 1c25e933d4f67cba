//! Read live telemetry from Hughes Autoformers Power Watchdog surge protectors over Bluetooth Low Energy
//!
//! The Power Watchdog has no documented protocol. What is implemented here was
//! recovered from captures of the vendor app talking to a 30A single line unit.
//!
//! - Devices are recognised from their advertisement: the serial number is part of
//!   the local name and the hardware revision is packed into the manufacturer data.
//! - Once subscribed, the device pushes a pair of 20 byte notifications per reading:
//!   an energy message (voltage, current, power, accumulated energy) followed by a
//!   line message (line selector, frequency).
//!
//! # Example
//!
//! ```no_run
//! # use futures_util::StreamExt;
//! # use powerwatchdog::{ClientConfig, WatchdogClient};
//! #
//! # #[tokio::main]
//! # pub async fn main() -> Result<(), powerwatchdog::Error> {
//!     let config = ClientConfig::default();
//!     let adapter = WatchdogClient::default_adapter(&config).await?;
//!     let client = WatchdogClient::connect(&adapter, "APMS25E62E208", config).await?;
//!     let mut readings = client.status().await?;
//!     while let Some(status) = readings.next().await {
//!         println!("{}", status?);
//!     }
//! #   Ok(())
//! # }
//! ```

mod advertisement;
mod assembler;
mod config;
mod error;
mod identity;
mod message;
mod scan_cache;
mod status;
mod status_stream;
pub mod uuids;
mod watchdog_client;

pub use advertisement::{AdvertisementFields, ManufacturerData};
pub use assembler::StatusAssembler;
pub use config::ClientConfig;
pub use error::{AdvertisementError, DecodeError, Error, SequenceError};
pub use identity::{DeviceId, DeviceIdentity, HardwareRevision};
pub use message::{EnergyMessage, LineMessage, NotificationPacket, PACKET_LEN};
pub use scan_cache::ScanCache;
pub use status::{Line, Status, ENERGY_SCALE, FREQUENCY_SCALE};
pub use status_stream::StatusStream;
pub use watchdog_client::{DiscoveredWatchdog, WatchdogClient};
