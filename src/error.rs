use bluest::Uuid;
use thiserror::Error;

/// A notification payload that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a 20 byte notification, got {0} bytes")]
    Length(usize),
    #[error("unknown opcode 0x{0:02x}")]
    Opcode(u8),
    #[error("invalid line selector {0:02x?}")]
    LineSelector([u8; 3]),
}

/// Notifications that decoded fine but arrived in an order the device never sends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("line notification without a preceding energy notification")]
    LineWithoutEnergy,
    #[error("energy notification while another was still waiting for its line notification")]
    UnpairedEnergy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvertisementError {
    #[error("AD structure at offset {offset} runs past the end of the payload")]
    Truncated { offset: usize },
    #[error("AD structure at offset {offset} has a malformed body")]
    Malformed { offset: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluest::Error),
    #[error("bluetooth is not available on this device")]
    BluetoothUnavailable,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("no service with UUID {0} found")]
    ServiceNotFound(Uuid),
    #[error("no characteristic with UUID {0} found")]
    CharacteristicNotFound(Uuid),
    #[error("characteristic {0} does not carry power watchdog telemetry")]
    WrongCharacteristic(Uuid),
    #[error("malformed notification: {0}")]
    Decode(#[from] DecodeError),
    #[error("notification out of sequence: {0}")]
    Sequence(#[from] SequenceError),
}
