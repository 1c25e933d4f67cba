use bluest::Uuid;

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expand a 16-bit assigned number into a full Bluetooth UUID
pub const fn uuid_from_u16(short: u16) -> Uuid {
    uuid_from_u32(short as u32)
}

pub const fn uuid_from_u32(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// The primary service advertised by every Power Watchdog
pub const SERVICE: Uuid = uuid_from_u16(0xFFE0);

/// The characteristic that pushes line and energy notifications
pub const TELEMETRY_CHARACTERISTIC: Uuid = uuid_from_u16(0xFFE2);

/// Second notifying characteristic on the service. Not used for telemetry.
pub const RX_CHARACTERISTIC: Uuid = uuid_from_u16(0xFFF5);

#[test]
fn test_short_uuids_expand_onto_base() {
    assert_eq!(SERVICE.to_string(), "0000ffe0-0000-1000-8000-00805f9b34fb");
    assert_eq!(
        TELEMETRY_CHARACTERISTIC.to_string(),
        "0000ffe2-0000-1000-8000-00805f9b34fb"
    );
    assert_eq!(RX_CHARACTERISTIC.to_string(), "0000fff5-0000-1000-8000-00805f9b34fb");
}
