use super::{i32_at, PACKET_LEN};

/// Voltage, current and power readings for the line reported by the next [`super::LineMessage`].
///
/// Start Byte | End Byte | Meaning
/// 0          | 0        | Opcode 0x01
/// 1          | 2        | Unknown, always 800 in captures (i16)
/// 3          | 6        | Voltage in V/10000 (i32)
/// 7          | 10       | Current in A/10000 (i32)
/// 11         | 14       | Power in W/10000 (i32)
/// 15         | 18       | Accumulated energy in kWh/10000 (i32)
/// 19         | 19       | Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyMessage {
    pub reserved0: i16,
    pub voltage: i32,
    pub amperage: i32,
    pub watts: i32,
    pub total_watts: i32,
    pub reserved1: u8,
}

impl EnergyMessage {
    pub const OPCODE: u8 = 0x01;

    /// Every byte pattern after the opcode is a valid energy message.
    pub(crate) fn decode(data: &[u8; PACKET_LEN]) -> Self {
        Self {
            reserved0: i16::from_be_bytes([data[1], data[2]]),
            voltage: i32_at(data, 3),
            amperage: i32_at(data, 7),
            watts: i32_at(data, 11),
            total_watts: i32_at(data, 15),
            reserved1: data[19],
        }
    }
}

#[cfg(test)]
fn decode_energy(fixture: &str) -> EnergyMessage {
    match super::NotificationPacket::decode(&hex::decode(fixture).unwrap()) {
        Ok(super::NotificationPacket::Energy(energy)) => energy,
        other => panic!("expected an energy message, got {other:?}"),
    }
}

#[test]
fn test_decode_energy() {
    let energy = decode_energy(super::ENERGY_FIXTURE);
    assert_eq!(
        energy,
        EnergyMessage {
            reserved0: 800,
            voltage: 0x00125ba4,
            amperage: 82695,
            watts: 9685000,
            total_watts: 6999400,
            reserved1: 0,
        }
    );
}

#[test]
fn test_decode_energy_captures() {
    let energy = decode_energy("010320001294fb000155d2009e8a99000024b800");
    assert_eq!(energy.reserved0, 800);
    assert_eq!(energy.voltage, 1217787);
    assert_eq!(energy.amperage, 87506);
    assert_eq!(energy.watts, 10390169);
    assert_eq!(energy.total_watts, 9400);

    let energy = decode_energy("0103200012a3950001583e00909c9b001681b800");
    assert_eq!(energy.reserved0, 800);
    assert_eq!(energy.voltage, 1221525);
    assert_eq!(energy.amperage, 88126);
    assert_eq!(energy.watts, 9477275);
    assert_eq!(energy.total_watts, 1475000);
}

#[test]
fn test_decode_energy_signed_fields() {
    let energy = decode_energy("01ffff80000000fffffffe000000000000000007");
    assert_eq!(energy.reserved0, -1);
    assert_eq!(energy.voltage, i32::MIN);
    assert_eq!(energy.amperage, -2);
    assert_eq!(energy.watts, 0);
    assert_eq!(energy.total_watts, 0);
    assert_eq!(energy.reserved1, 7);
}
