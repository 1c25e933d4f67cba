//! Notifications pushed by the telemetry characteristic.
//!
//! Every notification is exactly 20 bytes. The first byte is an opcode that
//! selects the layout of the rest:
//!
//! Opcode | Message
//! 0x00   | [`LineMessage`]: which line is reported and its frequency
//! 0x01   | [`EnergyMessage`]: voltage, current, power and energy
//!
//! All multi byte fields are big endian.

mod energy_message;
mod line_message;

pub use energy_message::EnergyMessage;
pub use line_message::LineMessage;

use crate::error::DecodeError;

/// The length of every notification
pub const PACKET_LEN: usize = 20;

/// A decoded telemetry notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPacket {
    Line(LineMessage),
    Energy(EnergyMessage),
}

impl NotificationPacket {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let data: &[u8; PACKET_LEN] = data
            .try_into()
            .map_err(|_| DecodeError::Length(data.len()))?;

        match data[0] {
            LineMessage::OPCODE => LineMessage::decode(data).map(Self::Line),
            EnergyMessage::OPCODE => Ok(Self::Energy(EnergyMessage::decode(data))),
            opcode => Err(DecodeError::Opcode(opcode)),
        }
    }
}

pub(crate) fn i32_at(data: &[u8; PACKET_LEN], start: usize) -> i32 {
    i32::from_be_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]])
}

#[cfg(test)]
pub(crate) const ENERGY_FIXTURE: &str = "01032000125ba4000143070093c808006acd6800";
#[cfg(test)]
pub(crate) const LINE_FIXTURE: &str = "0003700011aaf30000000000001775e22a000000";

#[test]
fn test_decode_rejects_wrong_lengths() {
    let mut data = hex::decode(ENERGY_FIXTURE).unwrap();
    for len in [0, 1, 19, 21, 40] {
        data.resize(len, 0);
        assert_eq!(NotificationPacket::decode(&data), Err(DecodeError::Length(len)));
    }
}

#[test]
fn test_decode_rejects_unknown_opcodes() {
    for opcode in 0x02..=0xff {
        let mut data = [0u8; PACKET_LEN];
        data[0] = opcode;
        assert_eq!(NotificationPacket::decode(&data), Err(DecodeError::Opcode(opcode)));
    }
}

#[test]
fn test_decode_dispatches_on_opcode() {
    let energy = hex::decode(ENERGY_FIXTURE).unwrap();
    assert!(matches!(
        NotificationPacket::decode(&energy),
        Ok(NotificationPacket::Energy(_))
    ));

    let line = hex::decode(LINE_FIXTURE).unwrap();
    assert!(matches!(
        NotificationPacket::decode(&line),
        Ok(NotificationPacket::Line(_))
    ));
}
