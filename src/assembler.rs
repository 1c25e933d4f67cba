//! Pairing of energy and line notifications into [`Status`] readings.
//!
//! The device sends an energy message followed by the line message it belongs
//! to. Anything else means the stream lost or duplicated a notification, and
//! since an energy message carries no line of its own there is no safe way to
//! resynchronise.

use tracing::debug;

use crate::error::{Error, SequenceError};
use crate::message::{EnergyMessage, NotificationPacket};
use crate::status::Status;

#[derive(Debug, Default)]
pub struct StatusAssembler {
    /// `Some` while waiting for the line message that completes a reading
    pending: Option<EnergyMessage>,
}

impl StatusAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next decoded notification.
    ///
    /// Returns a reading once an energy message has been followed by a line message.
    /// Any error leaves the assembler idle.
    pub fn push(&mut self, packet: NotificationPacket) -> Result<Option<Status>, SequenceError> {
        match (self.pending.take(), packet) {
            (None, NotificationPacket::Energy(energy)) => {
                debug!(?energy, "awaiting line notification");
                self.pending = Some(energy);
                Ok(None)
            }
            (Some(energy), NotificationPacket::Line(line)) => {
                let status = Status::new(&energy, &line);
                debug!(?status, "assembled status");
                Ok(Some(status))
            }
            (None, NotificationPacket::Line(_)) => Err(SequenceError::LineWithoutEnergy),
            (Some(_), NotificationPacket::Energy(_)) => Err(SequenceError::UnpairedEnergy),
        }
    }

    /// Decode a raw notification and feed it.
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<Option<Status>, Error> {
        let packet = NotificationPacket::decode(data).inspect_err(|_| self.reset())?;
        Ok(self.push(packet)?)
    }

    pub fn is_awaiting_line(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
use crate::message::{ENERGY_FIXTURE, LINE_FIXTURE};
#[cfg(test)]
use crate::status::Line;

#[test]
fn test_energy_then_line_yields_status() {
    let mut assembler = StatusAssembler::new();

    let status = assembler.push_bytes(&hex::decode(ENERGY_FIXTURE).unwrap()).unwrap();
    assert!(status.is_none());
    assert!(assembler.is_awaiting_line());

    let status = assembler
        .push_bytes(&hex::decode(LINE_FIXTURE).unwrap())
        .unwrap()
        .unwrap();
    assert!(!assembler.is_awaiting_line());
    assert_eq!(
        status,
        Status {
            line: Line::L1,
            frequency: 60.05,
            voltage: 120.3108,
            amperage: 8.2695,
            watts: 968.5,
            total_watts: 699.94,
        }
    );
}

#[test]
fn test_one_status_per_pair() {
    let energy = hex::decode(ENERGY_FIXTURE).unwrap();
    let line = hex::decode(LINE_FIXTURE).unwrap();
    let mut assembler = StatusAssembler::new();

    let mut statuses = 0;
    for _ in 0..5 {
        for data in [&energy, &line] {
            if assembler.push_bytes(data).unwrap().is_some() {
                statuses += 1;
            }
        }
    }
    assert_eq!(statuses, 5);
}

#[test]
fn test_two_energy_messages_is_a_sequence_error() {
    let energy = hex::decode(ENERGY_FIXTURE).unwrap();
    let mut assembler = StatusAssembler::new();

    assembler.push_bytes(&energy).unwrap();
    let err = assembler.push_bytes(&energy).unwrap_err();
    assert!(matches!(err, Error::Sequence(SequenceError::UnpairedEnergy)));
    assert!(!assembler.is_awaiting_line());
}

#[test]
fn test_line_first_is_a_sequence_error() {
    let line = hex::decode(LINE_FIXTURE).unwrap();
    let mut assembler = StatusAssembler::new();

    let err = assembler.push_bytes(&line).unwrap_err();
    assert!(matches!(err, Error::Sequence(SequenceError::LineWithoutEnergy)));
}

#[test]
fn test_malformed_packet_is_a_decode_error() {
    let mut assembler = StatusAssembler::new();
    assembler.push_bytes(&hex::decode(ENERGY_FIXTURE).unwrap()).unwrap();

    let err = assembler.push_bytes(&[0x00; 19]).unwrap_err();
    assert!(matches!(err, Error::Decode(crate::error::DecodeError::Length(19))));
    assert!(!assembler.is_awaiting_line());
}

#[test]
fn test_reset_discards_pending_energy() {
    let mut assembler = StatusAssembler::new();
    assembler.push_bytes(&hex::decode(ENERGY_FIXTURE).unwrap()).unwrap();
    assembler.reset();

    let err = assembler.push_bytes(&hex::decode(LINE_FIXTURE).unwrap()).unwrap_err();
    assert!(matches!(err, Error::Sequence(SequenceError::LineWithoutEnergy)));
}
