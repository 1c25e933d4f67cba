use super::{i32_at, PACKET_LEN};
use crate::error::DecodeError;
use crate::status::Line;

/// Identifies the line the preceding [`super::EnergyMessage`] belongs to.
///
/// Start Byte | End Byte | Meaning
/// 0          | 0        | Opcode 0x00
/// 1          | 10       | Unknown
/// 11         | 14       | Frequency in Hz/100 (i32)
/// 15         | 16       | Unknown
/// 17         | 19       | Line selector, the same byte three times: 0 or 1
///
/// The selector is only accepted when all three bytes agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMessage {
    pub line: Line,
    pub frequency: i32,
}

impl LineMessage {
    pub const OPCODE: u8 = 0x00;

    pub(crate) fn decode(data: &[u8; PACKET_LEN]) -> Result<Self, DecodeError> {
        let line = match [data[17], data[18], data[19]] {
            [0, 0, 0] => Line::L1,
            [1, 1, 1] => Line::L2,
            selector => return Err(DecodeError::LineSelector(selector)),
        };

        Ok(Self {
            line,
            frequency: i32_at(data, 11),
        })
    }
}

#[cfg(test)]
fn decode_line(data: &[u8]) -> Result<LineMessage, DecodeError> {
    match super::NotificationPacket::decode(data)? {
        super::NotificationPacket::Line(line) => Ok(line),
        other => panic!("expected a line message, got {other:?}"),
    }
}

#[test]
fn test_decode_line() {
    let line = decode_line(&hex::decode(super::LINE_FIXTURE).unwrap()).unwrap();
    assert_eq!(line.line, Line::L1);
    assert_eq!(line.frequency, 6005);
}

#[test]
fn test_decode_second_line() {
    let mut data = hex::decode(super::LINE_FIXTURE).unwrap();
    data[17..].copy_from_slice(&[1, 1, 1]);
    let line = decode_line(&data).unwrap();
    assert_eq!(line.line, Line::L2);
    assert_eq!(line.frequency, 6005);
}

#[test]
fn test_decode_line_rejects_mixed_selector() {
    let mut data = hex::decode(super::LINE_FIXTURE).unwrap();
    for selector in [[1, 0, 0], [0, 1, 1], [1, 1, 0], [2, 2, 2], [0, 0, 1]] {
        data[17..].copy_from_slice(&selector);
        assert_eq!(decode_line(&data), Err(DecodeError::LineSelector(selector)));
    }
}
