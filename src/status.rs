use std::fmt;

use crate::message::{EnergyMessage, LineMessage};

/// Divisor turning raw voltage, current, power and energy into V, A, W and kWh
pub const ENERGY_SCALE: f64 = 10_000.0;

/// Divisor turning the raw frequency into Hz
pub const FREQUENCY_SCALE: f64 = 100.0;

/// The supply line a reading belongs to. Single line models only ever report `L1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    L1,
    L2,
}

impl Line {
    /// The selector value used on the wire
    pub fn index(self) -> u8 {
        match self {
            Line::L1 => 0,
            Line::L2 => 1,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// One complete reading, assembled from an energy message and the line message after it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    pub line: Line,
    /// Hz
    pub frequency: f64,
    /// V
    pub voltage: f64,
    /// A
    pub amperage: f64,
    /// W
    pub watts: f64,
    /// Accumulated energy in kWh
    pub total_watts: f64,
}

impl Status {
    pub(crate) fn new(energy: &EnergyMessage, line: &LineMessage) -> Self {
        Self {
            line: line.line,
            frequency: line.frequency as f64 / FREQUENCY_SCALE,
            voltage: energy.voltage as f64 / ENERGY_SCALE,
            amperage: energy.amperage as f64 / ENERGY_SCALE,
            watts: energy.watts as f64 / ENERGY_SCALE,
            total_watts: energy.total_watts as f64 / ENERGY_SCALE,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}V {}A {}W {}kWh",
            self.voltage, self.amperage, self.watts, self.total_watts
        )
    }
}

#[test]
fn test_status_scaling() {
    let energy = EnergyMessage {
        reserved0: 800,
        voltage: 1217787,
        amperage: 87506,
        watts: 10390169,
        total_watts: 9400,
        reserved1: 0,
    };
    let line = LineMessage { line: Line::L2, frequency: 5998 };

    let status = Status::new(&energy, &line);
    assert_eq!(status.line, Line::L2);
    assert_eq!(status.frequency, 59.98);
    assert_eq!(status.voltage, 121.7787);
    assert_eq!(status.amperage, 8.7506);
    assert_eq!(status.watts, 1039.0169);
    assert_eq!(status.total_watts, 0.94);
}

#[test]
fn test_status_scaling_matches_division() {
    for raw in [0, 1, -1, 9999, 10_000, -123_456, i32::MAX, i32::MIN] {
        let energy = EnergyMessage {
            reserved0: 0,
            voltage: raw,
            amperage: raw,
            watts: raw,
            total_watts: raw,
            reserved1: 0,
        };
        let line = LineMessage { line: Line::L1, frequency: raw };
        let status = Status::new(&energy, &line);
        assert_eq!(status.voltage, raw as f64 / 10000.0);
        assert_eq!(status.amperage, raw as f64 / 10000.0);
        assert_eq!(status.watts, raw as f64 / 10000.0);
        assert_eq!(status.total_watts, raw as f64 / 10000.0);
        assert_eq!(status.frequency, raw as f64 / 100.0);
    }
}

#[test]
fn test_status_display() {
    let status = Status {
        line: Line::L1,
        frequency: 60.05,
        voltage: 120.3108,
        amperage: 8.2695,
        watts: 968.5,
        total_watts: 699.94,
    };
    assert_eq!(status.to_string(), "120.3108V 8.2695A 968.5W 699.94kWh");
    assert_eq!(Line::L2.to_string(), "1");
}
