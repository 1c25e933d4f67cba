//! Recognise a Power Watchdog from its advertisement.
//!
//! The device does not expose its identity over GATT. The serial number is the
//! hex tail of the advertised local name (`PMS      025E62E208`) and the
//! hardware revision is packed, together with the company identifier, into
//! the manufacturer specific data.

use std::fmt;
use std::hash::{Hash, Hasher};

use bluest::Uuid;

use crate::advertisement::ManufacturerData;
use crate::uuids;

/// Name prefixes, longest first so that the longest match wins.
const NAME_PREFIXES: [&str; 2] = ["APMS", "PMS"];

/// Prefix used when presenting an identifier to a person.
const LABEL_PREFIX: &str = "APMS";

const MAX_ID: u64 = (1 << 40) - 1;

/// Serial number of a Power Watchdog. Always fits in 40 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl DeviceId {
    pub fn new(raw: u64) -> Option<Self> {
        (raw <= MAX_ID).then_some(Self(raw))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The identifier as printed on the device and shown by the vendor app, e.g. `APMS25E62E208`
    pub fn label(&self) -> String {
        format!("{LABEL_PREFIX}{self}")
    }

    /// Whether `target` names this device, either as bare hex or as a label.
    pub fn matches(&self, target: &str) -> bool {
        let target = target.trim();
        let hex = match target.get(..LABEL_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(LABEL_PREFIX) => &target[LABEL_PREFIX.len()..],
            _ => target,
        };
        parse_hex(hex) == Some(self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareRevision(u64);

impl HardwareRevision {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HardwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Identity of a discovered Power Watchdog. Two identities are equal when their ids are.
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdentity {
    pub id: DeviceId,
    pub hardware_revision: HardwareRevision,
}

impl DeviceIdentity {
    /// Derive the identity from advertisement fields.
    ///
    /// Returns `None` when the advertisement does not belong to a Power Watchdog.
    pub fn from_advertisement(
        name: &str,
        services: &[Uuid],
        manufacturer_data: &ManufacturerData,
    ) -> Option<Self> {
        if services.is_empty() || services.iter().any(|uuid| *uuid != uuids::SERVICE) {
            return None;
        }

        let remainder = NAME_PREFIXES
            .iter()
            .find_map(|prefix| name.strip_prefix(*prefix))?;
        let id = DeviceId::new(parse_hex(remainder.trim())?)?;

        let hardware_revision = hardware_revision(manufacturer_data)?;

        Some(Self { id, hardware_revision })
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Decode the hardware revision from the manufacturer data.
///
/// The first six bytes of the additional data are reversed and followed by the
/// company identifier in big endian order. Those eight bytes are read as a little
/// endian `u64`, printed as 16 hex digits, stripped of trailing zeros and parsed again.
fn hardware_revision(manufacturer_data: &ManufacturerData) -> Option<HardwareRevision> {
    let data = manufacturer_data.data.get(..6)?;
    let company = manufacturer_data.company_id.to_be_bytes();
    let packed = u64::from_le_bytes([
        data[5], data[4], data[3], data[2], data[1], data[0], company[0], company[1],
    ]);

    let hex = format!("{packed:016X}");
    let stripped = hex.trim_end_matches('0');
    parse_hex(stripped).map(HardwareRevision)
}

/// `u64::from_str_radix` also takes a leading `+`; the device never sends one.
fn parse_hex(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

#[cfg(test)]
fn manufacturer_data(company_id: u16, data: &str) -> ManufacturerData {
    ManufacturerData {
        company_id,
        data: hex::decode(data).unwrap(),
    }
}

#[test]
fn test_identity_from_captured_advertisement() {
    let mfr = manufacturer_data(0x9860, "66f25e6200000000000000000000000000000000");
    let identity =
        DeviceIdentity::from_advertisement("PMS      025E62E208        ", &[uuids::SERVICE], &mfr)
            .unwrap();

    assert_eq!(identity.id.raw(), 0x025E62E208);
    assert_eq!(identity.id.raw(), 10_128_297_480);
    assert_eq!(identity.id.to_string(), "25E62E208");
    assert_eq!(identity.id.label(), "APMS25E62E208");
    assert_eq!(identity.hardware_revision.raw(), 0x609866F25E62);
    assert_eq!(identity.hardware_revision.to_string(), "609866F25E62");
}

#[test]
fn test_identity_apms_prefix() {
    let mfr = manufacturer_data(0x9860, "66f25e620000");
    let identity =
        DeviceIdentity::from_advertisement("APMS 25E62E208", &[uuids::SERVICE], &mfr).unwrap();
    assert_eq!(identity.id.raw(), 0x25E62E208);
}

#[test]
fn test_identity_is_deterministic() {
    let mfr = manufacturer_data(0x00ff, "609866f25e62");
    let a = DeviceIdentity::from_advertisement("PMS 0A", &[uuids::SERVICE], &mfr).unwrap();
    let b = DeviceIdentity::from_advertisement("PMS 0A", &[uuids::SERVICE], &mfr).unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.hardware_revision, b.hardware_revision);
    assert_eq!(a.hardware_revision.raw(), 0xFF00609866F25E62);
}

#[test]
fn test_identity_requires_only_the_watchdog_service() {
    let mfr = manufacturer_data(0x9860, "66f25e620000");
    let other = uuids::uuid_from_u16(0x180F);
    assert!(DeviceIdentity::from_advertisement("PMS 1", &[], &mfr).is_none());
    assert!(DeviceIdentity::from_advertisement("PMS 1", &[other], &mfr).is_none());
    assert!(DeviceIdentity::from_advertisement("PMS 1", &[uuids::SERVICE, other], &mfr).is_none());
    assert!(
        DeviceIdentity::from_advertisement("PMS 1", &[uuids::SERVICE, uuids::SERVICE], &mfr)
            .is_some()
    );
}

#[test]
fn test_identity_rejects_bad_names() {
    let mfr = manufacturer_data(0x9860, "66f25e620000");
    let services = [uuids::SERVICE];
    assert!(DeviceIdentity::from_advertisement("XYZ 1234", &services, &mfr).is_none());
    assert!(DeviceIdentity::from_advertisement("PMS", &services, &mfr).is_none());
    assert!(DeviceIdentity::from_advertisement("PMS 12G4", &services, &mfr).is_none());
    assert!(DeviceIdentity::from_advertisement("PMS +1234", &services, &mfr).is_none());
    // more than 40 bits
    assert!(DeviceIdentity::from_advertisement("PMS 10000000000", &services, &mfr).is_none());
}

#[test]
fn test_identity_rejects_short_or_empty_manufacturer_data() {
    let services = [uuids::SERVICE];
    let short = manufacturer_data(0x9860, "66f25e6200");
    assert!(DeviceIdentity::from_advertisement("PMS 1", &services, &short).is_none());

    // nothing left once the trailing zeros are gone
    let zero = manufacturer_data(0x0000, "000000000000");
    assert!(DeviceIdentity::from_advertisement("PMS 1", &services, &zero).is_none());
}

#[test]
fn test_identity_equality_is_by_id() {
    let services = [uuids::SERVICE];
    let first = manufacturer_data(0x9860, "66f25e620000");
    let second = manufacturer_data(0x0001, "010203040506");
    let a = DeviceIdentity::from_advertisement("PMS 1", &services, &first).unwrap();
    let b = DeviceIdentity::from_advertisement("PMS 1", &services, &second).unwrap();
    assert_ne!(a.hardware_revision, b.hardware_revision);
    assert_eq!(a, b);
}

#[test]
fn test_device_id_matches_targets() {
    let id = DeviceId::new(0x25E62E208).unwrap();
    assert!(id.matches("25E62E208"));
    assert!(id.matches("025e62e208"));
    assert!(id.matches("APMS25E62E208"));
    assert!(id.matches("apms25e62e208"));
    assert!(!id.matches("25E62E209"));
    assert!(!id.matches(""));
}
