use std::collections::HashMap;
use std::hash::Hash;

use crate::advertisement::AdvertisementFields;
use crate::identity::DeviceIdentity;

/// Scan results, aggregated per peripheral.
///
/// A peripheral's name and manufacturer data usually arrive in different packets,
/// so every advertisement is merged into what was seen before and identification
/// is retried until it succeeds.
#[derive(Debug)]
pub struct ScanCache<K> {
    entries: HashMap<K, Entry>,
}

#[derive(Debug, Default)]
struct Entry {
    fields: AdvertisementFields,
    identity: Option<DeviceIdentity>,
}

impl<K: Hash + Eq> ScanCache<K> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Merge an advertisement from `peripheral`.
    ///
    /// Returns the identity the first time the peripheral is recognised, `None` otherwise.
    pub fn record(&mut self, peripheral: K, fields: AdvertisementFields) -> Option<DeviceIdentity> {
        let entry = self.entries.entry(peripheral).or_default();
        entry.fields.merge(fields);
        if entry.identity.is_some() {
            return None;
        }
        entry.identity = entry.fields.identify();
        entry.identity
    }

    pub fn identity(&self, peripheral: &K) -> Option<&DeviceIdentity> {
        self.entries.get(peripheral)?.identity.as_ref()
    }

    /// Every peripheral recognised so far
    pub fn identified(&self) -> impl Iterator<Item = (&K, &DeviceIdentity)> {
        self.entries
            .iter()
            .filter_map(|(peripheral, entry)| Some((peripheral, entry.identity.as_ref()?)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Hash + Eq> Default for ScanCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
fn captured() -> (AdvertisementFields, AdvertisementFields) {
    let advertisement = hex::decode("0201060302e0ff17ff609866f25e6200000000000000000000000000000000").unwrap();
    let scan_response = hex::decode("1c09504d53202020202020303235453632453230382020202020202020").unwrap();
    (
        AdvertisementFields::parse(&advertisement).unwrap(),
        AdvertisementFields::parse(&scan_response).unwrap(),
    )
}

#[test]
fn test_identifies_once_both_packets_are_seen() {
    let (advertisement, scan_response) = captured();
    let mut cache = ScanCache::new();

    assert!(cache.record("60:98:66:F2:5E:62", advertisement.clone()).is_none());
    let identity = cache.record("60:98:66:F2:5E:62", scan_response.clone()).unwrap();
    assert_eq!(identity.id.label(), "APMS25E62E208");

    // already reported
    assert!(cache.record("60:98:66:F2:5E:62", advertisement).is_none());
    assert!(cache.record("60:98:66:F2:5E:62", scan_response).is_none());

    assert_eq!(cache.identity(&"60:98:66:F2:5E:62"), Some(&identity));
    assert_eq!(cache.identified().count(), 1);
}

#[test]
fn test_peripherals_are_tracked_separately() {
    let (advertisement, scan_response) = captured();
    let mut cache = ScanCache::new();

    assert!(cache.record(1, advertisement).is_none());
    assert!(cache.record(2, scan_response).is_none());
    assert_eq!(cache.identified().count(), 0);

    cache.clear();
    assert!(cache.identity(&1).is_none());
}
