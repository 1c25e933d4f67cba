use bluest::Uuid;

use crate::error::AdvertisementError;
use crate::identity::DeviceIdentity;
use crate::uuids;

const AD_INCOMPLETE_UUID16: u8 = 0x02;
const AD_COMPLETE_UUID16: u8 = 0x03;
const AD_INCOMPLETE_UUID32: u8 = 0x04;
const AD_COMPLETE_UUID32: u8 = 0x05;
const AD_INCOMPLETE_UUID128: u8 = 0x06;
const AD_COMPLETE_UUID128: u8 = 0x07;
const AD_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_MANUFACTURER_DATA: u8 = 0xFF;

/// Manufacturer specific data from an advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

impl From<bluest::ManufacturerData> for ManufacturerData {
    fn from(value: bluest::ManufacturerData) -> Self {
        Self {
            company_id: value.company_id,
            data: value.data,
        }
    }
}

/// The advertisement fields needed to recognise a Power Watchdog.
///
/// The device splits them over two packets: the advertisement carries the service
/// list and manufacturer data, the scan response carries the local name. Use
/// [`AdvertisementFields::merge`] to combine them before calling
/// [`AdvertisementFields::identify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementFields {
    pub local_name: Option<String>,
    pub services: Vec<Uuid>,
    pub manufacturer_data: Option<ManufacturerData>,
}

impl AdvertisementFields {
    /// Parse a raw advertising or scan response payload made of AD structures.
    ///
    /// Structure | Size
    /// length    | 1     (counts the type byte and the body)
    /// type      | 1
    /// body      | length - 1
    ///
    /// A zero length byte marks the start of padding and ends the payload.
    pub fn parse(payload: &[u8]) -> Result<Self, AdvertisementError> {
        let mut fields = Self::default();
        let mut offset = 0;

        while offset < payload.len() {
            let len = payload[offset] as usize;
            if len == 0 {
                break;
            }
            let end = offset + 1 + len;
            if end > payload.len() {
                return Err(AdvertisementError::Truncated { offset });
            }
            let ad_type = payload[offset + 1];
            let body = &payload[offset + 2..end];

            match ad_type {
                AD_INCOMPLETE_UUID16 | AD_COMPLETE_UUID16 => {
                    let found = uuid_list(body, 2, offset)?
                        .map(|c| uuids::uuid_from_u16(u16::from_le_bytes([c[0], c[1]])));
                    fields.add_services(found);
                }
                AD_INCOMPLETE_UUID32 | AD_COMPLETE_UUID32 => {
                    let found = uuid_list(body, 4, offset)?.map(|c| {
                        uuids::uuid_from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    });
                    fields.add_services(found);
                }
                AD_INCOMPLETE_UUID128 | AD_COMPLETE_UUID128 => {
                    let found = uuid_list(body, 16, offset)?.map(|c| {
                        let mut bytes = [0u8; 16];
                        bytes.copy_from_slice(c);
                        bytes.reverse();
                        Uuid::from_bytes(bytes)
                    });
                    fields.add_services(found);
                }
                AD_SHORTENED_LOCAL_NAME | AD_COMPLETE_LOCAL_NAME => {
                    fields.local_name = Some(String::from_utf8_lossy(body).into_owned());
                }
                AD_MANUFACTURER_DATA => {
                    if body.len() < 2 {
                        return Err(AdvertisementError::Malformed { offset });
                    }
                    fields.manufacturer_data = Some(ManufacturerData {
                        company_id: u16::from_le_bytes([body[0], body[1]]),
                        data: body[2..].to_vec(),
                    });
                }
                _ => {}
            }

            offset = end;
        }

        Ok(fields)
    }

    /// Fold a later advertisement into this one. Newer names and manufacturer data
    /// replace older ones, service lists accumulate.
    pub fn merge(&mut self, newer: AdvertisementFields) {
        if newer.local_name.is_some() {
            self.local_name = newer.local_name;
        }
        if newer.manufacturer_data.is_some() {
            self.manufacturer_data = newer.manufacturer_data;
        }
        self.add_services(newer.services);
    }

    pub fn identify(&self) -> Option<DeviceIdentity> {
        let name = self.local_name.as_deref()?;
        let manufacturer_data = self.manufacturer_data.as_ref()?;
        DeviceIdentity::from_advertisement(name, &self.services, manufacturer_data)
    }

    fn add_services(&mut self, services: impl IntoIterator<Item = Uuid>) {
        for uuid in services {
            if !self.services.contains(&uuid) {
                self.services.push(uuid);
            }
        }
    }
}

impl From<bluest::AdvertisementData> for AdvertisementFields {
    fn from(value: bluest::AdvertisementData) -> Self {
        let mut fields = Self {
            local_name: value.local_name,
            services: Vec::with_capacity(value.services.len()),
            manufacturer_data: value.manufacturer_data.map(Into::into),
        };
        fields.add_services(value.services);
        fields
    }
}

fn uuid_list(
    body: &[u8],
    width: usize,
    offset: usize,
) -> Result<std::slice::ChunksExact<'_, u8>, AdvertisementError> {
    if body.len() % width != 0 {
        return Err(AdvertisementError::Malformed { offset });
    }
    Ok(body.chunks_exact(width))
}

// Captured from a Power Watchdog with public address 60:98:66:F2:5E:62
#[cfg(test)]
const CAPTURED_ADVERTISEMENT: &str =
    "0201060302e0ff17ff609866f25e6200000000000000000000000000000000";
#[cfg(test)]
const CAPTURED_SCAN_RESPONSE: &str =
    "1c09504d53202020202020303235453632453230382020202020202020";

#[test]
fn test_parse_captured_advertisement() {
    let payload = hex::decode(CAPTURED_ADVERTISEMENT).unwrap();
    let fields = AdvertisementFields::parse(&payload).unwrap();

    assert_eq!(fields.local_name, None);
    assert_eq!(fields.services, vec![uuids::SERVICE]);
    let mfr = fields.manufacturer_data.unwrap();
    assert_eq!(mfr.company_id, 0x9860);
    assert_eq!(mfr.data.len(), 20);
    assert_eq!(&mfr.data[..6], &[0x66, 0xF2, 0x5E, 0x62, 0x00, 0x00]);
}

#[test]
fn test_parse_captured_scan_response() {
    let payload = hex::decode(CAPTURED_SCAN_RESPONSE).unwrap();
    let fields = AdvertisementFields::parse(&payload).unwrap();

    assert_eq!(fields.local_name.as_deref(), Some("PMS      025E62E208        "));
    assert!(fields.services.is_empty());
    assert!(fields.manufacturer_data.is_none());
}

#[test]
fn test_identify_after_merging_scan_response() {
    let mut fields =
        AdvertisementFields::parse(&hex::decode(CAPTURED_ADVERTISEMENT).unwrap()).unwrap();
    assert!(fields.identify().is_none());

    let response =
        AdvertisementFields::parse(&hex::decode(CAPTURED_SCAN_RESPONSE).unwrap()).unwrap();
    fields.merge(response);

    let identity = fields.identify().unwrap();
    assert_eq!(identity.id.raw(), 0x025E62E208);
    assert_eq!(identity.id.label(), "APMS25E62E208");
    assert_eq!(identity.hardware_revision.raw(), 0x609866F25E62);
}

#[test]
fn test_merge_keeps_older_fields_when_newer_lack_them() {
    let mut fields = AdvertisementFields {
        local_name: Some("PMS 1".into()),
        services: vec![uuids::SERVICE],
        manufacturer_data: Some(ManufacturerData { company_id: 1, data: vec![1] }),
    };
    fields.merge(AdvertisementFields {
        local_name: None,
        services: vec![uuids::SERVICE, uuids::uuid_from_u16(0x180F)],
        manufacturer_data: None,
    });

    assert_eq!(fields.local_name.as_deref(), Some("PMS 1"));
    assert_eq!(fields.services, vec![uuids::SERVICE, uuids::uuid_from_u16(0x180F)]);
    assert_eq!(fields.manufacturer_data.unwrap().company_id, 1);
}

#[test]
fn test_parse_128_bit_uuid_list() {
    // 0000ffe0-0000-1000-8000-00805f9b34fb in air order
    let payload = hex::decode("1107fb349b5f8000008000100000e0ff0000").unwrap();
    let fields = AdvertisementFields::parse(&payload).unwrap();
    assert_eq!(fields.services, vec![uuids::SERVICE]);
}

#[test]
fn test_parse_32_bit_uuid_list() {
    let payload = hex::decode("0505e0ff0000").unwrap();
    let fields = AdvertisementFields::parse(&payload).unwrap();
    assert_eq!(fields.services, vec![uuids::SERVICE]);
}

#[test]
fn test_parse_rejects_truncated_structure() {
    let payload = hex::decode("020106051234").unwrap();
    assert_eq!(
        AdvertisementFields::parse(&payload),
        Err(AdvertisementError::Truncated { offset: 3 })
    );
}

#[test]
fn test_parse_rejects_odd_uuid16_list() {
    let payload = hex::decode("0403e0ff12").unwrap();
    assert_eq!(
        AdvertisementFields::parse(&payload),
        Err(AdvertisementError::Malformed { offset: 0 })
    );
}

#[test]
fn test_parse_skips_unknown_types() {
    let payload = hex::decode("020a040302e0ff").unwrap();
    let fields = AdvertisementFields::parse(&payload).unwrap();
    assert_eq!(fields.services, vec![uuids::SERVICE]);
}
