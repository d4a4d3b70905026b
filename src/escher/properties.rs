//! Shape property bag (Opt record).
//!
//! Properties control shape appearance and identity. Based on MS-ODRAW
//! section 2.3.
//!
//! # Complex Properties
//!
//! Properties are simple (4-byte value) or complex (variable-length data).
//! Parsing is two-pass: first the 6-byte property headers, then the complex
//! data that follows them in header order. The wire order is ascending by
//! property number and mutation keeps it that way, so an untouched bag
//! re-encodes byte for byte.
use crate::binary::{parse_utf16le_string, read_i32_le, read_u16_le, utf16le_bytes_nul};
use crate::error::{DrawingError, Result};
use smallvec::SmallVec;

const IS_COMPLEX: u16 = 0x8000;
const PROPERTY_ID_MASK: u16 = 0x3FFF;

/// Property identifiers used by worksheet shapes.
///
/// The pib id carries the blip-id flag (0x4000) in its wire form.
pub mod prop_id {
    /// Lock flag group (fLockAgainstGrouping and friends).
    pub const PROTECTION_BOOLEANS: u16 = 0x007F;
    /// Text id for shapes with an attached text object.
    pub const TXID: u16 = 0x0080;
    /// 1-based index of the shape's picture in the blip store.
    pub const BLIP_TO_DISPLAY: u16 = 0x4104;
    /// Fill color.
    pub const FILL_COLOR: u16 = 0x0181;
    /// Fill hit-test flag group.
    pub const FILL_BOOLEANS: u16 = 0x01BF;
    /// Line color.
    pub const LINE_COLOR: u16 = 0x01C0;
    /// Shadow flag group.
    pub const SHADOW_BOOLEANS: u16 = 0x023F;
    /// Shape name, complex UTF-16LE with a null terminator.
    pub const GROUP_NAME: u16 = 0x0380;
    /// Group shape flag group (fPrint and friends).
    pub const GROUP_SHAPE_BOOLEANS: u16 = 0x03BF;
}

/// One property: wire id (flag bits included), simple value, optional
/// complex payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub raw_id: u16,
    pub value: i32,
    pub complex: Option<Vec<u8>>,
}

impl PropertyEntry {
    #[inline]
    pub fn number(&self) -> u16 {
        self.raw_id & PROPERTY_ID_MASK
    }
}

/// Mutable property collection backing one Opt record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeProperties {
    entries: SmallVec<[PropertyEntry; 4]>,
}

impl ShapeProperties {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an Opt payload. `instance` is the property count from the
    /// record header.
    pub fn parse(instance: u16, data: &[u8]) -> Result<Self> {
        let count = instance as usize;
        let header_size = count * 6;
        if header_size > data.len() {
            return Err(DrawingError::corrupt(format!(
                "Opt record declares {count} properties but holds {} bytes",
                data.len()
            )));
        }

        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let offset = i * 6;
            let raw_id = read_u16_le(data, offset)?;
            let value = read_i32_le(data, offset + 2)?;
            headers.push((raw_id, value));
        }

        let mut entries = SmallVec::with_capacity(count);
        let mut complex_offset = header_size;
        for (raw_id, value) in headers {
            let complex = if raw_id & IS_COMPLEX != 0 {
                let len = value as usize;
                let end = complex_offset + len;
                if end > data.len() {
                    return Err(DrawingError::corrupt(format!(
                        "Opt property 0x{raw_id:04X} complex data overruns the record"
                    )));
                }
                let span = data[complex_offset..end].to_vec();
                complex_offset = end;
                Some(span)
            } else {
                None
            };
            entries.push(PropertyEntry {
                raw_id,
                value,
                complex,
            });
        }

        Ok(Self { entries })
    }

    /// Number of properties (the Opt record's instance field).
    #[inline]
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Payload size when encoded.
    pub fn wire_size(&self) -> usize {
        self.entries
            .iter()
            .map(|e| 6 + e.complex.as_ref().map_or(0, Vec::len))
            .sum()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            out.extend_from_slice(&entry.raw_id.to_le_bytes());
            let value = match &entry.complex {
                Some(data) => data.len() as i32,
                None => entry.value,
            };
            out.extend_from_slice(&value.to_le_bytes());
        }
        for entry in &self.entries {
            if let Some(data) = &entry.complex {
                out.extend_from_slice(data);
            }
        }
    }

    fn find(&self, id: u16) -> Option<usize> {
        let number = id & PROPERTY_ID_MASK;
        self.entries.iter().position(|e| e.number() == number)
    }

    #[inline]
    pub fn get(&self, id: u16) -> Option<i32> {
        self.find(id).map(|i| self.entries[i].value)
    }

    #[inline]
    pub fn get_complex(&self, id: u16) -> Option<&[u8]> {
        self.find(id)
            .and_then(|i| self.entries[i].complex.as_deref())
    }

    /// Insert or replace a simple property, keeping ascending id order.
    pub fn set_simple(&mut self, id: u16, value: i32) {
        self.upsert(PropertyEntry {
            raw_id: id,
            value,
            complex: None,
        });
    }

    /// Insert or replace a complex property, keeping ascending id order.
    pub fn set_complex(&mut self, id: u16, data: Vec<u8>) {
        self.upsert(PropertyEntry {
            raw_id: id | IS_COMPLEX,
            value: data.len() as i32,
            complex: Some(data),
        });
    }

    fn upsert(&mut self, entry: PropertyEntry) {
        match self.find(entry.raw_id) {
            Some(i) => self.entries[i] = entry,
            None => {
                let number = entry.number();
                let at = self
                    .entries
                    .iter()
                    .position(|e| e.number() > number)
                    .unwrap_or(self.entries.len());
                self.entries.insert(at, entry);
            }
        }
    }

    pub fn remove(&mut self, id: u16) -> bool {
        match self.find(id) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Shape name from the wzName property.
    pub fn name(&self) -> Option<String> {
        self.get_complex(prop_id::GROUP_NAME)
            .map(parse_utf16le_string)
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_complex(prop_id::GROUP_NAME, utf16le_bytes_nul(name));
    }

    /// 1-based blip store index of a picture shape.
    pub fn blip_id(&self) -> Option<u32> {
        self.get(prop_id::BLIP_TO_DISPLAY).map(|v| v as u32)
    }

    pub fn set_blip_id(&mut self, blip_id: u32) {
        self.set_simple(prop_id::BLIP_TO_DISPLAY, blip_id as i32);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Vec<u8> {
        // fLockAgainstGrouping group, then a complex name "Ok"
        let mut data = Vec::new();
        data.extend_from_slice(&0x007Fu16.to_le_bytes());
        data.extend_from_slice(&0x01000100i32.to_le_bytes());
        data.extend_from_slice(&(0x0380u16 | 0x8000).to_le_bytes());
        data.extend_from_slice(&6i32.to_le_bytes());
        data.extend_from_slice(&[b'O', 0, b'k', 0, 0, 0]);
        data
    }

    #[test]
    fn test_parse_simple_and_complex() {
        let props = ShapeProperties::parse(2, &sample_payload()).unwrap();
        assert_eq!(props.count(), 2);
        assert_eq!(props.get(prop_id::PROTECTION_BOOLEANS), Some(0x01000100));
        assert_eq!(props.name().as_deref(), Some("Ok"));
    }

    #[test]
    fn test_round_trip_preserves_bytes() {
        let payload = sample_payload();
        let props = ShapeProperties::parse(2, &payload).unwrap();
        let mut out = Vec::new();
        props.write_to(&mut out);
        assert_eq!(out, payload);
        assert_eq!(props.wire_size(), payload.len());
    }

    #[test]
    fn test_complex_overrun_is_corrupt() {
        let mut payload = sample_payload();
        payload.truncate(payload.len() - 2);
        assert!(ShapeProperties::parse(2, &payload).is_err());
    }

    #[test]
    fn test_set_keeps_ascending_order() {
        let mut props = ShapeProperties::new();
        props.set_name("Check Box 1");
        props.set_blip_id(3);
        props.set_simple(prop_id::PROTECTION_BOOLEANS, 1);

        let numbers: Vec<u16> = props.iter().map(|e| e.number()).collect();
        assert_eq!(numbers, vec![0x007F, 0x0104, 0x0380]);
    }

    #[test]
    fn test_set_name_replaces() {
        let mut props = ShapeProperties::new();
        props.set_name("Old");
        props.set_name("New");
        assert_eq!(props.count(), 1);
        assert_eq!(props.name().as_deref(), Some("New"));
    }

    #[test]
    fn test_blip_id_carries_flag_bits() {
        let mut props = ShapeProperties::new();
        props.set_blip_id(7);
        let entry = props.iter().next().unwrap();
        assert_eq!(entry.raw_id, 0x4104);
        assert_eq!(props.blip_id(), Some(7));
    }

    #[test]
    fn test_remove() {
        let mut props = ShapeProperties::new();
        props.set_name("Temp");
        assert!(props.remove(prop_id::GROUP_NAME));
        assert!(!props.remove(prop_id::GROUP_NAME));
        assert!(props.is_empty());
    }
}
