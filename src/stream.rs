//! Record-stream seams between the drawing subsystem and the workbook codec.
//!
//! The surrounding workbook reader owns record boundaries; this crate only
//! pulls the records that belong to a drawing stream and pushes them back out
//! on save. Both directions go through narrow traits so the host can plug in
//! its own stream handling.
//!
//! # Format
//!
//! A physical BIFF record is a 4-byte header (u16 id, u16 data length, little
//! endian) followed by the data bytes. Payloads never exceed
//! [`MAX_RECORD_DATA`](crate::consts::MAX_RECORD_DATA); larger content spills
//! into Continue records.
use crate::binary::read_u16_le;
use crate::error::{DrawingError, Result};
use bytes::Bytes;

/// One physical record pulled from the workbook stream.
#[derive(Debug, Clone)]
pub struct PhysicalRecord {
    pub id: u16,
    pub data: Bytes,
}

/// Pull seam: the workbook reader hands the loader one record at a time.
///
/// `peek_id` lets the loader decide whether the next record still belongs to
/// the drawing stream without consuming it.
pub trait RecordSource {
    /// Record id of the next record, or `None` at end of stream.
    fn peek_id(&mut self) -> Result<Option<u16>>;

    /// Consume and return the next record, or `None` at end of stream.
    fn next_record(&mut self) -> Result<Option<PhysicalRecord>>;
}

/// Push seam: the saver emits record headers and data through the workbook
/// writer.
pub trait RecordSink {
    /// Write a 4-byte record header.
    fn write_header(&mut self, id: u16, len: u16) -> Result<()>;

    /// Write record data following a header.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Current byte position in the output stream.
    fn position(&self) -> u64;

    /// Write a complete record (header plus data).
    fn write_record(&mut self, id: u16, data: &[u8]) -> Result<()> {
        self.write_header(id, data.len() as u16)?;
        self.write(data)
    }
}

/// [`RecordSource`] over an in-memory BIFF record stream.
pub struct SliceSource {
    data: Bytes,
    pos: usize,
}

impl SliceSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Byte offset of the next unread record header.
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl RecordSource for SliceSource {
    fn peek_id(&mut self) -> Result<Option<u16>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        read_u16_le(&self.data, self.pos).map(Some)
    }

    fn next_record(&mut self) -> Result<Option<PhysicalRecord>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        if self.pos + 4 > self.data.len() {
            return Err(DrawingError::corrupt(format!(
                "truncated record header at offset {}",
                self.pos
            )));
        }
        let id = read_u16_le(&self.data, self.pos)?;
        let len = read_u16_le(&self.data, self.pos + 2)? as usize;
        let start = self.pos + 4;
        let end = start + len;
        if end > self.data.len() {
            return Err(DrawingError::corrupt(format!(
                "record 0x{id:04X} at offset {} declares {len} bytes past end of stream",
                self.pos
            )));
        }
        self.pos = end;
        Ok(Some(PhysicalRecord {
            id,
            data: self.data.slice(start..end),
        }))
    }
}

/// [`RecordSink`] collecting output into a byte vector.
#[derive(Default)]
pub struct VecSink {
    buffer: Vec<u8>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

impl RecordSink for VecSink {
    fn write_header(&mut self, id: u16, len: u16) -> Result<()> {
        self.buffer.extend_from_slice(&id.to_le_bytes());
        self.buffer.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buffer.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_slice_source_walks_records() {
        let mut stream = record(0x00EC, &[1, 2, 3]);
        stream.extend(record(0x003C, &[4, 5]));
        let mut source = SliceSource::new(stream);

        assert_eq!(source.peek_id().unwrap(), Some(0x00EC));
        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.id, 0x00EC);
        assert_eq!(&first.data[..], &[1, 2, 3]);

        assert_eq!(source.peek_id().unwrap(), Some(0x003C));
        let second = source.next_record().unwrap().unwrap();
        assert_eq!(&second.data[..], &[4, 5]);

        assert_eq!(source.peek_id().unwrap(), None);
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_slice_source_rejects_truncated_payload() {
        let mut stream = record(0x00EC, &[1, 2, 3]);
        stream.truncate(stream.len() - 1);
        let mut source = SliceSource::new(stream);
        assert!(source.next_record().is_err());
    }

    #[test]
    fn test_vec_sink_round_trip() {
        let mut sink = VecSink::new();
        sink.write_record(0x005D, &[9, 8, 7]).unwrap();
        assert_eq!(sink.position(), 7);

        let mut source = SliceSource::new(sink.into_bytes());
        let rec = source.next_record().unwrap().unwrap();
        assert_eq!(rec.id, 0x005D);
        assert_eq!(&rec.data[..], &[9, 8, 7]);
    }
}
