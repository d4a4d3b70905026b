//! Text object records and their continuations.
//!
//! # Format
//!
//! A TXO record holds an 18-byte fixed part. When text is present, the
//! characters follow in `Continue` records (each opening with a 1-byte
//! high-byte flag, 0 for Windows-1252 bytes and 1 for UTF-16LE), then the
//! formatting runs follow in further `Continue` records as raw bytes. Runs
//! come in 8-byte units and a non-empty text always carries at least two,
//! the closing run pointing one past the last character.
use crate::binary::{decode_windows1252, encode_windows1252, read_u16_le};
use crate::consts::{record_id, MAX_RECORD_DATA};
use crate::error::{DrawingError, Result};
use crate::stream::{PhysicalRecord, RecordSink, RecordSource};

const RUN_SIZE: usize = 8;

/// Text content and formatting attached to a shape.
///
/// Formatting runs are carried verbatim; only their framing is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextObject {
    /// Alignment and locking bits.
    pub flags: u16,
    /// Orientation: 0 none, 1 stacked, 2 rotated 90° ccw, 3 cw.
    pub rot: u16,
    /// Font index used when the text is empty.
    pub ifnt_empty: u16,
    pub text: String,
    /// Formatting runs, a multiple of 8 bytes.
    pub runs: Vec<u8>,
}

impl Default for TextObject {
    fn default() -> Self {
        Self {
            // top-left alignment with the text locked
            flags: 0x0212,
            rot: 0,
            ifnt_empty: 0,
            text: String::new(),
            runs: Vec::new(),
        }
    }
}

impl TextObject {
    pub const FIXED_SIZE: usize = 18;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Character count as stored on the wire.
    fn unit_count(&self) -> usize {
        self.text.encode_utf16().count()
    }

    /// Reads a text object from the fixed part of a TXO record, pulling
    /// character and run continuations from the surrounding stream.
    pub fn read(fixed: &[u8], source: &mut dyn RecordSource) -> Result<Self> {
        if fixed.len() < Self::FIXED_SIZE {
            return Err(DrawingError::corrupt(format!(
                "text object record needs {} bytes, found {}",
                Self::FIXED_SIZE,
                fixed.len()
            )));
        }
        let flags = read_u16_le(fixed, 0)?;
        let rot = read_u16_le(fixed, 2)?;
        let cch = read_u16_le(fixed, 10)? as usize;
        let cb_runs = read_u16_le(fixed, 12)? as usize;
        let ifnt_empty = read_u16_le(fixed, 14)?;

        if cch == 0 {
            if cb_runs != 0 {
                return Err(DrawingError::corrupt(
                    "text object declares formatting runs without text",
                ));
            }
            return Ok(Self {
                flags,
                rot,
                ifnt_empty,
                ..Self::default()
            });
        }
        if cb_runs < 2 * RUN_SIZE || cb_runs % RUN_SIZE != 0 {
            return Err(DrawingError::corrupt(format!(
                "text object run size {cb_runs} is not a valid run list"
            )));
        }

        let text = read_chars(source, cch)?;
        let runs = read_runs(source, cb_runs)?;
        Ok(Self {
            flags,
            rot,
            ifnt_empty,
            text,
            runs,
        })
    }

    /// Emits the TXO record and its continuations.
    pub fn write(&self, sink: &mut dyn RecordSink) -> Result<()> {
        let units = self.unit_count();
        if units > u16::MAX as usize {
            return Err(DrawingError::TextTooLong { units });
        }
        let cch = units as u16;
        let runs = self.effective_runs(cch);

        let mut fixed = Vec::with_capacity(Self::FIXED_SIZE);
        fixed.extend_from_slice(&self.flags.to_le_bytes());
        fixed.extend_from_slice(&self.rot.to_le_bytes());
        fixed.extend_from_slice(&[0u8; 6]);
        fixed.extend_from_slice(&cch.to_le_bytes());
        fixed.extend_from_slice(&(runs.len() as u16).to_le_bytes());
        fixed.extend_from_slice(&self.ifnt_empty.to_le_bytes());
        fixed.extend_from_slice(&[0u8; 2]);
        sink.write_record(record_id::TXO, &fixed)?;

        if cch == 0 {
            return Ok(());
        }
        self.write_chars(sink)?;
        for chunk in runs.chunks(MAX_RECORD_DATA) {
            sink.write_record(record_id::CONTINUE, chunk)?;
        }
        Ok(())
    }

    fn write_chars(&self, sink: &mut dyn RecordSink) -> Result<()> {
        match encode_windows1252(&self.text) {
            Some(bytes) => {
                for chunk in bytes.chunks(MAX_RECORD_DATA - 1) {
                    let mut payload = Vec::with_capacity(1 + chunk.len());
                    payload.push(0u8);
                    payload.extend_from_slice(chunk);
                    sink.write_record(record_id::CONTINUE, &payload)?;
                }
            }
            None => {
                let bytes: Vec<u8> = self
                    .text
                    .encode_utf16()
                    .flat_map(u16::to_le_bytes)
                    .collect();
                // fragments carry whole UTF-16 units
                let chunk_size = (MAX_RECORD_DATA - 1) & !1;
                for chunk in bytes.chunks(chunk_size) {
                    let mut payload = Vec::with_capacity(1 + chunk.len());
                    payload.push(1u8);
                    payload.extend_from_slice(chunk);
                    sink.write_record(record_id::CONTINUE, &payload)?;
                }
            }
        }
        Ok(())
    }

    /// Stored runs when they frame correctly, otherwise the minimal pair of
    /// runs covering the whole text.
    fn effective_runs(&self, cch: u16) -> Vec<u8> {
        if cch == 0 {
            return Vec::new();
        }
        if self.runs.len() >= 2 * RUN_SIZE && self.runs.len() % RUN_SIZE == 0 {
            return self.runs.clone();
        }
        let mut runs = vec![0u8; 2 * RUN_SIZE];
        runs[RUN_SIZE..RUN_SIZE + 2].copy_from_slice(&cch.to_le_bytes());
        runs
    }
}

/// Pulls character continuations until `cch` UTF-16 units are collected.
///
/// Units accumulate across fragments before decoding, so a surrogate pair
/// split over two continuations survives.
fn read_chars(source: &mut dyn RecordSource, cch: usize) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(cch);
    while units.len() < cch {
        let fragment = pull_continue(source, "characters")?;
        let Some((&flag, body)) = fragment.data.split_first() else {
            return Err(DrawingError::corrupt("text continuation record is empty"));
        };
        let count = match flag {
            0 => body.len(),
            1 => {
                if body.len() % 2 != 0 {
                    return Err(DrawingError::corrupt(
                        "UTF-16 text continuation has an odd byte count",
                    ));
                }
                body.len() / 2
            }
            other => {
                return Err(DrawingError::corrupt(format!(
                    "text continuation flag {other} is not 0 or 1"
                )))
            }
        };
        if count == 0 || units.len() + count > cch {
            return Err(DrawingError::corrupt(
                "text continuation does not match the declared character count",
            ));
        }
        if flag == 0 {
            units.extend(decode_windows1252(body).encode_utf16());
        } else {
            units.extend(
                body.chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
            );
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

fn read_runs(source: &mut dyn RecordSource, cb_runs: usize) -> Result<Vec<u8>> {
    let mut runs = Vec::with_capacity(cb_runs);
    while runs.len() < cb_runs {
        let fragment = pull_continue(source, "formatting runs")?;
        if runs.len() + fragment.data.len() > cb_runs {
            return Err(DrawingError::corrupt(
                "formatting run continuation overruns the declared size",
            ));
        }
        runs.extend_from_slice(&fragment.data);
    }
    Ok(runs)
}

fn pull_continue(source: &mut dyn RecordSource, what: &str) -> Result<PhysicalRecord> {
    match source.peek_id()? {
        Some(record_id::CONTINUE) => source
            .next_record()?
            .ok_or_else(|| DrawingError::corrupt("record stream ended unexpectedly")),
        Some(other) => Err(DrawingError::corrupt(format!(
            "text object {what} interrupted by record 0x{other:04X}"
        ))),
        None => Err(DrawingError::corrupt(format!(
            "record stream ended before the text object {what}"
        ))),
    }
}
