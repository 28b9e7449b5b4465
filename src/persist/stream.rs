//! Record stream primitives
//!
//! The codec only talks to [`RecordWriter`] and [`RecordReader`]. Hosts
//! back them with their own save files; [`MemoryStream`] keeps everything in
//! a byte buffer. Integers and floats are little-endian, strings are a u16
//! length followed by raw bytes.

use crate::error::{DynvarError, Result};

/// Four-byte record type
pub type RecordTag = [u8; 4];

/// Size of the tag + version + length prefix of every record
const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: RecordTag,
    pub version: u32,
    pub length: u32,
}

pub trait RecordWriter {
    /// Start a new record; later writes land in it
    fn open_record(&mut self, tag: RecordTag, version: u32) -> Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| {
            DynvarError::Format(format!("string of {} bytes is too long to save", value.len()))
        })?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes())
    }
}

pub trait RecordReader {
    /// Advance to the next record, skipping whatever of the current one was
    /// not read. `None` at the end of the stream.
    fn next_record(&mut self) -> Result<Option<RecordHeader>>;

    /// Fill `buf` from the current record
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Offset where the next record starts
    fn position(&self) -> u64;

    /// Return to an offset from [`RecordReader::position`]
    fn seek(&mut self, position: u64) -> Result<()>;

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Read a length-prefixed string. Bytes that are not UTF-8 are replaced.
    fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}

/// In-memory record stream, used for both writing and reading
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
    buf: Vec<u8>,
    /// Read cursor
    pos: usize,
    /// End of the record being read
    record_end: usize,
    /// Offset of the length field of the record being written
    open: Option<usize>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap saved bytes for reading
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self {
            buf,
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}

impl RecordWriter for MemoryStream {
    fn open_record(&mut self, tag: RecordTag, version: u32) -> Result<()> {
        self.buf.extend_from_slice(&tag);
        self.buf.extend_from_slice(&version.to_le_bytes());
        self.open = Some(self.buf.len());
        self.buf.extend_from_slice(&0u32.to_le_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(len_at) = self.open else {
            return Err(DynvarError::Format("write outside of a record".to_string()));
        };
        self.buf.extend_from_slice(bytes);

        let length = self.buf.len() - len_at - 4;
        let length = u32::try_from(length)
            .map_err(|_| DynvarError::Format("record exceeds 4 GiB".to_string()))?;
        self.buf[len_at..len_at + 4].copy_from_slice(&length.to_le_bytes());
        Ok(())
    }
}

impl RecordReader for MemoryStream {
    fn next_record(&mut self) -> Result<Option<RecordHeader>> {
        self.pos = self.record_end;
        if self.pos == self.buf.len() {
            return Ok(None);
        }
        if self.buf.len() - self.pos < HEADER_LEN {
            return Err(DynvarError::Format(format!(
                "truncated record header at offset {}",
                self.pos
            )));
        }

        let tag = self.take::<4>()?;
        let version = u32::from_le_bytes(self.take::<4>()?);
        let length = u32::from_le_bytes(self.take::<4>()?);

        let end = self.pos + length as usize;
        if end > self.buf.len() {
            return Err(DynvarError::Format(format!(
                "record {} overruns the stream",
                String::from_utf8_lossy(&tag)
            )));
        }
        self.record_end = end;
        Ok(Some(RecordHeader { tag, version, length }))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.pos + buf.len() > self.record_end {
            return Err(DynvarError::Format("read past the end of a record".to_string()));
        }
        buf.copy_from_slice(&self.buf[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn position(&self) -> u64 {
        self.record_end as u64
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let position = usize::try_from(position)
            .ok()
            .filter(|&p| p <= self.buf.len())
            .ok_or_else(|| DynvarError::Format(format!("seek to {} is out of range", position)))?;
        self.pos = position;
        self.record_end = position;
        Ok(())
    }
}
