//! Model persistence.
//!
//! Two formats hold the same [`ModelState`]: a compact binary layout with
//! CQDB string tables, and a zstd-compressed line-oriented text form. Both
//! round-trip exactly. [`load`] tells them apart by their leading bytes.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::ModelState;

pub mod binary;
pub mod text;

const WEIGHTS_MAGIC: &[u8; 4] = b"CRFW";
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// On-disk model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Binary,
    Text,
}

/// Bounds-checked little-endian reader over a byte slice
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::format(format!("unexpected end of data reading {} at byte {}", what, self.pos))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.bytes(4, what)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub(crate) fn f64(&mut self, what: &str) -> Result<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.bytes(8, what)?);
        Ok(f64::from_le_bytes(raw))
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// Inconsistent shapes in a stored model are corruption, not caller error
pub(crate) fn load_error(err: Error) -> Error {
    match err {
        Error::Dimension(msg) | Error::InvalidInput(msg) | Error::Config(msg) => Error::Format(msg),
        err => err,
    }
}

/// Write `state` to `path`
pub fn save<P: AsRef<Path>>(state: &ModelState, path: P, format: Format) -> Result<()> {
    let path = path.as_ref();
    match format {
        Format::Binary => fs::write(path, binary::to_bytes(state)?)?,
        Format::Text => text::write(state, File::create(path)?)?,
    }
    tracing::debug!("saved {:?} model to {}", format, path.display());
    Ok(())
}

/// Read a model from `path`, detecting its format
pub fn load<P: AsRef<Path>>(path: P) -> Result<ModelState> {
    let buf = fs::read(path.as_ref())?;
    if buf.starts_with(&ZSTD_MAGIC) {
        text::read(&buf[..])
    } else {
        binary::from_bytes(&buf)
    }
}

/// Write a flat parameter vector
pub fn write_weights<P: AsRef<Path>>(path: P, values: &[f64]) -> Result<()> {
    let count = u32::try_from(values.len())
        .map_err(|_| Error::InvalidInput(format!("{} weights do not fit the file format", values.len())))?;
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(WEIGHTS_MAGIC)?;
    w.write_all(&count.to_le_bytes())?;
    for value in values {
        w.write_all(&value.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

/// Read a parameter vector written by [`write_weights`]
pub fn read_weights<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let buf = fs::read(path)?;
    let mut reader = Reader::new(&buf);
    if reader.bytes(4, "magic")? != WEIGHTS_MAGIC {
        return Err(Error::format("not a weights file"));
    }
    let count = reader.u32("weight count")? as usize;
    let values = (0..count)
        .map(|_| reader.f64("weight"))
        .collect::<Result<Vec<_>>>()?;
    if !reader.is_done() {
        return Err(Error::format("trailing bytes after weights"));
    }
    Ok(values)
}
