//! Little-endian binary I/O helpers shared by every on-disk format in this
//! crate (`index.bin` for each index kind, `vectors.bin`).
//!
//! Every format here is hand-rolled rather than routed through a generic
//! serde backend: spec's on-disk layouts are bit-exact byte sequences, not
//! "whatever a derive happens to produce for this struct".

use crate::error::{Error, Result};
use std::io::{Read, Write};

pub(crate) fn write_magic(w: &mut impl Write, magic: &[u8; 4]) -> Result<()> {
    w.write_all(magic)?;
    Ok(())
}

pub(crate) fn read_magic(r: &mut impl Read, expected: &[u8; 4]) -> Result<()> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| Error::Serialization("truncated file: missing magic".to_string()))?;
    if &buf != expected {
        return Err(Error::Serialization(format!(
            "bad magic: expected {expected:?}, got {buf:?}"
        )));
    }
    Ok(())
}

pub(crate) fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| Error::Serialization("truncated file: expected u32".to_string()))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| Error::Serialization("truncated file: expected u64".to_string()))?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn write_f32(w: &mut impl Write, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| Error::Serialization("truncated file: expected f32".to_string()))?;
    Ok(f32::from_le_bytes(buf))
}

pub(crate) fn write_vector(w: &mut impl Write, v: &[f32]) -> Result<()> {
    for &x in v {
        write_f32(w, x)?;
    }
    Ok(())
}

pub(crate) fn read_vector(r: &mut impl Read, dim: usize) -> Result<Vec<f32>> {
    (0..dim).map(|_| read_f32(r)).collect()
}
