//! Positional reads against an opened database.

use memmap2::Mmap;
use std::io;

/// A byte source that answers exact reads at absolute offsets.
///
/// Lookups never share a cursor: every read names its own offset, so one
/// source can serve any number of concurrent lookups.
pub trait ReadAt {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with `UnexpectedEof` when the range runs past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Total length of the source in bytes.
    fn len(&self) -> u64;
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset, buf.len()))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= <[u8]>::len(self))
            .ok_or_else(|| out_of_range(offset, buf.len()))?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }
}

impl ReadAt for Mmap {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self[..].read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        self[..].len() as u64
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

fn out_of_range(offset: u64, len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {} bytes at offset {} runs past end of source", len, offset),
    )
}

/// Read a little-endian u32 at `offset`.
pub(crate) fn read_u32_le<R: ReadAt + ?Sized>(source: &R, offset: u64) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    source.read_at(offset, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_read_at() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut buf = [0u8; 4];
        data.read_at(4, &mut buf).unwrap();
        assert_eq!(buf, [4, 5, 6, 7]);

        data.read_at(12, &mut buf).unwrap();
        assert_eq!(buf, [12, 13, 14, 15]);
    }

    #[test]
    fn test_read_past_end() {
        let data = vec![0u8; 8];
        let mut buf = [0u8; 4];
        let err = data.read_at(6, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = data.read_at(u64::MAX, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        assert_eq!(ReadAt::len(&data), 8);
        assert_eq!(ReadAt::len(&data[..3]), 3);
    }

    #[test]
    fn test_read_u32_le() {
        let data = vec![0xaa, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_u32_le(&data, 1).unwrap(), 0x0403_0201);
        assert!(read_u32_le(&data, 2).is_err());
    }
}
