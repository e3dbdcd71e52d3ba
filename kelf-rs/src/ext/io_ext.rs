use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

/// A trait that reads fixed and bounded byte runs from any `Read` type.
pub trait ArrayReadExt: Read {
    /// Reads exactly `N` bytes.
    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]>;

    /// Reads exactly `length` bytes into a new buffer, failing instead of aborting
    /// when the allocation cannot be made.
    fn read_vec(&mut self, length: usize) -> io::Result<Vec<u8>>;
}

impl<T> ArrayReadExt for T
where
    T: Read,
{
    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut result = [0u8; N];
        self.read_exact(&mut result)?;
        Ok(result)
    }

    fn read_vec(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let mut result: Vec<u8> = Vec::new();

        result
            .try_reserve_exact(length)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        result.resize(length, 0);

        self.read_exact(&mut result)?;

        Ok(result)
    }
}

/// Utility methods for working with seekable streams.
pub trait SeekExt: Seek {
    /// Number of bytes between the current position and the end of the stream.
    fn remaining(&mut self) -> io::Result<u64>;
}

impl<T> SeekExt for T
where
    T: Seek,
{
    fn remaining(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end.saturating_sub(pos))
    }
}
