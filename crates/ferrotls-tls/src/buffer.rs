//! Cursored byte buffer backing all wire I/O and crypto staging.
//!
//! A `ByteBuffer` is a linear arena with a read cursor, a write cursor, and
//! a high-water mark: `read <= write <= high_water <= capacity`. Wire reads
//! that arrive in pieces accumulate behind the write cursor; parsers consume
//! from the read cursor. Zero-copy windows hand out slices of the interior
//! and taint the buffer, which from then on refuses to grow, so a window
//! can never be invalidated by reallocation.

use ferrotls_types::TlsError;
use zeroize::Zeroize;

/// Growable/fixed byte arena with independent read and write cursors.
#[derive(Debug)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
    high_water: usize,
    growable: bool,
    tainted: bool,
}

impl ByteBuffer {
    /// A growable buffer with the given initial capacity.
    pub fn with_capacity(initial: usize) -> Self {
        Self {
            data: vec![0u8; initial],
            read: 0,
            write: 0,
            high_water: 0,
            growable: true,
            tainted: false,
        }
    }

    /// A fixed-size buffer that will never reallocate.
    pub fn fixed(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
            read: 0,
            write: 0,
            high_water: 0,
            growable: false,
            tainted: false,
        }
    }

    /// A pre-filled, non-growable buffer holding a copy of `src`, ready to
    /// read. Marked tainted so it can never be resized.
    pub fn read_only(src: &[u8]) -> Self {
        Self {
            data: src.to_vec(),
            read: 0,
            write: src.len(),
            high_water: src.len(),
            growable: false,
            tainted: true,
        }
    }

    /// Bytes available between the read and write cursors.
    pub fn data_available(&self) -> usize {
        self.write - self.read
    }

    /// Bytes of free space behind the write cursor (without growing).
    pub fn space_remaining(&self) -> usize {
        self.data.len() - self.write
    }

    pub fn is_empty(&self) -> bool {
        self.data_available() == 0
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Ensure at least `n` bytes of writable space, growing if permitted.
    pub fn reserve(&mut self, n: usize) -> Result<(), TlsError> {
        if self.space_remaining() >= n {
            return Ok(());
        }
        if self.tainted {
            return Err(TlsError::ResizeTainted);
        }
        if !self.growable {
            return Err(TlsError::ResizeFixed);
        }
        let needed = self.write + n;
        let mut new_size = self.data.len().max(32);
        while new_size < needed {
            new_size *= 2;
        }
        self.data.resize(new_size, 0);
        Ok(())
    }

    // --- writers (big-endian) ---

    pub fn write_bytes(&mut self, src: &[u8]) -> Result<(), TlsError> {
        self.reserve(src.len())?;
        self.data[self.write..self.write + src.len()].copy_from_slice(src);
        self.advance_write(src.len());
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), TlsError> {
        self.write_bytes(&[v])
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), TlsError> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u24(&mut self, v: u32) -> Result<(), TlsError> {
        self.write_bytes(&v.to_be_bytes()[1..])
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), TlsError> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), TlsError> {
        self.write_bytes(&v.to_be_bytes())
    }

    // --- readers (big-endian) ---

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, TlsError> {
        if self.data_available() < n {
            return Err(TlsError::BufferOutOfData);
        }
        let out = self.data[self.read..self.read + n].to_vec();
        self.read += n;
        Ok(out)
    }

    /// Copy exactly `dst.len()` bytes into `dst`.
    pub fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<(), TlsError> {
        if self.data_available() < dst.len() {
            return Err(TlsError::BufferOutOfData);
        }
        dst.copy_from_slice(&self.data[self.read..self.read + dst.len()]);
        self.read += dst.len();
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, TlsError> {
        let mut b = [0u8; 1];
        self.read_exact_into(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, TlsError> {
        let mut b = [0u8; 2];
        self.read_exact_into(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub fn read_u24(&mut self) -> Result<u32, TlsError> {
        let mut b = [0u8; 3];
        self.read_exact_into(&mut b)?;
        Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
    }

    pub fn read_u32(&mut self) -> Result<u32, TlsError> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    pub fn read_u64(&mut self) -> Result<u64, TlsError> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    // --- zero-copy windows ---

    /// Consume `n` bytes and return them as a borrowed window.
    /// Taints the buffer: it can no longer grow.
    pub fn raw_read(&mut self, n: usize) -> Result<&[u8], TlsError> {
        if self.data_available() < n {
            return Err(TlsError::BufferOutOfData);
        }
        self.tainted = true;
        let start = self.read;
        self.read += n;
        Ok(&self.data[start..start + n])
    }

    /// Claim `n` writable bytes and return them as a mutable window.
    /// The window counts as written. Taints the buffer.
    pub fn raw_write(&mut self, n: usize) -> Result<&mut [u8], TlsError> {
        if self.space_remaining() < n {
            return Err(TlsError::BufferFull);
        }
        self.tainted = true;
        let start = self.write;
        self.advance_write(n);
        Ok(&mut self.data[start..start + n])
    }

    // --- cursor management ---

    pub fn skip_read(&mut self, n: usize) -> Result<(), TlsError> {
        if self.data_available() < n {
            return Err(TlsError::BufferOutOfData);
        }
        self.read += n;
        Ok(())
    }

    pub fn skip_write(&mut self, n: usize) -> Result<(), TlsError> {
        if self.space_remaining() < n {
            return Err(TlsError::BufferFull);
        }
        self.advance_write(n);
        Ok(())
    }

    /// Move the read cursor back to the start of buffered data.
    pub fn rewind_read(&mut self) {
        self.read = 0;
    }

    /// Drop everything already read, compacting unread bytes to the front.
    /// A plain cursor move would let a long-lived buffer creep toward its
    /// high-water mark even while logically near-empty.
    pub fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.data.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }

    /// Zero `[0, high_water)` and reset both cursors. The taint flag is
    /// cleared: no window into the old contents survives a wipe.
    pub fn wipe(&mut self) {
        self.data[..self.high_water].zeroize();
        self.read = 0;
        self.write = 0;
        self.high_water = 0;
        self.tainted = false;
    }

    /// The unread contents, without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    fn advance_write(&mut self, n: usize) {
        self.write += n;
        if self.write > self.high_water {
            self.high_water = self.write;
        }
    }
}

impl Drop for ByteBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
