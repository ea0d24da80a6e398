use std::io::{self, Read, Write};

use bytemuck::Pod;
use tracing::{debug, trace};

use crate::alloc::{Slab, SlabAllocator};
use crate::config::BufferConfig;
use crate::error::{Error, Result};
use crate::input::SlabInput;
use crate::prefix::{BlockKind, BlockPrefix};

/// A write-only byte accumulator spread over a growing sequence of slabs.
///
/// The first slab is `min_slab_size` bytes, every following one doubles the
/// previous capacity up to `max_slab_size`. Bytes are never moved between
/// slabs: a full slab is trimmed to what was written into it and kept in
/// order until the buffer is consumed by one of
///
/// * [`DurableBuffer::flush_to`] / [`DurableBuffer::flush_to_framed`]
/// * [`DurableBuffer::into_input`]
/// * [`DurableBuffer::free`]
///
/// Fixed-width numbers are written big-endian.
pub struct DurableBuffer {
    allocator: SlabAllocator,
    config: BufferConfig,
    flushed: Vec<Slab>,
    flushed_bytes: u64,
    curr: Option<Slab>,
    /// Write cursor into `curr`
    pos: usize,
    last_capacity: usize,
}

impl Default for DurableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableBuffer {
    /// A pooled buffer with the default slab sizes, using the global allocator.
    pub fn new() -> Self {
        Self::open(SlabAllocator::global(), BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Result<Self> {
        Self::with_allocator(SlabAllocator::global(), config)
    }

    pub fn with_allocator(allocator: SlabAllocator, config: BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::open(allocator, config))
    }

    fn open(allocator: SlabAllocator, config: BufferConfig) -> Self {
        let curr = allocator.allocate(config.min_slab_size, config.use_cache);
        Self {
            last_capacity: curr.capacity(),
            allocator,
            config,
            flushed: Vec::new(),
            flushed_bytes: 0,
            curr: Some(curr),
            pos: 0,
        }
    }

    /// Runs `body` against a fresh buffer, then flushes it to `out`.
    pub fn flush_with<W, F>(out: &mut W, body: F) -> Result<u64>
    where
        W: Write + ?Sized,
        F: FnOnce(&mut DurableBuffer) -> Result<()>,
    {
        let mut acc = DurableBuffer::new();
        body(&mut acc)?;
        acc.flush_to(out)
    }

    /// Runs `body` against a fresh buffer, then flushes it to `out` as a block of `kind`.
    pub fn flush_framed_with<W, F>(out: &mut W, kind: BlockKind, body: F) -> Result<u64>
    where
        W: Write + ?Sized,
        F: FnOnce(&mut DurableBuffer) -> Result<()>,
    {
        let mut acc = DurableBuffer::new();
        body(&mut acc)?;
        acc.flush_to_framed(out, kind)
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Total number of bytes written so far
    pub fn written(&self) -> u64 {
        self.flushed_bytes + self.pos as u64
    }

    pub fn is_open(&self) -> bool {
        self.curr.is_some()
    }

    /// Number of slabs holding data, including the active one
    pub fn slab_count(&self) -> usize {
        self.flushed.len() + usize::from(self.curr.is_some())
    }

    fn next_slab_size(&self) -> usize {
        self.last_capacity
            .saturating_mul(2)
            .min(self.config.max_slab_size)
    }

    /// Finalizes the active slab and starts one able to hold at least `demand` bytes.
    fn roll(&mut self, demand: usize) -> Result<()> {
        let curr = self.curr.take().ok_or(Error::Closed)?;
        self.flushed_bytes += self.pos as u64;
        self.flushed.push(curr.trim(self.pos));

        let size = self.next_slab_size().max(demand);
        let slab = self.allocator.allocate(size, self.config.use_cache);
        trace!(size = slab.capacity(), slabs = self.flushed.len() + 1, "buffer grew");
        self.last_capacity = slab.capacity();
        self.curr = Some(slab);
        self.pos = 0;
        Ok(())
    }

    /// Makes sure the next `n` bytes fit in the active slab.
    fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        let room = match &self.curr {
            Some(slab) => slab.capacity() - self.pos,
            None => return Err(Error::Closed),
        };
        if n > room {
            self.roll(n)?;
        }
        Ok(())
    }

    fn put_fixed<const N: usize>(&mut self, bytes: [u8; N]) -> Result<()> {
        self.ensure_capacity(N)?;
        let slab = self.curr.as_mut().ok_or(Error::Closed)?;
        slab.as_mut_slice()[self.pos..self.pos + N].copy_from_slice(&bytes);
        self.pos += N;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    /// Writes a single UTF-16 code unit
    pub fn write_char(&mut self, v: u16) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.put_fixed(v.to_be_bytes())
    }

    /// Writes all of `src`, spilling into as many new slabs as needed.
    pub fn write_bytes(&mut self, mut src: &[u8]) -> Result<usize> {
        let n = src.len();
        loop {
            let slab = self.curr.as_mut().ok_or(Error::Closed)?;
            let k = (slab.capacity() - self.pos).min(src.len());
            slab.as_mut_slice()[self.pos..self.pos + k].copy_from_slice(&src[..k]);
            self.pos += k;
            src = &src[k..];
            if src.is_empty() {
                return Ok(n);
            }
            self.roll(src.len().min(self.config.max_slab_size))?;
        }
    }

    /// Writes the in-memory representation of `value`.
    pub fn write_native<T: Pod>(&mut self, value: &T) -> Result<usize> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Writes the in-memory representation of `values`, back to back.
    pub fn write_native_slice<T: Pod>(&mut self, values: &[T]) -> Result<usize> {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// Copies exactly `n` bytes from `src`.
    ///
    /// Fails with `UnexpectedEof` if `src` runs dry first; the buffer must
    /// then be freed.
    pub fn transfer_from<R: Read + ?Sized>(&mut self, src: &mut R, mut n: u64) -> Result<()> {
        while n > 0 {
            let room = match &self.curr {
                Some(slab) => slab.capacity() - self.pos,
                None => return Err(Error::Closed),
            };
            if room == 0 {
                let demand = n.min(self.config.max_slab_size as u64) as usize;
                self.roll(demand)?;
                continue;
            }

            let k = (room as u64).min(n) as usize;
            let slab = self.curr.as_mut().ok_or(Error::Closed)?;
            let read = match src.read(&mut slab.as_mut_slice()[self.pos..self.pos + k]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.pos += read;
            n -= read as u64;
        }
        Ok(())
    }

    /// Trims the active slab into the flushed sequence. Later writes fail
    /// with [`Error::Closed`]; closing twice does nothing.
    pub fn close(&mut self) {
        if let Some(curr) = self.curr.take() {
            self.flushed_bytes += self.pos as u64;
            self.flushed.push(curr.trim(self.pos));
            self.pos = 0;
            debug!(
                bytes = self.flushed_bytes,
                slabs = self.flushed.len(),
                "closed buffer"
            );
        }
    }

    /// Writes every slab to `out` in order, releasing each one as soon as it
    /// has been written. Returns the number of bytes written.
    pub fn flush_to<W: Write + ?Sized>(mut self, out: &mut W) -> Result<u64> {
        self.close();
        let total = self.flushed_bytes;
        for slab in self.flushed.drain(..) {
            out.write_all(slab.as_slice())?;
            slab.release();
        }
        Ok(total)
    }

    /// Like [`DurableBuffer::flush_to`], preceded by a [`BlockPrefix`]
    /// carrying the byte count and `kind`.
    ///
    /// Returns the payload length only. `out` receives
    /// `BlockPrefix::encoded_len()` more bytes than that.
    pub fn flush_to_framed<W: Write + ?Sized>(mut self, out: &mut W, kind: BlockKind) -> Result<u64> {
        self.close();
        BlockPrefix::new(self.flushed_bytes, kind).encode(out)?;
        self.flush_to(out)
    }

    /// Hands the slabs over to a read view, without copying.
    pub fn into_input(mut self) -> SlabInput {
        self.close();
        SlabInput::new(std::mem::take(&mut self.flushed))
    }

    /// Releases every slab without producing any output.
    pub fn free(mut self) {
        self.close();
        debug!(slabs = self.flushed.len(), "freeing buffer");
        for slab in self.flushed.drain(..) {
            slab.release();
        }
    }
}

impl Write for DurableBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
