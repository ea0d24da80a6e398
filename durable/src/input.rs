use std::io::{self, BufRead, Read, Seek, SeekFrom};

use crate::alloc::Slab;
use crate::error::{Error, Result};

/// A read-only, seekable view over the slabs of a closed buffer.
///
/// The view owns its slabs and returns them to their allocator when it is
/// dropped. Bytes are read in place; nothing is concatenated.
#[derive(Debug)]
pub struct SlabInput {
    slabs: Vec<Slab>,
    /// Absolute position of the first byte of every slab
    offsets: Vec<u64>,
    len: u64,
    pos: u64,
}

impl SlabInput {
    pub(crate) fn new(slabs: Vec<Slab>) -> Self {
        let slabs: Vec<Slab> = slabs.into_iter().filter(|s| !s.is_empty()).collect();
        let mut offsets = Vec::with_capacity(slabs.len());
        let mut len = 0u64;
        for slab in &slabs {
            offsets.push(len);
            len += slab.len() as u64;
        }
        Self {
            slabs,
            offsets,
            len,
            pos: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Moves the cursor to `pos`, which may equal `len()`.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(Error::OutOfBounds {
                position: pos,
                len: self.len,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Index of the slab holding `pos` together with the offset inside it.
    fn locate(&self, pos: u64) -> Option<(usize, usize)> {
        if pos >= self.len {
            return None;
        }
        let idx = self.offsets.partition_point(|start| *start <= pos) - 1;
        Some((idx, (pos - self.offsets[idx]) as usize))
    }

    /// Copies bytes starting at `pos` into `dst` without moving the cursor.
    /// Returns how many bytes were copied, fewer than `dst.len()` only at the end.
    pub fn read_at(&self, pos: u64, dst: &mut [u8]) -> usize {
        let Some((mut idx, mut offset)) = self.locate(pos) else {
            return 0;
        };
        let mut copied = 0;
        while copied < dst.len() && idx < self.slabs.len() {
            let src = &self.slabs[idx].as_slice()[offset..];
            let k = src.len().min(dst.len() - copied);
            dst[copied..copied + k].copy_from_slice(&src[..k]);
            copied += k;
            idx += 1;
            offset = 0;
        }
        copied
    }

    /// The underlying slabs, in order.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.slabs.iter().map(Slab::as_slice)
    }

    /// Copies the whole content into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len as usize);
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }
}

impl Read for SlabInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, buf);
        self.pos += n as u64;
        Ok(n)
    }
}

impl BufRead for SlabInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(match self.locate(self.pos) {
            Some((idx, offset)) => &self.slabs[idx].as_slice()[offset..],
            None => &[],
        })
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt as u64).min(self.len);
    }
}

impl Seek for SlabInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.seek_to(target)?;
        Ok(self.pos)
    }
}
