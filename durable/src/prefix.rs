use std::io::Write;

/// Tag describing what a framed block contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKind(pub u8);

impl BlockKind {
    pub const PRIMITIVE: BlockKind = BlockKind(0);
    pub const TABLE: BlockKind = BlockKind(1);
    pub const LIST: BlockKind = BlockKind(2);
    pub const MAP: BlockKind = BlockKind(3);
    pub const SET: BlockKind = BlockKind(4);
}

/// Header written ahead of a framed block.
///
/// Encoded as the kind tag byte followed by the payload length as an
/// unsigned LEB128 varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPrefix {
    pub length: u64,
    pub kind: BlockKind,
}

impl BlockPrefix {
    pub fn new(length: u64, kind: BlockKind) -> Self {
        Self { length, kind }
    }

    /// Number of bytes `encode` writes
    pub fn encoded_len(&self) -> usize {
        1 + varint_len(self.length)
    }

    pub fn encode<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        let mut buf = [0u8; 11];
        buf[0] = self.kind.0;
        let n = write_varint(self.length, &mut buf[1..]);
        out.write_all(&buf[..1 + n])
    }
}

fn varint_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

/// Writes `value` into `buf`, returning the number of bytes used.
fn write_varint(mut value: u64, buf: &mut [u8]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}
