use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};

use durable::{BlockKind, BlockPrefix, BufferConfig, DurableBuffer, SlabAllocator, SlabInput};
use linearmap::LinearMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn read_u8(r: &mut impl Read) -> u8 {
    let mut b = [0u8; 1];
    r.read_exact(&mut b).unwrap();
    b[0]
}

fn read_u64(r: &mut impl Read) -> u64 {
    let mut b = [0u8; 8];
    r.read_exact(&mut b).unwrap();
    u64::from_be_bytes(b)
}

fn read_varint(r: &mut impl Read) -> u64 {
    let mut value = 0u64;
    let mut shift = 0;
    loop {
        let b = read_u8(r);
        value |= u64::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return value;
        }
        shift += 7;
    }
}

fn sample_map(n: u64) -> LinearMap<u64, u64> {
    let mut map = LinearMap::new();
    for i in 0..n {
        map.put(i, i * i).unwrap();
    }
    for i in (0..n).step_by(3) {
        map.remove(&i);
    }
    map
}

fn encode_map(map: &LinearMap<u64, u64>, buf: &mut DurableBuffer) -> durable::Result<()> {
    buf.write_u64(map.len() as u64)?;
    for (k, v) in map {
        buf.write_u64(*k)?;
        buf.write_u64(*v)?;
    }
    Ok(())
}

fn decode_map(r: &mut impl Read) -> LinearMap<u64, u64> {
    let len = read_u64(r) as usize;
    let mut map = LinearMap::with_capacity(len).unwrap();
    for _ in 0..len {
        let k = read_u64(r);
        let v = read_u64(r);
        map.put(k, v).unwrap();
    }
    map
}

#[test]
fn framed_map_survives_a_file() {
    init_tracing();
    let map = sample_map(5_000);

    let mut file = tempfile::tempfile().unwrap();
    let written = DurableBuffer::flush_framed_with(&mut file, BlockKind::MAP, |buf| {
        encode_map(&map, buf)
    })
    .unwrap();
    assert_eq!(written, 8 + 16 * map.len() as u64);

    file.seek(SeekFrom::Start(0)).unwrap();
    let mut reader = BufReader::new(file);
    assert_eq!(read_u8(&mut reader), BlockKind::MAP.0);
    assert_eq!(read_varint(&mut reader), written);

    let decoded = decode_map(&mut reader);
    assert_eq!(decoded, map);
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn consecutive_blocks_in_one_sink() {
    init_tracing();
    let mut out = Vec::new();
    let kinds = [BlockKind::PRIMITIVE, BlockKind::LIST, BlockKind::SET];
    for (i, kind) in kinds.iter().enumerate() {
        let mut buf = DurableBuffer::new();
        buf.write_bytes(&vec![i as u8; 100 * (i + 1)]).unwrap();
        buf.flush_to_framed(&mut out, *kind).unwrap();
    }

    let mut cursor = &out[..];
    for (i, kind) in kinds.iter().enumerate() {
        let prefix = BlockPrefix::new(read_varint_after_kind(&mut cursor, *kind), *kind);
        assert_eq!(prefix.length, 100 * (i as u64 + 1));
        let (body, rest) = cursor.split_at(prefix.length as usize);
        assert!(body.iter().all(|b| *b == i as u8));
        cursor = rest;
    }
    assert!(cursor.is_empty());
}

fn read_varint_after_kind(r: &mut &[u8], kind: BlockKind) -> u64 {
    assert_eq!(read_u8(r), kind.0);
    read_varint(r)
}

#[test]
fn input_view_reads_like_the_flushed_bytes() {
    init_tracing();
    let map = sample_map(2_000);
    let config = BufferConfig::default().with_min_slab_size(64).with_max_slab_size(1024);

    let mut flushed = Vec::new();
    let mut a = DurableBuffer::with_config(config).unwrap();
    encode_map(&map, &mut a).unwrap();
    a.flush_to(&mut flushed).unwrap();

    let mut b = DurableBuffer::with_config(config).unwrap();
    encode_map(&map, &mut b).unwrap();
    let mut input: SlabInput = b.into_input();
    assert!(input.slab_count() > 1);
    assert_eq!(input.to_vec(), flushed);

    assert_eq!(decode_map(&mut input), map);
    input.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(read_u64(&mut input), map.len() as u64);
}

#[test]
fn buffers_write_through_io_write() {
    init_tracing();
    let alloc = SlabAllocator::default();
    let mut buf = DurableBuffer::with_allocator(alloc.clone(), BufferConfig::default()).unwrap();
    for i in 0..1_000 {
        writeln!(buf, "line {i}").unwrap();
    }
    let text = String::from_utf8(buf.into_input().to_vec()).unwrap();
    assert_eq!(text.lines().count(), 1_000);
    assert_eq!(text.lines().last(), Some("line 999"));
    assert_eq!(alloc.stats().outstanding(), 0);
}

#[test]
fn transfer_between_buffers() {
    init_tracing();
    let mut src = DurableBuffer::new();
    for i in 0..10_000u32 {
        src.write_u32(i).unwrap();
    }
    let mut input = src.into_input();
    input.seek(SeekFrom::Start(400)).unwrap();

    let mut dst = DurableBuffer::new();
    dst.transfer_from(&mut input, 4 * 100).unwrap();
    let copied = dst.into_input().to_vec();
    let expected: Vec<u8> = (100..200u32).flat_map(u32::to_be_bytes).collect();
    assert_eq!(copied, expected);
}

#[test]
fn flushing_to_a_file_by_path() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.bin");

    let mut file = File::create(&path).unwrap();
    let mut buf = DurableBuffer::new();
    buf.write_f64(std::f64::consts::PI).unwrap();
    buf.write_i16(-7).unwrap();
    buf.flush_to(&mut file).unwrap();
    drop(file);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..8], &std::f64::consts::PI.to_be_bytes());
    assert_eq!(i16::from_be_bytes([bytes[8], bytes[9]]), -7);
}
