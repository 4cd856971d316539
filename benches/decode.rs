#![feature(test)]
extern crate test;
use test::Bencher;

use pdf_cmap::{CMap, CMapFactory, IDENTITY_H};

fn shift_jis_like() -> CMap {
    let mut cmap = CMap::new();
    cmap.add_codespace_range(1, 0x00, 0x80).unwrap();
    cmap.add_codespace_range(1, 0xA0, 0xDF).unwrap();
    cmap.add_codespace_range(2, 0x8140, 0x9FFC).unwrap();
    cmap.add_codespace_range(2, 0xE040, 0xFCFC).unwrap();
    cmap.map_cid_range(0x20, 0x7E, 231).unwrap();
    cmap.map_cid_range(0x8140, 0x9FFC, 633).unwrap();
    cmap
}

fn decode(cmap: &CMap, bytes: &[u8]) -> u64 {
    let mut offset = 0;
    let mut sum = 0u64;
    while offset < bytes.len() {
        let (code, len) = cmap.read_char_code(bytes, offset);
        if let Some(cid) = cmap.lookup(code).and_then(|value| value.as_cid()) {
            sum += cid as u64;
        }
        offset += len;
    }
    sum
}

#[bench]
fn decode_mixed_width(b: &mut Bencher) {
    let cmap = shift_jis_like();
    let bytes: Vec<u8> = b"Hello \x81\x40\x82\xA0 world \x88\x9F".repeat(256);
    b.iter(|| decode(&cmap, &bytes));
}

#[bench]
fn decode_identity(b: &mut Bencher) {
    let cmap = CMapFactory::new().create_by_name(IDENTITY_H).unwrap();
    let bytes: Vec<u8> = (0..=255u8).cycle().take(8192).collect();
    b.iter(|| decode(&cmap, &bytes));
}
