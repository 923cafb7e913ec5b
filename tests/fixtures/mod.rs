//! Test fixtures: minimal image payloads recognized by magic bytes.
#![allow(dead_code)]

/// JFIF header; enough for format sniffing.
pub const JPEG_HEADER: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
];

pub const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub const GIF_HEADER: &[u8] = b"GIF89a";

/// A fake ID card photo of the given size.
pub fn jpeg_of_size(len: usize) -> Vec<u8> {
    let mut bytes = JPEG_HEADER.to_vec();
    bytes.resize(len.max(JPEG_HEADER.len()), 0x42);
    bytes
}

pub fn small_jpeg() -> Vec<u8> {
    jpeg_of_size(4 * 1024)
}

pub fn small_png() -> Vec<u8> {
    let mut bytes = PNG_HEADER.to_vec();
    bytes.extend_from_slice(&[0u8; 256]);
    bytes
}

pub fn small_gif() -> Vec<u8> {
    let mut bytes = GIF_HEADER.to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// What a Thai ID card engine returns for a readable card.
pub const ENGINE_FIELDS_BODY: &str = r#"{
    "prefix_name_en": "Mr.",
    "first_name_en": "Somchai",
    "last_name_en": "Jaidee",
    "date_of_birth_en": "1 Jan. 1990"
}"#;
