use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK: usize = 64 * 1024;
/// Files at or below this size are fingerprinted whole.
const EDGE_THRESHOLD: u64 = 128 * 1024;

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// CRC32 of the whole file, streamed in 64 KiB chunks.
/// Zero-padded 8-char lowercase hex.
pub fn crc32_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:08x}", hasher.finalize()))
}

/// In-memory CRC32 with the same formatting; fixtures and duplicate tests.
pub fn crc32_hex_bytes(bytes: &[u8]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    format!("{:08x}", hasher.finalize())
}

/// Content fingerprint used for change detection across rescans:
/// SHA-256 over (first 64 KiB ∥ last 64 KiB) for files larger than 128 KiB,
/// otherwise SHA-256 over the entire file. 64 lowercase hex chars.
pub fn content_fingerprint(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut hasher = Sha256::new();

    if size > EDGE_THRESHOLD {
        let mut head = vec![0u8; CHUNK];
        file.read_exact(&mut head)?;
        hasher.update(&head);

        file.seek(SeekFrom::End(-(CHUNK as i64)))?;
        let mut tail = vec![0u8; CHUNK];
        file.read_exact(&mut tail)?;
        hasher.update(&tail);
    } else {
        let mut buf = vec![0u8; CHUNK];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(hex(&hasher.finalize()))
}

/// Full-file SHA-256; the confirmation hash for duplicate detection.
pub fn full_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex(&hasher.finalize()))
}
