//! Base58Check: base58 with a 4-byte double-SHA256 checksum.

use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const CHECKSUM_LEN: usize = 4;

/// Base58Check failure modes.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base58Error {
    /// A decoded byte was not found in the base58 alphabet.
    #[error("invalid base58 character")]
    InvalidCharacter,
    /// The caller's output buffer cannot hold the decoded bytes.
    #[error("buffer too small")]
    BufferTooSmall,
    /// Fewer than 4 bytes decoded, or the trailing checksum didn't match.
    #[error("invalid checksum")]
    InvalidChecksum,
}

/// Upper bound on the encoded length of an `n`-byte payload (after the
/// checksum is appended).
pub fn max_encoded_len(n: usize) -> usize {
    ((n + CHECKSUM_LEN) * 138 / 100) + 1
}

/// Upper bound on the decoded length of an `m`-character encoded string
/// (checksum included).
pub fn max_decoded_len(m: usize) -> usize {
    (m * 733 / 1000) + 1
}

fn digit_of(byte: u8) -> Result<u8, Base58Error> {
    ALPHABET
        .iter()
        .position(|&c| c == byte)
        .map(|i| i as u8)
        .ok_or(Base58Error::InvalidCharacter)
}

/// Encode `payload` with an appended 4-byte double-SHA256 checksum.
pub fn encode(payload: &[u8]) -> String {
    let checksum = Sha256::digest(Sha256::digest(payload));
    let mut buf: Vec<u8> = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    encode_raw(&buf)
}

/// Encode raw bytes (no checksum) as base58.
fn encode_raw(buf: &[u8]) -> String {
    let leading_zeros = buf.iter().take_while(|&&b| b == 0).count();

    // big-endian base-256 -> base-58 conversion by repeated division.
    let mut digits: Vec<u8> = Vec::with_capacity(buf.len() * 138 / 100 + 1);
    for &byte in buf {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            carry += (*d as u32) << 8;
            *d = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(leading_zeros + digits.len());
    out.extend(std::iter::repeat(ALPHABET[0] as char).take(leading_zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

/// Decode a Base58Check string into `out`, returning the payload length
/// (checksum stripped). `out` must be large enough to hold the payload.
pub fn decode(encoded: &str, out: &mut [u8]) -> Result<usize, Base58Error> {
    let leading_zeros = encoded.bytes().take_while(|&b| b == ALPHABET[0]).count();

    let mut bytes: Vec<u8> = Vec::with_capacity(max_decoded_len(encoded.len()));
    for c in encoded.bytes() {
        let mut carry = digit_of(c)? as u32;
        for b in bytes.iter_mut() {
            carry += (*b as u32) * 58;
            *b = carry as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push(carry as u8);
            carry >>= 8;
        }
    }

    let total_len = leading_zeros + bytes.len();
    if total_len < CHECKSUM_LEN {
        return Err(Base58Error::InvalidChecksum);
    }
    let payload_len = total_len - CHECKSUM_LEN;
    if out.len() < payload_len {
        return Err(Base58Error::BufferTooSmall);
    }

    let mut combined = vec![0u8; total_len];
    for (i, &b) in bytes.iter().rev().enumerate() {
        combined[leading_zeros + i] = b;
    }

    let (payload, checksum) = combined.split_at(payload_len);
    let expect = Sha256::digest(Sha256::digest(payload));
    if checksum != &expect[..CHECKSUM_LEN] {
        return Err(Base58Error::InvalidChecksum);
    }

    out[..payload_len].copy_from_slice(payload);
    Ok(payload_len)
}

/// Convenience wrapper returning an owned `Vec<u8>` instead of writing into
/// a caller buffer.
pub fn decode_vec(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let mut buf = vec![0u8; max_decoded_len(encoded.len())];
    let len = decode(encoded, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}
