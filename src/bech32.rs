//! Bech32 / Bech32m: HRP-prefixed, BCH-checksummed base32 encoding.
//!
//! The two variants share every algorithm and differ only in the checksum
//! constant XORed into the final polymod (see [`Variant::const_value`]).

use crate::bits;

const ALPHABET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 6;
const GEN: [u32; 5] = [
    0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3,
];

/// Bech32 / Bech32m failure modes.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bech32Error {
    /// No `1` separator present in the input.
    #[error("no separator")]
    NoSeparator,
    /// A symbol outside the alphabet, or the input mixes upper/lower case.
    #[error("invalid character")]
    InvalidCharacter,
    /// The caller's output buffer cannot hold the decoded data.
    #[error("buffer too small")]
    BufferTooSmall,
    /// The 6-symbol checksum did not verify.
    #[error("invalid checksum")]
    InvalidChecksum,
    /// The trailing partial-byte padding was non-zero, or too short to be
    /// valid padding at all.
    #[error("bad padding")]
    BadPadding,
}

/// Which checksum constant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// BIP-173 bech32 (`const` = 1).
    Bech32,
    /// BIP-350 bech32m (`const` = 0x2bc830a3).
    Bech32m,
}

impl Variant {
    fn const_value(self) -> u32 {
        match self {
            Variant::Bech32 => 1,
            Variant::Bech32m => 0x2bc8_30a3,
        }
    }
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk = 1u32;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ v as u32;
        for (i, &g) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut v: Vec<u8> = hrp.bytes().map(|c| c >> 5).collect();
    v.push(0);
    v.extend(hrp.bytes().map(|c| c & 31));
    v
}

fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LEN] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let poly = polymod(&values) ^ variant.const_value();
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((poly >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

/// Repack an 8-bit payload into MSB-first 5-bit symbols, zero-padding the
/// trailing partial symbol.
fn bytes_to_5bit(data: &[u8]) -> Vec<u8> {
    let total_bits = data.len() * 8;
    let mut symbols = Vec::with_capacity(total_bits.div_ceil(5));
    let mut bit = 0;
    while bit + 5 <= total_bits {
        symbols.push(bits::get_bits(data, bit, 5) as u8);
        bit += 5;
    }
    let rem = total_bits - bit;
    if rem > 0 {
        let v = bits::get_bits(data, bit, rem as u32);
        symbols.push((v << (5 - rem)) as u8);
    }
    symbols
}

/// Reverse [`bytes_to_5bit`] into `out`, validating that trailing pad bits
/// are zero. Returns the decoded payload length.
fn bits_5_to_bytes(symbols: &[u8], out: &mut [u8]) -> Result<usize, Bech32Error> {
    let total_bits = symbols.len() * 5;
    let full_bytes = total_bits / 8;
    if out.len() < full_bytes {
        return Err(Bech32Error::BufferTooSmall);
    }

    let mut buf = vec![0u8; total_bits.div_ceil(8)];
    let mut offset = 0;
    for &s in symbols {
        offset = bits::append_bits(&mut buf, offset, s as u32, 5);
    }
    let rem = total_bits % 8;
    if rem != 0 {
        if rem < 3 {
            return Err(Bech32Error::BadPadding);
        }
        let pad = bits::get_bits(&buf, full_bytes * 8, rem as u32);
        if pad != 0 {
            return Err(Bech32Error::BadPadding);
        }
    }
    out[..full_bytes].copy_from_slice(&buf[..full_bytes]);
    Ok(full_bytes)
}

/// Encode `payload` under `hrp` with the given checksum variant. The
/// returned string is always lowercase.
pub fn encode(hrp: &str, payload: &[u8], variant: Variant) -> Result<String, Bech32Error> {
    if !hrp.bytes().all(|b| b.is_ascii()) {
        return Err(Bech32Error::InvalidCharacter);
    }
    let hrp_lower = hrp.to_ascii_lowercase();
    let data = bytes_to_5bit(payload);
    let checksum = create_checksum(&hrp_lower, &data, variant);

    let mut out = String::with_capacity(encoded_len(hrp_lower.len(), payload.len()));
    out.push_str(&hrp_lower);
    out.push('1');
    for &sym in data.iter().chain(checksum.iter()) {
        out.push(ALPHABET[sym as usize] as char);
    }
    Ok(out)
}

/// Decode a Bech32/Bech32m string into `out`, returning `(hrp, payload_len,
/// variant)`. `out` must be large enough to hold the decoded payload (see
/// [`decoded_len`]).
pub fn decode(encoded: &str, out: &mut [u8]) -> Result<(String, usize, Variant), Bech32Error> {
    let has_upper = encoded.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = encoded.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower {
        return Err(Bech32Error::InvalidCharacter);
    }
    let lower = encoded.to_ascii_lowercase();

    let sep = lower.rfind('1').ok_or(Bech32Error::NoSeparator)?;
    if sep == lower.len() - 1 || lower.len() - sep - 1 < CHECKSUM_LEN {
        return Err(Bech32Error::InvalidChecksum);
    }
    let hrp = &lower[..sep];
    let data_part = &lower[sep + 1..];

    let mut symbols = Vec::with_capacity(data_part.len());
    for c in data_part.bytes() {
        let idx = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or(Bech32Error::InvalidCharacter)?;
        symbols.push(idx as u8);
    }

    let (data, checksum) = symbols.split_at(symbols.len() - CHECKSUM_LEN);
    let variant = if verify_checksum(hrp, data, checksum, Variant::Bech32) {
        Variant::Bech32
    } else if verify_checksum(hrp, data, checksum, Variant::Bech32m) {
        Variant::Bech32m
    } else {
        return Err(Bech32Error::InvalidChecksum);
    };

    let payload_len = bits_5_to_bytes(data, out)?;
    Ok((hrp.to_string(), payload_len, variant))
}

/// Convenience wrapper returning an owned `(hrp, payload, variant)` instead
/// of writing into a caller buffer.
pub fn decode_vec(encoded: &str) -> Result<(String, Vec<u8>, Variant), Bech32Error> {
    let (_, data_len) = decoded_len(encoded).ok_or(Bech32Error::NoSeparator)?;
    let mut buf = vec![0u8; data_len];
    let (hrp, len, variant) = decode(encoded, &mut buf)?;
    buf.truncate(len);
    Ok((hrp, buf, variant))
}

fn verify_checksum(hrp: &str, data: &[u8], checksum: &[u8], variant: Variant) -> bool {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(checksum);
    polymod(&values) == variant.const_value()
}

/// Total encoded length for an HRP of `hrp_len` bytes and `data_len` raw
/// payload bytes.
pub fn encoded_len(hrp_len: usize, data_len: usize) -> usize {
    hrp_len + 1 + (data_len * 8).div_ceil(5) + CHECKSUM_LEN
}

/// `(hrp_len, data_len)` implied by an encoded string's length, or `None` if
/// there is no separator.
pub fn decoded_len(encoded: &str) -> Option<(usize, usize)> {
    let sep = encoded.rfind('1')?;
    let symbol_count = encoded.len().checked_sub(sep + 1 + CHECKSUM_LEN)?;
    Some((sep, symbol_count * 5 / 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bech32m_example_from_test_vectors() {
        let payload =
            hex::decode("c5f38b70305f519bf66d85fb6cf03058f3dde463ecd7918f2dc743918f2d").unwrap();
        let encoded = encode("split", &payload, Variant::Bech32m).unwrap();
        assert_eq!(
            encoded,
            "split1checkupstagehandshakeupstreamerranterredcaperredlc445v"
        );

        let (hrp, data, variant) = decode_vec(&encoded).unwrap();
        assert_eq!(hrp, "split");
        assert_eq!(data, payload);
        assert_eq!(variant, Variant::Bech32m);
    }

    #[test]
    fn round_trip_various_lengths() {
        for n in [0usize, 1, 5, 20, 32] {
            let payload: Vec<u8> = (0..n as u8).collect();
            for variant in [Variant::Bech32, Variant::Bech32m] {
                let encoded = encode("bc", &payload, variant).unwrap();
                let (hrp, data, v) = decode_vec(&encoded).unwrap();
                assert_eq!(hrp, "bc");
                assert_eq!(data, payload);
                assert_eq!(v, variant);
            }
        }
    }

    #[test]
    fn rejects_mixed_case() {
        let encoded = encode("bc", &[1, 2, 3], Variant::Bech32).unwrap();
        let mut mixed = encoded.clone();
        mixed.replace_range(0..1, &encoded[0..1].to_ascii_uppercase());
        assert_eq!(decode_vec(&mixed), Err(Bech32Error::InvalidCharacter));
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(decode_vec("nobodyherehasaone"), Err(Bech32Error::NoSeparator));
    }

    #[test]
    fn rejects_wrong_checksum() {
        let mut encoded = encode("bc", &[1, 2, 3], Variant::Bech32).unwrap();
        let last = encoded.pop().unwrap();
        let replacement = if last == 'q' { 'p' } else { 'q' };
        encoded.push(replacement);
        assert_eq!(decode_vec(&encoded), Err(Bech32Error::InvalidChecksum));
    }

    #[test]
    fn rejects_buffer_too_small() {
        let payload = [1u8, 2, 3, 4, 5];
        let encoded = encode("bc", &payload, Variant::Bech32).unwrap();
        let mut out = [0u8; 2];
        assert_eq!(decode(&encoded, &mut out), Err(Bech32Error::BufferTooSmall));
    }

    #[test]
    fn length_helpers_match_encoding() {
        let payload = vec![0u8; 10];
        let encoded = encode("bc", &payload, Variant::Bech32).unwrap();
        assert_eq!(encoded.len(), encoded_len("bc".len(), payload.len()));
        assert_eq!(decoded_len(&encoded), Some(("bc".len(), payload.len())));
        assert_eq!(decoded_len("noseparatorhere"), None);
    }
}
