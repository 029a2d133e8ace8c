//! BIP-39 mnemonic phrases: entropy <-> word phrase, and PBKDF2 seed
//! derivation.

mod wordlist;

use crate::bits;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// BIP-39 structural and lookup failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Bip39Error {
    /// The phrase does not have a legal number of words (optionally plus
    /// one trailing passphrase word).
    #[error("bad word count")]
    BadWordCount,
    /// A token is not present in the wordlist.
    #[error("invalid word: {0}")]
    InvalidWord(String),
    /// The trailing checksum bits did not match SHA-256(entropy).
    #[error("invalid checksum")]
    InvalidChecksum,
}

/// Entropy length bounds from the data model: 4..=64 bytes, a multiple of 4.
const MIN_ENTROPY_BYTES: usize = 4;
const MAX_ENTROPY_BYTES: usize = 64;

fn word_count_for(entropy_bytes: usize) -> usize {
    let entropy_bits = entropy_bytes * 8;
    (entropy_bits + entropy_bits / 32) / 11
}

fn checksum_bits_for(entropy_bytes: usize) -> u32 {
    (entropy_bytes * 8 / 32) as u32
}

fn is_legal_entropy_len(entropy_bytes: usize) -> bool {
    entropy_bytes >= MIN_ENTROPY_BYTES
        && entropy_bytes <= MAX_ENTROPY_BYTES
        && entropy_bytes % 4 == 0
}

fn is_legal_word_count(n: usize) -> bool {
    (MIN_ENTROPY_BYTES..=MAX_ENTROPY_BYTES)
        .step_by(4)
        .any(|b| word_count_for(b) == n)
}

/// An entropy-backed mnemonic phrase, its optional passphrase, and the
/// 64-byte seed derived from both.
pub struct Mnemonic {
    entropy: Zeroizing<Vec<u8>>,
    passphrase: Option<String>,
    phrase: String,
    seed: Zeroizing<[u8; 64]>,
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("entropy", &"...")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "..."))
            .field("phrase", &"...")
            .field("seed", &"...")
            .finish()
    }
}

impl Mnemonic {
    /// Draw `entropy_bits` bits of fresh entropy (a positive multiple of 32)
    /// from the system CSPRNG and build the corresponding mnemonic.
    pub fn generate(entropy_bits: u32, passphrase: Option<String>) -> Result<Self, Bip39Error> {
        if entropy_bits == 0 || entropy_bits % 32 != 0 {
            return Err(Bip39Error::BadWordCount);
        }
        let mut entropy = vec![0u8; entropy_bits as usize / 8];
        rand::thread_rng().fill_bytes(&mut entropy);
        Self::from_entropy(&entropy, passphrase)
    }

    /// Build a mnemonic from raw entropy (4..=64 bytes, a multiple of 4).
    pub fn from_entropy(entropy: &[u8], passphrase: Option<String>) -> Result<Self, Bip39Error> {
        if !is_legal_entropy_len(entropy.len()) {
            return Err(Bip39Error::BadWordCount);
        }
        let checksum_bits = checksum_bits_for(entropy.len());
        let digest = Sha256::digest(entropy);
        let checksum = bits::get_bits(&digest, 0, checksum_bits);

        let mut buf = vec![0u8; entropy.len() + 4];
        buf[..entropy.len()].copy_from_slice(entropy);
        bits::append_bits(&mut buf, entropy.len() * 8, checksum, checksum_bits);

        let word_count = word_count_for(entropy.len());
        let phrase = bits::chunks(&buf, 11)
            .take(word_count)
            .map(|idx| wordlist::word_at(idx as u16).expect("index within wordlist range"))
            .collect::<Vec<_>>()
            .join(" ");

        let seed = derive_seed(&phrase, passphrase.as_deref().unwrap_or(""));
        Ok(Mnemonic {
            entropy: Zeroizing::new(entropy.to_vec()),
            passphrase,
            phrase,
            seed: Zeroizing::new(seed),
        })
    }

    /// Parse a seed phrase, applying the "one extra trailing word is the
    /// passphrase" heuristic (see the open question in the design notes).
    pub fn parse(s: &str) -> Result<Self, Bip39Error> {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();

        let passphrase = if tokens.len() % 3 == 1 && is_legal_word_count(tokens.len() - 1) {
            tokens.pop().map(str::to_string)
        } else {
            None
        };

        Self::parse_words(&tokens, passphrase)
    }

    /// Parse an exact-length seed phrase with an explicit passphrase,
    /// bypassing the trailing-word heuristic entirely.
    pub fn parse_with_passphrase(s: &str, passphrase: &str) -> Result<Self, Bip39Error> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let passphrase = (!passphrase.is_empty()).then(|| passphrase.to_string());
        Self::parse_words(&tokens, passphrase)
    }

    fn parse_words(tokens: &[&str], passphrase: Option<String>) -> Result<Self, Bip39Error> {
        if !is_legal_word_count(tokens.len()) {
            return Err(Bip39Error::BadWordCount);
        }

        let mut indices = Vec::with_capacity(tokens.len());
        for &word in tokens {
            let idx = wordlist::index_of(word).ok_or_else(|| Bip39Error::InvalidWord(word.to_string()))?;
            indices.push(idx as u32);
        }

        let total_bits = tokens.len() * 11;
        let entropy_bits = total_bits * 32 / 33;
        let checksum_bits = (total_bits - entropy_bits) as u32;
        let entropy_bytes = entropy_bits / 8;

        let mut buf = vec![0u8; total_bits.div_ceil(8)];
        let mut offset = 0;
        for &idx in &indices {
            offset = bits::append_bits(&mut buf, offset, idx, 11);
        }

        let entropy = buf[..entropy_bytes].to_vec();
        let checksum = bits::get_bits(&buf, entropy_bits, checksum_bits);
        let digest = Sha256::digest(&entropy);
        let expected = bits::get_bits(&digest, 0, checksum_bits);
        if checksum != expected {
            return Err(Bip39Error::InvalidChecksum);
        }

        // Rebuild the phrase from the matched wordlist entries rather than
        // echoing the caller's tokens: this is where case normalization
        // happens (spec: "implicit via case-insensitive wordlist lookup"),
        // and it must match exactly or the PBKDF2 seed below diverges from
        // the canonical phrase's seed.
        let phrase = indices
            .iter()
            .map(|&idx| wordlist::word_at(idx as u16).expect("index within wordlist range"))
            .collect::<Vec<_>>()
            .join(" ");
        let seed = derive_seed(&phrase, passphrase.as_deref().unwrap_or(""));
        Ok(Mnemonic {
            entropy: Zeroizing::new(entropy),
            passphrase,
            phrase,
            seed: Zeroizing::new(seed),
        })
    }

    /// The raw entropy backing this mnemonic.
    pub fn entropy(&self) -> &[u8] {
        &self.entropy
    }

    /// The space-joined seed phrase.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// The optional passphrase supplied or detected during parsing.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// The 64-byte binary seed derived via PBKDF2-HMAC-SHA512.
    pub fn seed(&self) -> &[u8; 64] {
        &self.seed
    }
}

fn derive_seed(phrase: &str, passphrase: &str) -> [u8; 64] {
    let normalized_phrase = normalize(phrase);
    let normalized_passphrase = normalize(passphrase);

    let salt = format!("mnemonic{normalized_passphrase}");
    let mut seed = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(normalized_phrase.as_bytes(), salt.as_bytes(), 2048, &mut seed);
    seed
}

/// NFKD-normalize non-ASCII input; ASCII-only input is returned unchanged
/// to avoid an unnecessary allocation.
fn normalize(s: &str) -> std::borrow::Cow<'_, str> {
    if s.is_ascii() {
        std::borrow::Cow::Borrowed(s)
    } else {
        std::borrow::Cow::Owned(s.nfkd().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_entropy_vector() {
        let m = Mnemonic::from_entropy(&[0u8; 16], None).unwrap();
        assert_eq!(
            m.phrase(),
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        );
    }

    #[test]
    fn all_ones_entropy_vector() {
        let m = Mnemonic::from_entropy(&[0xffu8; 16], None).unwrap();
        assert_eq!(
            m.phrase(),
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong"
        );
    }

    #[test]
    fn known_decoding_vector() {
        let phrase =
            "funny essay radar tattoo casual dream idle wrestle defy length obtain tobacco";
        let m = Mnemonic::parse(phrase).unwrap();
        assert_eq!(hex::encode_upper(m.entropy()), "5E29A6C2EF223A851C2FF239B0026271");
    }

    #[test]
    fn round_trip_all_legal_entropy_lengths() {
        for bytes in (4..=64usize).step_by(4) {
            let entropy = vec![0xA5u8; bytes];
            let m = Mnemonic::from_entropy(&entropy, None).unwrap();
            let parsed = Mnemonic::parse(m.phrase()).unwrap();
            assert_eq!(parsed.entropy(), entropy.as_slice());
        }
    }

    #[test]
    fn rejects_unknown_word() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon notaword";
        assert!(matches!(
            Mnemonic::parse(phrase),
            Err(Bip39Error::InvalidWord(_))
        ));
    }

    #[test]
    fn rejects_bad_word_count() {
        let phrase = "abandon abandon abandon";
        assert!(matches!(Mnemonic::parse(phrase), Err(Bip39Error::BadWordCount)));
    }

    #[test]
    fn rejects_tampered_checksum() {
        // last word swapped from "about" to another word with index 0 mod
        // wordlist bucket, invalidating the checksum.
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon zoo";
        assert!(matches!(
            Mnemonic::parse(phrase),
            Err(Bip39Error::InvalidChecksum)
        ));
    }

    #[test]
    fn trailing_extra_word_is_treated_as_passphrase() {
        let twelve = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let with_extra = format!("{twelve} correcthorsebatterystaple");
        let parsed = Mnemonic::parse(&with_extra).unwrap();
        assert_eq!(parsed.passphrase(), Some("correcthorsebatterystaple"));
        assert_eq!(parsed.phrase(), twelve);

        let explicit = Mnemonic::from_entropy(&[0u8; 16], Some("correcthorsebatterystaple".to_string())).unwrap();
        assert_eq!(parsed.seed(), explicit.seed());
    }

    #[test]
    fn parsing_is_case_insensitive_and_normalizes_the_stored_phrase() {
        let lower = "funny essay radar tattoo casual dream idle wrestle defy length obtain tobacco";
        let shouted = lower.to_uppercase();
        let mixed = "Funny Essay Radar Tattoo Casual Dream Idle Wrestle Defy Length Obtain Tobacco";

        let from_lower = Mnemonic::parse(lower).unwrap();
        let from_shouted = Mnemonic::parse(&shouted).unwrap();
        let from_mixed = Mnemonic::parse(mixed).unwrap();

        assert_eq!(from_lower.phrase(), lower);
        assert_eq!(from_shouted.phrase(), lower);
        assert_eq!(from_mixed.phrase(), lower);
        assert_eq!(from_lower.seed(), from_shouted.seed());
        assert_eq!(from_lower.seed(), from_mixed.seed());
    }

    #[test]
    fn pbkdf2_seed_is_deterministic() {
        let a = Mnemonic::from_entropy(&[7u8; 16], Some("pw".to_string())).unwrap();
        let b = Mnemonic::from_entropy(&[7u8; 16], Some("pw".to_string())).unwrap();
        assert_eq!(a.seed(), b.seed());
    }
}
