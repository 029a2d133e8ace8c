//! BIP-32 extended keys: master derivation, CKDpriv/CKDpub, and the
//! xprv/xpub Base58Check text form.

use crate::backend;
use crate::base58::{self, Base58Error};
use crate::keypath::KeyPath;
use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use std::sync::OnceLock;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

const HARDENED_FLAG: u32 = 0x8000_0000;
const SEED_KEY: &[u8] = b"Bitcoin seed";

/// BIP-32 structural and cryptographic failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Bip32Error {
    /// xprv/xpub version bytes are not one of the four known headers.
    #[error("unrecognized version bytes")]
    UnrecognizedVersion,
    /// Decoded byte length was not exactly 78.
    #[error("unexpected length")]
    UnexpectedLength,
    /// A scalar/point was rejected by the curve backend, or the private
    /// marker byte was not 0x00.
    #[error("invalid key")]
    InvalidKey,
    /// depth/parent-fingerprint/child-index combination contradicts
    /// master-key semantics.
    #[error("invalid derivation data")]
    InvalidDerivationData,
    /// CKDpub was attempted with a hardened index.
    #[error("hardened derivation requires a private key")]
    HardenedFromPublic,
    /// A rooted path was applied to a non-master (depth > 0) key.
    #[error("rooted path applied to non-root key")]
    RootedFromNonRoot,
    /// Derivation depth would exceed 255.
    #[error("derivation depth overflow")]
    DepthOverflow,
    /// CKDpriv/CKDpub produced an invalid child key (<2^-127 probability).
    /// The caller must retry with `child_index + 1`.
    #[error("invalid child key at index {child_index}, retry with child_index + 1")]
    VeryUnlikelyInvalidChildKey {
        /// The child index that produced an invalid scalar/point.
        child_index: u32,
    },
    /// The encoded string failed Base58Check decoding.
    #[error("base58 error: {0}")]
    Base58(#[from] Base58Error),
}

/// Selects which version-header bytes an extended key serializes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Version bytes `0488ADE4` / `0488B21E`.
    MainNet,
    /// Version bytes `04358394` / `043587CF`.
    TestNet,
}

const XPRV_MAIN: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
const XPUB_MAIN: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
const XPRV_TEST: [u8; 4] = [0x04, 0x35, 0x83, 0x94];
const XPUB_TEST: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];

/// 32-byte opaque chain code, compared in constant time.
#[derive(Debug, Clone, Copy)]
pub struct ChainCode(pub [u8; 32]);

impl ConstantTimeEq for ChainCode {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for ChainCode {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}
impl Eq for ChainCode {}

/// First 4 bytes of a parent's [`Identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentFingerprint(pub [u8; 4]);

impl ParentFingerprint {
    const ZERO: ParentFingerprint = ParentFingerprint([0; 4]);
}

/// RIPEMD-160(SHA-256(compressed public key)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier(pub [u8; 20]);

fn identifier_of(compressed: &[u8; 33]) -> Identifier {
    let digest = Ripemd160::digest(Sha256::digest(compressed));
    Identifier(digest.into())
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    (left, right)
}

fn is_hardened(index: u32) -> bool {
    index & HARDENED_FLAG != 0
}

/// An extended private key: a secp256k1 scalar plus chain code and
/// derivation metadata. The secret scalar is zeroed on drop.
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    secret: Zeroizing<[u8; 32]>,
    chain_code: ChainCode,
    parent_fingerprint: ParentFingerprint,
    depth: u8,
    child_index: u32,
    network: Network,
    derivation_path: Option<KeyPath>,
}

impl std::fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("secret", &"...")
            .field("depth", &self.depth)
            .field("child_index", &self.child_index)
            .finish()
    }
}

/// An extended public key: a compressed secp256k1 point plus chain code
/// and derivation metadata.
#[derive(Debug, Clone)]
pub struct ExtendedPublicKey {
    point: [u8; 33],
    chain_code: ChainCode,
    parent_fingerprint: ParentFingerprint,
    depth: u8,
    child_index: u32,
    network: Network,
    derivation_path: Option<KeyPath>,
    identifier: OnceLock<Identifier>,
}

/// Either an extended private or an extended public key.
#[derive(Debug, Clone)]
pub enum ExtendedKey {
    /// Owns a secret scalar; can derive both private and public children.
    Private(ExtendedPrivateKey),
    /// Owns only a compressed point; can derive non-hardened children.
    Public(ExtendedPublicKey),
}

impl ExtendedPrivateKey {
    /// Derive the master extended private key from a seed (13..=64 bytes,
    /// typically 64).
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self, Bip32Error> {
        let (il, ir) = hmac_sha512(SEED_KEY, seed);
        backend::scalar_from_bytes(&il).map_err(|_| Bip32Error::InvalidKey)?;
        Ok(ExtendedPrivateKey {
            secret: Zeroizing::new(il),
            chain_code: ChainCode(ir),
            parent_fingerprint: ParentFingerprint::ZERO,
            depth: 0,
            child_index: 0,
            network,
            derivation_path: Some(KeyPath::root()),
        })
    }

    /// The raw 32-byte secret scalar.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// The chain code.
    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// Derivation depth (0 for master).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// This key's raw child index within its parent (0 for master).
    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    /// The annotated derivation path, if one has been tracked.
    pub fn derivation_path(&self) -> Option<&KeyPath> {
        self.derivation_path.as_ref()
    }

    /// The corresponding extended public key.
    pub fn public_key(&self) -> ExtendedPublicKey {
        let scalar = backend::scalar_from_bytes(&self.secret).expect("secret was validated at construction");
        let point = backend::derive_pubkey(&scalar);
        let mut compressed = [0u8; 33];
        backend::compressed_encode(&point, &mut compressed);
        ExtendedPublicKey {
            point: compressed,
            chain_code: self.chain_code,
            parent_fingerprint: self.parent_fingerprint,
            depth: self.depth,
            child_index: self.child_index,
            network: self.network,
            derivation_path: self.derivation_path.clone(),
            identifier: OnceLock::new(),
        }
    }

    /// This key's identifier (`RIPEMD160(SHA256(compressed public key))`).
    pub fn identifier(&self) -> Identifier {
        let compressed = self.compressed_public();
        identifier_of(&compressed)
    }

    fn compressed_public(&self) -> [u8; 33] {
        let scalar = backend::scalar_from_bytes(&self.secret).expect("secret was validated at construction");
        let point = backend::derive_pubkey(&scalar);
        let mut compressed = [0u8; 33];
        backend::compressed_encode(&point, &mut compressed);
        compressed
    }

    /// CKDpriv: derive a single child at `index` (top bit = hardened).
    pub fn ckd_priv(&self, index: u32) -> Result<Self, Bip32Error> {
        let data = if is_hardened(index) {
            let mut buf = Vec::with_capacity(37);
            buf.push(0u8);
            buf.extend_from_slice(&*self.secret);
            buf.extend_from_slice(&index.to_be_bytes());
            buf
        } else {
            let mut buf = Vec::with_capacity(37);
            buf.extend_from_slice(&self.compressed_public());
            buf.extend_from_slice(&index.to_be_bytes());
            buf
        };

        let (il, ir) = hmac_sha512(&self.chain_code.0, &data);
        let parent_scalar =
            backend::scalar_from_bytes(&self.secret).expect("secret was validated at construction");
        let child_scalar = backend::scalar_tweak_add(parent_scalar, &il)
            .map_err(|_| Bip32Error::VeryUnlikelyInvalidChildKey { child_index: index })?;

        let depth = self
            .depth
            .checked_add(1)
            .ok_or(Bip32Error::DepthOverflow)?;

        Ok(ExtendedPrivateKey {
            secret: Zeroizing::new(child_scalar.secret_bytes()),
            chain_code: ChainCode(ir),
            parent_fingerprint: ParentFingerprint(self.identifier().0[..4].try_into().unwrap()),
            depth,
            child_index: index,
            network: self.network,
            derivation_path: self.derivation_path.as_ref().map(|p| p.append(index)),
        })
    }

    /// Apply every step of `path` in order, starting from this key.
    ///
    /// Fails with [`Bip32Error::RootedFromNonRoot`] if `path` is rooted and
    /// this key is not the master (depth 0).
    pub fn derive(&self, path: &KeyPath) -> Result<Self, Bip32Error> {
        if self.depth > 0 && path.is_rooted() {
            return Err(Bip32Error::RootedFromNonRoot);
        }
        let mut current = self.clone();
        for i in 1..=path.length() {
            current = current.ckd_priv(path.step(i))?;
        }
        Ok(current)
    }

    /// Serialize as the 78-byte xprv layout, Base58Check-encoded.
    pub fn to_xprv_string(&self) -> String {
        let version = match self.network {
            Network::MainNet => XPRV_MAIN,
            Network::TestNet => XPRV_TEST,
        };
        let mut buf = Vec::with_capacity(78);
        buf.extend_from_slice(&version);
        buf.push(self.depth);
        buf.extend_from_slice(&self.parent_fingerprint.0);
        buf.extend_from_slice(&self.child_index.to_be_bytes());
        buf.extend_from_slice(&self.chain_code.0);
        buf.push(0u8);
        buf.extend_from_slice(&*self.secret);
        base58::encode(&buf)
    }

    /// Parse the 78-byte xprv layout from its Base58Check text form.
    pub fn from_xprv_string(s: &str) -> Result<Self, Bip32Error> {
        let raw = base58::decode_vec(s)?;
        if raw.len() != 78 {
            return Err(Bip32Error::UnexpectedLength);
        }
        let version: [u8; 4] = raw[0..4].try_into().unwrap();
        let network = match version {
            v if v == XPRV_MAIN => Network::MainNet,
            v if v == XPRV_TEST => Network::TestNet,
            _ => return Err(Bip32Error::UnrecognizedVersion),
        };
        let depth = raw[4];
        let parent_fingerprint = ParentFingerprint(raw[5..9].try_into().unwrap());
        let child_index = u32::from_be_bytes(raw[9..13].try_into().unwrap());
        if depth == 0 && (parent_fingerprint != ParentFingerprint::ZERO || child_index != 0) {
            return Err(Bip32Error::InvalidDerivationData);
        }
        let chain_code = ChainCode(raw[13..45].try_into().unwrap());
        if raw[45] != 0 {
            return Err(Bip32Error::InvalidKey);
        }
        let secret: [u8; 32] = raw[46..78].try_into().unwrap();
        backend::scalar_from_bytes(&secret).map_err(|_| Bip32Error::InvalidKey)?;

        Ok(ExtendedPrivateKey {
            secret: Zeroizing::new(secret),
            chain_code,
            parent_fingerprint,
            depth,
            child_index,
            network,
            derivation_path: None,
        })
    }
}

impl ExtendedPublicKey {
    /// The compressed (33-byte) public point.
    pub fn compressed(&self) -> &[u8; 33] {
        &self.point
    }

    /// The chain code.
    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// Derivation depth (0 for master).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// This key's raw child index within its parent (0 for master).
    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    /// The annotated derivation path, if one has been tracked.
    pub fn derivation_path(&self) -> Option<&KeyPath> {
        self.derivation_path.as_ref()
    }

    /// This key's identifier, computed once and cached thereafter.
    pub fn identifier(&self) -> Identifier {
        *self.identifier.get_or_init(|| identifier_of(&self.point))
    }

    /// CKDpub: derive a single non-hardened child at `index`.
    pub fn ckd_pub(&self, index: u32) -> Result<Self, Bip32Error> {
        if is_hardened(index) {
            return Err(Bip32Error::HardenedFromPublic);
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.point);
        data.extend_from_slice(&index.to_be_bytes());

        let (il, ir) = hmac_sha512(&self.chain_code.0, &data);
        let parent_point =
            backend::point_from_compressed(&self.point).expect("point was validated at construction");
        let child_point = backend::point_tweak_add(parent_point, &il)
            .map_err(|_| Bip32Error::VeryUnlikelyInvalidChildKey { child_index: index })?;

        let depth = self
            .depth
            .checked_add(1)
            .ok_or(Bip32Error::DepthOverflow)?;

        let mut compressed = [0u8; 33];
        backend::compressed_encode(&child_point, &mut compressed);

        Ok(ExtendedPublicKey {
            point: compressed,
            chain_code: ChainCode(ir),
            parent_fingerprint: ParentFingerprint(self.identifier().0[..4].try_into().unwrap()),
            depth,
            child_index: index,
            network: self.network,
            derivation_path: self.derivation_path.as_ref().map(|p| p.append(index)),
            identifier: OnceLock::new(),
        })
    }

    /// Apply every (non-hardened) step of `path` in order.
    pub fn derive(&self, path: &KeyPath) -> Result<Self, Bip32Error> {
        if self.depth > 0 && path.is_rooted() {
            return Err(Bip32Error::RootedFromNonRoot);
        }
        let mut current = self.clone();
        for i in 1..=path.length() {
            current = current.ckd_pub(path.step(i))?;
        }
        Ok(current)
    }

    /// Serialize as the 78-byte xpub layout, Base58Check-encoded.
    pub fn to_xpub_string(&self) -> String {
        let version = match self.network {
            Network::MainNet => XPUB_MAIN,
            Network::TestNet => XPUB_TEST,
        };
        let mut buf = Vec::with_capacity(78);
        buf.extend_from_slice(&version);
        buf.push(self.depth);
        buf.extend_from_slice(&self.parent_fingerprint.0);
        buf.extend_from_slice(&self.child_index.to_be_bytes());
        buf.extend_from_slice(&self.chain_code.0);
        buf.extend_from_slice(&self.point);
        base58::encode(&buf)
    }

    /// Parse the 78-byte xpub layout from its Base58Check text form.
    pub fn from_xpub_string(s: &str) -> Result<Self, Bip32Error> {
        let raw = base58::decode_vec(s)?;
        if raw.len() != 78 {
            return Err(Bip32Error::UnexpectedLength);
        }
        let version: [u8; 4] = raw[0..4].try_into().unwrap();
        let network = match version {
            v if v == XPUB_MAIN => Network::MainNet,
            v if v == XPUB_TEST => Network::TestNet,
            _ => return Err(Bip32Error::UnrecognizedVersion),
        };
        let depth = raw[4];
        let parent_fingerprint = ParentFingerprint(raw[5..9].try_into().unwrap());
        let child_index = u32::from_be_bytes(raw[9..13].try_into().unwrap());
        if depth == 0 && (parent_fingerprint != ParentFingerprint::ZERO || child_index != 0) {
            return Err(Bip32Error::InvalidDerivationData);
        }
        let chain_code = ChainCode(raw[13..45].try_into().unwrap());
        let point: [u8; 33] = raw[45..78].try_into().unwrap();
        backend::point_from_compressed(&point).map_err(|_| Bip32Error::InvalidKey)?;

        Ok(ExtendedPublicKey {
            point,
            chain_code,
            parent_fingerprint,
            depth,
            child_index,
            network,
            derivation_path: None,
            identifier: OnceLock::new(),
        })
    }
}

impl ExtendedKey {
    /// Decode either an xprv or xpub string, dispatching on its version
    /// bytes.
    pub fn decode(s: &str) -> Result<Self, Bip32Error> {
        match ExtendedPrivateKey::from_xprv_string(s) {
            Ok(k) => return Ok(ExtendedKey::Private(k)),
            Err(Bip32Error::UnrecognizedVersion) => {}
            Err(e) => return Err(e),
        }
        ExtendedPublicKey::from_xpub_string(s).map(ExtendedKey::Public)
    }

    /// The chain code common to both variants.
    pub fn chain_code(&self) -> &ChainCode {
        match self {
            ExtendedKey::Private(k) => k.chain_code(),
            ExtendedKey::Public(k) => k.chain_code(),
        }
    }

    /// The derivation depth common to both variants.
    pub fn depth(&self) -> u8 {
        match self {
            ExtendedKey::Private(k) => k.depth(),
            ExtendedKey::Public(k) => k.depth(),
        }
    }
}
