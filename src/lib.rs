#![warn(missing_docs)]
//! # hdwallet-core
//!
//! BIP-39 mnemonic phrases, BIP-32 hierarchical-deterministic key
//! derivation, and the BIP-44 gap-limit discovery walker, built on
//! from-scratch Base58Check and Bech32/Bech32m codecs.
//!
//! # Examples
//! ```
//! use hdwallet_core::{Mnemonic, ExtendedPrivateKey, KeyPath, Network};
//!
//! let mnemonic = Mnemonic::from_entropy(&[0u8; 16], None)?;
//! assert_eq!(
//!     mnemonic.phrase(),
//!     "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
//! );
//!
//! let master = ExtendedPrivateKey::from_seed(mnemonic.seed(), Network::MainNet)?;
//! let account = master.derive(&KeyPath::parse("m/44'/0'/0'")?)?;
//! assert_eq!(account.depth(), 3);
//! # Ok::<(), hdwallet_core::Error>(())
//! ```

mod backend;
mod base58;
mod bech32;
mod bits;
mod keypath;
mod mnemonic;
mod walker;
mod xkeys;

pub use keypath::{KeyPath, KeyPathError};
pub use mnemonic::{Bip39Error, Mnemonic};
pub use walker::{account_path, address_path, discover_used_accounts, discover_used_addresses};
pub use xkeys::{
    Bip32Error, ChainCode, ExtendedKey, ExtendedPrivateKey, ExtendedPublicKey, Identifier,
    Network, ParentFingerprint,
};

/// Base58Check encode/decode, exposed for callers building their own
/// address or payload formats on top of the core.
pub mod base58_codec {
    pub use crate::base58::{decode, decode_vec, encode, max_decoded_len, max_encoded_len, Base58Error};
}

/// Bech32/Bech32m encode/decode, exposed for callers building their own
/// HRP-prefixed formats (e.g. segwit addresses) on top of the core.
pub mod bech32_codec {
    pub use crate::bech32::{
        decode, decode_vec, decoded_len, encode, encoded_len, Bech32Error, Variant,
    };
}

pub use base58_codec::Base58Error;
pub use bech32_codec::{Bech32Error, Variant as Bech32Variant};
pub use backend::Invalid as CurveError;

/// Global error definition.
pub mod error {
    use crate::{backend, base58, bech32, keypath, mnemonic, xkeys};

    /// A core operation failed.
    #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        /// Base58Check codec error.
        #[error("base58 error: {0}")]
        Base58(#[from] base58::Base58Error),
        /// Bech32/Bech32m codec error.
        #[error("bech32 error: {0}")]
        Bech32(#[from] bech32::Bech32Error),
        /// BIP-39 mnemonic error.
        #[error("bip39 error: {0}")]
        Bip39(#[from] mnemonic::Bip39Error),
        /// Key path parse error.
        #[error("key path error: {0}")]
        KeyPath(#[from] keypath::KeyPathError),
        /// BIP-32 extended key error.
        #[error("bip32 error: {0}")]
        Bip32(#[from] xkeys::Bip32Error),
        /// secp256k1 backend rejected a scalar or point.
        #[error("curve error: {0}")]
        Curve(#[from] backend::Invalid),
    }
}
pub use error::Error;

/// Bitcoin network used when no explicit [`Network`] is supplied by the
/// caller (e.g. by higher-layer address formatting built on this core).
#[cfg(not(feature = "testnet"))]
pub const NETWORK: Network = Network::MainNet;
/// Bitcoin network used when no explicit [`Network`] is supplied by the
/// caller (e.g. by higher-layer address formatting built on this core).
#[cfg(feature = "testnet")]
pub const NETWORK: Network = Network::TestNet;
