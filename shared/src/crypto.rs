//! Authenticated encryption for data at rest.
//!
//! Envelope layout (little endian):
//! `magic(8) | version(4) | alg(1) | key_id(4) | nonce(24) | ciphertext | tag(16)`

use aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use zeroize::Zeroize;

const ENVELOPE_MAGIC: [u8; 8] = *b"RSEGTOK1";
const CURRENT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 41;
const TAG_SIZE: usize = 16;
const NONCE_SIZE: usize = 24;
pub const KEY_SIZE: usize = 32;
const MAX_AAD_LEN: usize = 4 * 1024;
const MAX_AAD_FIELD: usize = 256;
const RESERVED_KEY_ID: u32 = 0;

/// Session files hold two tokens; anything near these sizes is garbage.
const MAX_PLAINTEXT: usize = 64 * 1024;
const MAX_ENVELOPE: usize = HEADER_SIZE + MAX_PLAINTEXT + TAG_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptFailure {
    MalformedEnvelope,
    UnsupportedVersion { version: u32 },
    UnsupportedAlgorithm { alg: u8 },
    KeyNotFound { key_id: u32 },
    AuthenticationFailed,
    PayloadTooLarge,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid key id: {0} is reserved")]
    InvalidKeyId(u32),

    #[error("randomness unavailable")]
    RandomUnavailable,

    #[error("plaintext too large: {size} > {max}")]
    PlaintextTooLarge { size: usize, max: usize },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: {0:?}")]
    DecryptionFailed(DecryptFailure),

    #[error("aad too large: {size} > {max}")]
    AadTooLarge { size: usize, max: usize },

    #[error("aad field too large: {field} has {size} > {max}")]
    AadFieldTooLarge {
        field: &'static str,
        size: usize,
        max: usize,
    },

    #[error("aad required but empty")]
    AadRequired,

    #[error("no keys available")]
    NoKeysAvailable,

    #[error("cannot remove primary key {0}, set another primary first")]
    CannotRemovePrimaryKey(u32),

    #[error("key not found: {0}")]
    KeyNotFound(u32),

    #[error("lock poisoned")]
    LockPoisoned,
}

pub trait CryptoProvider: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, envelope: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

pub trait RandomProvider: Send + Sync {
    fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError>;
}

pub struct OsRng;

impl RandomProvider for OsRng {
    fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::getrandom(out).map_err(|_| CryptoError::RandomUnavailable)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AlgId {
    XChaCha20Poly1305 = 1,
}

impl TryFrom<u8> for AlgId {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlgId::XChaCha20Poly1305),
            other => Err(other),
        }
    }
}

#[derive(Default)]
struct KeyStore {
    keys: HashMap<u32, Secret<[u8; KEY_SIZE]>>,
    primary_key_id: Option<u32>,
}

/// Set of device keys. New envelopes use the primary key; any key still in
/// the ring can open envelopes written under it.
pub struct KeyRing<R: RandomProvider = OsRng> {
    store: RwLock<KeyStore>,
    rng: R,
}

impl KeyRing<OsRng> {
    pub fn with_os_rng() -> Self {
        Self::new(OsRng)
    }

    /// Ring holding a single key supplied by the platform keystore.
    pub fn from_key(key_id: u32, key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let ring = Self::with_os_rng();
        ring.add_key(key_id, key_bytes)?;
        Ok(ring)
    }
}

impl<R: RandomProvider> KeyRing<R> {
    pub fn new(rng: R) -> Self {
        Self {
            store: RwLock::new(KeyStore::default()),
            rng,
        }
    }

    /// Fresh random key material, for shells that have nothing stored yet.
    pub fn generate_key(&self) -> Result<Secret<[u8; KEY_SIZE]>, CryptoError> {
        let mut k = [0u8; KEY_SIZE];
        self.rng.fill(&mut k)?;
        let secret = Secret::new(k);
        k.zeroize();
        Ok(secret)
    }

    pub fn add_key(&self, key_id: u32, key_bytes: &[u8]) -> Result<(), CryptoError> {
        if key_id == RESERVED_KEY_ID {
            return Err(CryptoError::InvalidKeyId(key_id));
        }

        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key_bytes.len(),
            });
        }

        let mut k = [0u8; KEY_SIZE];
        k.copy_from_slice(key_bytes);

        let mut store = self.store.write().map_err(|_| CryptoError::LockPoisoned)?;
        let is_first = store.keys.is_empty();
        store.keys.insert(key_id, Secret::new(k));
        if is_first {
            store.primary_key_id = Some(key_id);
        }

        k.zeroize();
        Ok(())
    }

    pub fn set_primary(&self, key_id: u32) -> Result<(), CryptoError> {
        let mut store = self.store.write().map_err(|_| CryptoError::LockPoisoned)?;
        if !store.keys.contains_key(&key_id) {
            return Err(CryptoError::KeyNotFound(key_id));
        }
        store.primary_key_id = Some(key_id);
        Ok(())
    }

    pub fn remove_key(&self, key_id: u32) -> Result<(), CryptoError> {
        let mut store = self.store.write().map_err(|_| CryptoError::LockPoisoned)?;
        if store.primary_key_id == Some(key_id) {
            return Err(CryptoError::CannotRemovePrimaryKey(key_id));
        }
        store.keys.remove(&key_id);
        Ok(())
    }

    pub fn primary_key_id(&self) -> Result<Option<u32>, CryptoError> {
        let store = self.store.read().map_err(|_| CryptoError::LockPoisoned)?;
        Ok(store.primary_key_id)
    }

    fn cipher_for(&self, key_id: u32) -> Result<XChaCha20Poly1305, CryptoError> {
        let store = self.store.read().map_err(|_| CryptoError::LockPoisoned)?;
        let secret = store.keys.get(&key_id).ok_or(CryptoError::DecryptionFailed(
            DecryptFailure::KeyNotFound { key_id },
        ))?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(secret.expose_secret())))
    }
}

fn check_aad(aad: &[u8]) -> Result<(), CryptoError> {
    if aad.is_empty() {
        return Err(CryptoError::AadRequired);
    }
    if aad.len() > MAX_AAD_LEN {
        return Err(CryptoError::AadTooLarge {
            size: aad.len(),
            max: MAX_AAD_LEN,
        });
    }
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, CryptoError> {
    bytes
        .get(at..at + 4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(u32::from_le_bytes)
        .ok_or(CryptoError::DecryptionFailed(DecryptFailure::MalformedEnvelope))
}

impl<R: RandomProvider> CryptoProvider for KeyRing<R> {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if plaintext.len() > MAX_PLAINTEXT {
            return Err(CryptoError::PlaintextTooLarge {
                size: plaintext.len(),
                max: MAX_PLAINTEXT,
            });
        }
        check_aad(aad)?;

        let key_id = self
            .primary_key_id()?
            .ok_or(CryptoError::NoKeysAvailable)?;
        let cipher = self
            .cipher_for(key_id)
            .map_err(|_| CryptoError::NoKeysAvailable)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes)?;

        let pt_end = HEADER_SIZE + plaintext.len();
        let mut out = vec![0u8; pt_end + TAG_SIZE];

        out[0..8].copy_from_slice(&ENVELOPE_MAGIC);
        out[8..12].copy_from_slice(&CURRENT_VERSION.to_le_bytes());
        out[12] = AlgId::XChaCha20Poly1305 as u8;
        out[13..17].copy_from_slice(&key_id.to_le_bytes());
        out[17..HEADER_SIZE].copy_from_slice(&nonce_bytes);
        out[HEADER_SIZE..pt_end].copy_from_slice(plaintext);

        let tag = cipher
            .encrypt_in_place_detached(
                XNonce::from_slice(&nonce_bytes),
                aad,
                &mut out[HEADER_SIZE..pt_end],
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        out[pt_end..].copy_from_slice(&tag);
        Ok(out)
    }

    fn decrypt(&self, envelope: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if envelope.len() < HEADER_SIZE + TAG_SIZE || envelope[0..8] != ENVELOPE_MAGIC {
            return Err(CryptoError::DecryptionFailed(
                DecryptFailure::MalformedEnvelope,
            ));
        }
        if envelope.len() > MAX_ENVELOPE {
            return Err(CryptoError::DecryptionFailed(
                DecryptFailure::PayloadTooLarge,
            ));
        }
        check_aad(aad)?;

        let version = read_u32(envelope, 8)?;
        if version != CURRENT_VERSION {
            return Err(CryptoError::DecryptionFailed(
                DecryptFailure::UnsupportedVersion { version },
            ));
        }

        let alg = envelope[12];
        AlgId::try_from(alg).map_err(|alg| {
            CryptoError::DecryptionFailed(DecryptFailure::UnsupportedAlgorithm { alg })
        })?;

        let key_id = read_u32(envelope, 13)?;
        let cipher = self.cipher_for(key_id)?;

        let nonce = XNonce::from_slice(&envelope[17..HEADER_SIZE]);
        let ct_end = envelope.len() - TAG_SIZE;
        let mut buffer = envelope[HEADER_SIZE..ct_end].to_vec();
        let tag = &envelope[ct_end..];

        if cipher
            .decrypt_in_place_detached(nonce, aad, &mut buffer, tag.into())
            .is_err()
        {
            buffer.zeroize();
            return Err(CryptoError::DecryptionFailed(
                DecryptFailure::AuthenticationFailed,
            ));
        }

        Ok(buffer)
    }
}

/// Associated data binding an envelope to the app, the store it belongs to
/// and the store's schema version. Fields are length-prefixed.
pub fn build_aad(
    app_ns: &str,
    store_name: &str,
    schema_version: u32,
) -> Result<Vec<u8>, CryptoError> {
    let mut aad = Vec::with_capacity(4 + app_ns.len() + store_name.len() + 4);
    for (field, value) in [("app_ns", app_ns), ("store_name", store_name)] {
        let len = u16::try_from(value.len())
            .ok()
            .filter(|len| usize::from(*len) <= MAX_AAD_FIELD)
            .ok_or(CryptoError::AadFieldTooLarge {
                field,
                size: value.len(),
                max: MAX_AAD_FIELD,
            })?;
        aad.extend_from_slice(&len.to_le_bytes());
        aad.extend_from_slice(value.as_bytes());
    }
    aad.extend_from_slice(&schema_version.to_le_bytes());
    Ok(aad)
}
