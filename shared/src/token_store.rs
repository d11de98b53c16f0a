//! Access/refresh token pair, cached in memory and persisted encrypted.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::{build_aad, CryptoError, CryptoProvider};

pub const APP_NAMESPACE: &str = "recetas-seguras";
pub const STORE_NAME: &str = "auth_prefs";
const CURRENT_SCHEMA_VERSION: u32 = 1;
const STORE_MAGIC: &[u8; 4] = b"RSAP";
const MAX_STORE_BYTES: usize = 128 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted store: {reason}")]
    Corrupted { reason: &'static str },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    #[error("schema version {found} is newer than supported {max}")]
    FutureSchema { found: u32, max: u32 },

    #[error("store too large: {size} bytes, max {max}")]
    StoreTooLarge { size: usize, max: usize },
}

impl From<ciborium::de::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// A complete token pair. Half a session is not representable.
#[derive(Clone)]
pub struct Session {
    access_token: SecretString,
    refresh_token: SecretString,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Where the token pair lives between launches.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Session>, StoreError>;
    fn save(&self, session: &Session) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local persistence. Clones share the same slot, so a store can be
/// "reopened" over it.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct StoreEnvelope {
    magic: [u8; 4],
    schema_version: u32,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: String,
}

impl Drop for StoredTokens {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

/// Encrypted single-file store for the `auth_prefs` token pair.
pub struct EncryptedFilePersistence {
    path: PathBuf,
    crypto: Arc<dyn CryptoProvider>,
    aad: Vec<u8>,
}

impl EncryptedFilePersistence {
    pub fn new(path: impl Into<PathBuf>, crypto: Arc<dyn CryptoProvider>) -> Result<Self, StoreError> {
        Ok(Self {
            path: path.into(),
            crypto,
            aad: build_aad(APP_NAMESPACE, STORE_NAME, CURRENT_SCHEMA_VERSION)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, envelope: &StoreEnvelope) -> Result<Vec<u8>, StoreError> {
        let mut envelope_bytes = Vec::new();
        ciborium::into_writer(envelope, &mut envelope_bytes)?;
        let sealed = self.crypto.encrypt(&envelope_bytes, &self.aad);
        envelope_bytes.zeroize();
        Ok(sealed?)
    }

    fn serialize_encrypted(&self, session: &Session) -> Result<Vec<u8>, StoreError> {
        let tokens = StoredTokens {
            access_token: session.access_token.expose_secret().clone(),
            refresh_token: session.refresh_token.expose_secret().clone(),
        };

        let mut payload = Vec::new();
        ciborium::into_writer(&tokens, &mut payload)?;

        let checksum = blake3::hash(&payload);
        let mut envelope = StoreEnvelope {
            magic: *STORE_MAGIC,
            schema_version: CURRENT_SCHEMA_VERSION,
            checksum: *checksum.as_bytes(),
            payload,
        };

        let sealed = self.seal(&envelope);
        envelope.payload.zeroize();
        sealed
    }

    fn deserialize_encrypted(&self, encrypted: &[u8]) -> Result<Session, StoreError> {
        if encrypted.len() > MAX_STORE_BYTES {
            return Err(StoreError::StoreTooLarge {
                size: encrypted.len(),
                max: MAX_STORE_BYTES,
            });
        }

        let mut envelope_bytes = self.crypto.decrypt(encrypted, &self.aad)?;
        let envelope: Result<StoreEnvelope, _> = ciborium::from_reader(&envelope_bytes[..]);
        envelope_bytes.zeroize();
        let mut envelope = envelope?;

        if envelope.magic != *STORE_MAGIC {
            return Err(StoreError::Corrupted {
                reason: "invalid magic bytes",
            });
        }

        if envelope.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::FutureSchema {
                found: envelope.schema_version,
                max: CURRENT_SCHEMA_VERSION,
            });
        }

        let actual = blake3::hash(&envelope.payload);
        if actual.as_bytes() != &envelope.checksum {
            return Err(StoreError::IntegrityCheckFailed {
                expected: hex::encode(envelope.checksum),
                actual: hex::encode(actual.as_bytes()),
            });
        }

        let tokens: Result<StoredTokens, _> = ciborium::from_reader(&envelope.payload[..]);
        envelope.payload.zeroize();
        let tokens = tokens?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(StoreError::Corrupted {
                reason: "incomplete token pair",
            });
        }

        Ok(Session::new(
            tokens.access_token.clone(),
            tokens.refresh_token.clone(),
        ))
    }
}

impl SessionPersistence for EncryptedFilePersistence {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let encrypted = std::fs::read(&self.path)?;
        if encrypted.is_empty() {
            return Err(StoreError::Corrupted {
                reason: "empty file",
            });
        }

        self.deserialize_encrypted(&encrypted).map(Some)
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let encrypted = self.serialize_encrypted(session)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encrypted)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Shared holder of the current session.
///
/// Reads come from the in-memory cache. Writes update the cache first and
/// then persistence, so a failing disk never leaves the running process
/// without the tokens it was just given. Writes are serialised end to end:
/// the cache and the backend always finish in the same order.
pub struct TokenStore {
    cache: RwLock<Option<Session>>,
    writes: Mutex<()>,
    persistence: Box<dyn SessionPersistence>,
}

impl TokenStore {
    pub fn open(persistence: impl SessionPersistence + 'static) -> Result<Self, StoreError> {
        let session = persistence.load()?;
        tracing::debug!(has_session = session.is_some(), "token store opened");
        Ok(Self {
            cache: RwLock::new(session),
            writes: Mutex::new(()),
            persistence: Box::new(persistence),
        })
    }

    /// Like [`TokenStore::open`], but an unreadable store is wiped and the
    /// user simply starts logged out.
    pub fn open_or_reset(persistence: impl SessionPersistence + 'static) -> Self {
        let session = match persistence.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "stored session unreadable, starting logged out");
                if let Err(e) = persistence.clear() {
                    tracing::warn!(error = %e, "failed to remove unreadable session");
                }
                None
            }
        };
        Self {
            cache: RwLock::new(session),
            writes: Mutex::new(()),
            persistence: Box::new(persistence),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            cache: RwLock::new(None),
            writes: Mutex::new(()),
            persistence: Box::new(MemoryPersistence::new()),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.session().map(|s| s.access_token)
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        self.session().map(|s| s.refresh_token)
    }

    pub fn has_session(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stores both tokens. The cache is updated even if persisting fails.
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let session = Session::new(access_token, refresh_token);
        let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        self.persistence.save(&session)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.persistence.clear()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_session", &self.has_session())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyRing;
    use tempfile::tempdir;

    fn keyring(fill: u8) -> Arc<dyn CryptoProvider> {
        Arc::new(KeyRing::from_key(1, &[fill; 32]).unwrap())
    }

    fn expose(token: Option<SecretString>) -> Option<String> {
        token.map(|t| t.expose_secret().clone())
    }

    #[test]
    fn last_save_wins() {
        let store = TokenStore::in_memory();
        store.save_tokens("a1", "r1").unwrap();
        store.save_tokens("a2", "r2").unwrap();

        assert_eq!(expose(store.access_token()).as_deref(), Some("a2"));
        assert_eq!(expose(store.refresh_token()).as_deref(), Some("r2"));
    }

    #[test]
    fn clear_removes_both_tokens() {
        let store = TokenStore::in_memory();
        store.save_tokens("a", "r").unwrap();
        store.clear().unwrap();

        assert!(!store.has_session());
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    /// Memory backend that stalls inside `save`, leaving room for a
    /// concurrent `clear` to run.
    struct SlowSave {
        inner: MemoryPersistence,
        entered: Arc<std::sync::Barrier>,
    }

    impl SessionPersistence for SlowSave {
        fn load(&self) -> Result<Option<Session>, StoreError> {
            self.inner.load()
        }

        fn save(&self, session: &Session) -> Result<(), StoreError> {
            self.entered.wait();
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.inner.save(session)
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear()
        }
    }

    #[test]
    fn clear_during_slow_save_keeps_cache_and_disk_in_step() {
        let inner = MemoryPersistence::new();
        let entered = Arc::new(std::sync::Barrier::new(2));
        let store = Arc::new(
            TokenStore::open(SlowSave {
                inner: inner.clone(),
                entered: entered.clone(),
            })
            .unwrap(),
        );

        let saver = {
            let store = store.clone();
            std::thread::spawn(move || store.save_tokens("rotated", "r2").unwrap())
        };
        entered.wait();
        let clearer = {
            let store = store.clone();
            std::thread::spawn(move || store.clear().unwrap())
        };
        saver.join().unwrap();
        clearer.join().unwrap();

        // The save started first, so the clear lands after it on both sides.
        assert!(!store.has_session());
        assert_eq!(inner.load().unwrap(), None);
        assert!(!TokenStore::open(inner).unwrap().has_session());
    }

    #[test]
    fn reopen_over_same_persistence() {
        let persistence = MemoryPersistence::new();
        let store = TokenStore::open(persistence.clone()).unwrap();
        store.save_tokens("a", "r").unwrap();

        let reopened = TokenStore::open(persistence).unwrap();
        assert_eq!(reopened.session(), Some(Session::new("a", "r")));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", Session::new("secret-access", "secret-refresh"));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn encrypted_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth_prefs.bin");
        let crypto = keyring(7);

        let store =
            TokenStore::open(EncryptedFilePersistence::new(&path, crypto.clone()).unwrap()).unwrap();
        assert!(!store.has_session());
        store.save_tokens("access-1", "refresh-1").unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(!raw.windows(8).any(|w| w == b"access-1"));

        let reopened =
            TokenStore::open(EncryptedFilePersistence::new(&path, crypto).unwrap()).unwrap();
        assert_eq!(reopened.session(), Some(Session::new("access-1", "refresh-1")));
    }

    #[test]
    fn missing_file_means_no_session() {
        let dir = tempdir().unwrap();
        let persistence =
            EncryptedFilePersistence::new(dir.path().join("none.bin"), keyring(7)).unwrap();
        assert!(persistence.load().unwrap().is_none());
        persistence.clear().unwrap();
    }

    #[test]
    fn empty_file_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let persistence = EncryptedFilePersistence::new(&path, keyring(7)).unwrap();
        assert!(matches!(
            persistence.load(),
            Err(StoreError::Corrupted { reason: "empty file" })
        ));
    }

    #[test]
    fn different_key_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");

        EncryptedFilePersistence::new(&path, keyring(7))
            .unwrap()
            .save(&Session::new("a", "r"))
            .unwrap();

        let other = EncryptedFilePersistence::new(&path, keyring(9)).unwrap();
        assert!(matches!(other.load(), Err(StoreError::Crypto(_))));
    }

    #[test]
    fn tampered_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");
        let persistence = EncryptedFilePersistence::new(&path, keyring(7)).unwrap();
        persistence.save(&Session::new("a", "r")).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0x01;
        std::fs::write(&path, raw).unwrap();

        assert!(persistence.load().is_err());
    }

    #[test]
    fn future_schema_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");
        let persistence = EncryptedFilePersistence::new(&path, keyring(7)).unwrap();

        let payload = b"irrelevant".to_vec();
        let sealed = persistence
            .seal(&StoreEnvelope {
                magic: *STORE_MAGIC,
                schema_version: CURRENT_SCHEMA_VERSION + 1,
                checksum: *blake3::hash(&payload).as_bytes(),
                payload,
            })
            .unwrap();
        std::fs::write(&path, sealed).unwrap();

        assert!(matches!(
            persistence.load(),
            Err(StoreError::FutureSchema { found: 2, max: 1 })
        ));
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");
        let persistence = EncryptedFilePersistence::new(&path, keyring(7)).unwrap();

        let sealed = persistence
            .seal(&StoreEnvelope {
                magic: *STORE_MAGIC,
                schema_version: CURRENT_SCHEMA_VERSION,
                checksum: [0u8; 32],
                payload: b"payload".to_vec(),
            })
            .unwrap();
        std::fs::write(&path, sealed).unwrap();

        assert!(matches!(
            persistence.load(),
            Err(StoreError::IntegrityCheckFailed { .. })
        ));
    }

    #[test]
    fn open_or_reset_wipes_unreadable_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");
        std::fs::write(&path, b"garbage").unwrap();

        let store = TokenStore::open_or_reset(EncryptedFilePersistence::new(&path, keyring(7)).unwrap());
        assert!(!store.has_session());
        assert!(!path.exists());
    }

    #[test]
    fn clear_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.bin");
        let store =
            TokenStore::open(EncryptedFilePersistence::new(&path, keyring(7)).unwrap()).unwrap();
        store.save_tokens("a", "r").unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
    }
}
