//! Encrypted persistence of the [`Store`].
//!
//! The whole store is one JSON document, encrypted as a unit and written to
//! a single file. Plaintext never touches disk: if encryption is unavailable
//! [`EncryptedStore::save`] refuses with [`PersistError::EncryptionUnavailable`]
//! and [`EncryptedStore::load`] returns an empty store without reading the file.
//!
//! # Recovery
//!
//! A store file that cannot be decrypted or parsed, or whose `version` is
//! not [`STORE_VERSION`], is treated as absent: `load` returns an empty
//! default store and logs a warning. The next `save` overwrites it.
//!
//! # Key file
//!
//! [`KeyFileStorage`] keeps a random 256-bit AES-GCM key hex-encoded in a
//! separate file, created on first use with mode `0600` on Unix. A missing
//! key next to an existing store is never regenerated. Every
//! ciphertext is `nonce (12 bytes) || AES-256-GCM(plaintext)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::{Store, STORE_VERSION};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("encryption is not available; the RAG store cannot be used safely")]
    EncryptionUnavailable,
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Platform secret storage used to seal the store file.
pub trait SecureStorage: Send + Sync {
    fn is_available(&self) -> bool;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PersistError>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PersistError>;
}

/// AES-256-GCM with a key kept in a local file.
pub struct KeyFileStorage {
    cipher: Option<Aes256Gcm>,
}

impl KeyFileStorage {
    /// Load the key at `key_path`, generating it when the file does not exist.
    ///
    /// A key is only generated while no store exists at `store_path`: a
    /// sealed store without its key stays unreadable instead of being
    /// silently replaced by a store sealed under a fresh key.
    ///
    /// Any failure (unreadable or malformed key, unwritable location, lost
    /// key) leaves the storage unavailable rather than erroring, so callers
    /// get the uniform [`PersistError::EncryptionUnavailable`] at first use.
    pub fn open(key_path: &Path, store_path: &Path) -> Self {
        let cipher = match load_or_create_key(key_path, store_path) {
            Ok(key) => Aes256Gcm::new_from_slice(&key).ok(),
            Err(e) => {
                tracing::warn!(path = %key_path.display(), error = %e, "encryption key unavailable");
                None
            }
        };
        Self { cipher }
    }
}

fn load_or_create_key(key_path: &Path, store_path: &Path) -> Result<Vec<u8>, PersistError> {
    if key_path.exists() {
        let raw = fs::read_to_string(key_path).map_err(|e| PersistError::io(key_path, e))?;
        let key = hex::decode(raw.trim())
            .map_err(|e| PersistError::Crypto(format!("malformed key file: {}", e)))?;
        if key.len() != KEY_LEN {
            return Err(PersistError::Crypto(format!(
                "key file holds {} bytes, expected {}",
                key.len(),
                KEY_LEN
            )));
        }
        return Ok(key);
    }

    if store_path.exists() {
        return Err(PersistError::Crypto(format!(
            "key file missing but store {} exists; refusing to generate a new key",
            store_path.display()
        )));
    }

    let key = Aes256Gcm::generate_key(OsRng);
    write_private(key_path, format!("{}\n", hex::encode(key)).as_bytes())?;
    tracing::info!(path = %key_path.display(), "generated new store encryption key");
    Ok(key.to_vec())
}

impl SecureStorage for KeyFileStorage {
    fn is_available(&self) -> bool {
        self.cipher.is_some()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PersistError> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or(PersistError::EncryptionUnavailable)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| PersistError::Crypto("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PersistError> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or(PersistError::EncryptionUnavailable)?;
        if ciphertext.len() < NONCE_LEN {
            return Err(PersistError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        cipher.decrypt(Nonce::from_slice(nonce), body).map_err(|_| {
            PersistError::Crypto("decryption failed (wrong key or corrupted data)".to_string())
        })
    }
}

/// A [`Store`] sealed in a single file through a [`SecureStorage`].
pub struct EncryptedStore<S> {
    path: PathBuf,
    storage: S,
}

impl<S: SecureStorage> EncryptedStore<S> {
    pub fn new(path: impl Into<PathBuf>, storage: S) -> Self {
        Self {
            path: path.into(),
            storage,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_available()
    }

    /// Read the current snapshot.
    ///
    /// A missing or unreadable store yields the default store, as does
    /// unavailable encryption (the file is never read as plaintext). Only an
    /// I/O failure reading an existing file errors.
    pub fn load(&self) -> Result<Store, PersistError> {
        if !self.storage.is_available() {
            tracing::warn!("encryption unavailable; not reading store");
            return Ok(Store::default());
        }
        if !self.path.exists() {
            return Ok(Store::default());
        }

        let raw = fs::read(&self.path).map_err(|e| PersistError::io(&self.path, e))?;
        match self.decode(&raw) {
            Ok(store) => Ok(store),
            Err(reason) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %reason,
                    "discarding unreadable store; starting empty"
                );
                Ok(Store::default())
            }
        }
    }

    fn decode(&self, raw: &[u8]) -> Result<Store, String> {
        let plain = self.storage.decrypt(raw).map_err(|e| e.to_string())?;
        let value: serde_json::Value = serde_json::from_slice(&plain).map_err(|e| e.to_string())?;
        let version = value.get("version").and_then(|v| v.as_u64());
        if version != Some(STORE_VERSION as u64) {
            return Err(format!("unsupported store version {:?}", version));
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    /// Seal and atomically replace the store file.
    pub fn save(&self, store: &Store) -> Result<(), PersistError> {
        if !self.storage.is_available() {
            return Err(PersistError::EncryptionUnavailable);
        }
        let json = serde_json::to_vec(store)?;
        let sealed = self.storage.encrypt(&json)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        write_private(&tmp, &sealed)?;
        fs::rename(&tmp, &self.path).map_err(|e| PersistError::io(&self.path, e))?;
        Ok(())
    }
}

/// Write `bytes` to a fresh file readable only by the owner (Unix).
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| PersistError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PersistError::io(path, e))?;
    file.sync_all().map_err(|e| PersistError::io(path, e))?;
    Ok(())
}
