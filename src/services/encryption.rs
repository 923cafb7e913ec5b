use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;

const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for uploaded ID images held in memory.
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Create from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_base64: &str) -> Result<Self, EncryptionError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_base64.trim())
            .map_err(|_| EncryptionError::InvalidKey)?;

        if key_bytes.len() != 32 {
            return Err(EncryptionError::InvalidKey);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| EncryptionError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Fresh random key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Configured key if present, otherwise an ephemeral one.
    pub fn from_optional_key(key_base64: Option<&str>) -> Result<Self, EncryptionError> {
        match key_base64 {
            Some(key) => Self::from_base64_key(key),
            None => {
                tracing::info!("No ENCRYPTION_KEY configured, sealing uploads with an ephemeral key");
                Ok(Self::ephemeral())
            }
        }
    }

    /// Seal bytes. Output is the 12-byte nonce followed by the ciphertext.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| EncryptionError::SealFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if sealed.len() < NONCE_LEN {
            return Err(EncryptionError::OpenFailed);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EncryptionError::OpenFailed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Invalid encryption key (must be 32 bytes, base64-encoded)")]
    InvalidKey,

    #[error("Failed to seal upload")]
    SealFailed,

    #[error("Failed to open sealed upload")]
    OpenFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_upload_opens_to_original_bytes() {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let service = EncryptionService::from_base64_key(&key).unwrap();

        let image = b"\xFF\xD8\xFF\xE0 fake id card";
        let sealed = service.seal(image).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], image.as_slice());
        assert_eq!(service.open(&sealed).unwrap(), image);
    }

    #[test]
    fn short_keys_are_refused() {
        let key = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            EncryptionService::from_base64_key(&key),
            Err(EncryptionError::InvalidKey)
        ));
        assert!(EncryptionService::from_base64_key("%%%").is_err());
    }

    #[test]
    fn other_keys_cannot_open() {
        let sealed = EncryptionService::ephemeral().seal(b"secret").unwrap();
        assert!(EncryptionService::ephemeral().open(&sealed).is_err());
        assert!(EncryptionService::ephemeral().open(b"short").is_err());
    }
}
