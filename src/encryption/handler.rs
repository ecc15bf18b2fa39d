//! Encryption handler for PDF documents.
//!
//! Authenticates a password against a parsed `/Encrypt` dictionary and holds
//! the resulting file key. The handler decrypts objects on load and, through
//! [`EncryptionWriteHandler`](super::EncryptionWriteHandler), encrypts them
//! again on write.

use super::algorithms::{self, LegacyParams, ModernParams};
use super::{Algorithm, CryptMethod, EncryptDict, Permissions, aes, rc4};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};

/// Authenticated security handler state.
#[derive(Clone)]
pub struct EncryptionHandler {
    /// Parsed dictionary
    dict: EncryptDict,
    /// Dictionary as written to the file
    raw: Dict,
    /// File key
    key: Vec<u8>,
    /// First `/ID` element the key was derived from
    file_id: Vec<u8>,
}

impl std::fmt::Debug for EncryptionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionHandler")
            .field("algorithm", &self.algorithm())
            .field("revision", &self.dict.revision)
            .field("permissions", &self.permissions())
            .finish_non_exhaustive()
    }
}

impl EncryptionHandler {
    /// Authenticate `password` against an encryption dictionary.
    ///
    /// The password is tried as the user password first, then as the owner
    /// password. Fails with [`Error::IncorrectPassword`] when neither matches.
    ///
    /// # Arguments
    ///
    /// * `encrypt` - The resolved `/Encrypt` dictionary
    /// * `file_id` - The first element of the trailer `/ID` array (may be empty)
    /// * `password` - The password to try (empty string for no password)
    pub fn open(encrypt: &Dict, file_id: &[u8], password: &str) -> Result<Self> {
        let dict = EncryptDict::from_dict(encrypt)?;
        log::debug!(
            "Document is encrypted with {} (V={}, R={})",
            dict.algorithm(),
            dict.version,
            dict.revision
        );

        let key = if dict.revision >= 5 {
            let params = ModernParams {
                revision: dict.revision,
                owner_hash: &dict.owner_hash,
                user_hash: &dict.user_hash,
                owner_encryption: dict.owner_encryption.as_deref().unwrap_or(&[]),
                user_encryption: dict.user_encryption.as_deref().unwrap_or(&[]),
            };
            let pw = algorithms::prepare_password_r6(password);
            match algorithms::authenticate_user_r6(pw, &params)? {
                Some(key) => Some(key),
                None => algorithms::authenticate_owner_r6(pw, &params)?,
            }
        } else {
            let params = LegacyParams {
                revision: dict.revision,
                key_length: dict.key_length,
                owner_hash: &dict.owner_hash,
                permissions: dict.permissions,
                file_id,
                encrypt_metadata: dict.encrypt_metadata,
            };
            let pw = algorithms::prepare_password_legacy(password);
            algorithms::authenticate_user(&pw, &dict.user_hash, &params)
                .or_else(|| algorithms::authenticate_owner(&pw, &dict.user_hash, &params))
        };

        let key = key.ok_or(Error::IncorrectPassword)?;
        if let Some(perms) = dict.perms.as_deref() {
            if !algorithms::perms_match(&key, perms, dict.permissions) {
                log::warn!("/Perms does not match /P, continuing with /P");
            }
        }
        log::debug!("Password accepted");

        Ok(Self {
            dict,
            raw: encrypt.clone(),
            key,
            file_id: file_id.to_vec(),
        })
    }

    /// Assemble a handler from freshly computed parts.
    pub(crate) fn from_parts(raw: Dict, key: Vec<u8>, file_id: &[u8]) -> Result<Self> {
        let dict = EncryptDict::from_dict(&raw)?;
        Ok(Self {
            dict,
            raw,
            key,
            file_id: file_id.to_vec(),
        })
    }

    /// The file key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// File identifier bound to the key. The trailer `/ID` must start with
    /// it for R2-R4 files to open again.
    pub fn file_id(&self) -> &[u8] {
        &self.file_id
    }

    /// Encryption dictionary to write.
    pub fn encrypt_dict(&self) -> &Dict {
        &self.raw
    }

    /// Algorithm family.
    pub fn algorithm(&self) -> Algorithm {
        self.dict.algorithm()
    }

    /// User permissions.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_bits_p(self.dict.permissions)
    }

    /// Whether metadata streams are encrypted.
    pub fn encrypt_metadata(&self) -> bool {
        self.dict.encrypt_metadata
    }

    pub(crate) fn string_method(&self) -> CryptMethod {
        self.dict.string_method
    }

    pub(crate) fn stream_method(&self) -> CryptMethod {
        self.dict.stream_method
    }

    /// Key for `method` applied to object `r`.
    pub(crate) fn key_for(&self, r: ObjectRef, method: CryptMethod) -> Vec<u8> {
        match method {
            CryptMethod::AesV3 => self.key.clone(),
            CryptMethod::AesV2 => algorithms::object_key(&self.key, r.id, r.gen, true),
            _ => algorithms::object_key(&self.key, r.id, r.gen, false),
        }
    }

    /// Decrypt one string or stream payload belonging to object `r`.
    pub fn decrypt_bytes(&self, r: ObjectRef, method: CryptMethod, data: &[u8]) -> Result<Vec<u8>> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4::rc4_crypt(&self.key_for(r, method), data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => {
                if data.is_empty() {
                    return Ok(Vec::new());
                }
                aes::decrypt_with_iv(&self.key_for(r, method), data)
                    .map_err(|e| Error::malformed(format!("object {}: {}", r, e)))
            },
        }
    }

    /// Decrypt every string and the stream payload of object `r` in place.
    pub fn decrypt_object(&self, r: ObjectRef, obj: &mut Object) -> Result<()> {
        if is_exempt(obj, self.encrypt_metadata()) {
            return Ok(());
        }
        let string_method = self.string_method();
        obj.map_strings(&mut |s| self.decrypt_bytes(r, string_method, s))?;
        if let Object::Stream { data, .. } = obj {
            let plain = self.decrypt_bytes(r, self.stream_method(), data)?;
            *data = bytes::Bytes::from(plain);
        }
        Ok(())
    }
}

/// Objects that are never encrypted: cross-reference streams, and metadata
/// streams when `/EncryptMetadata` is false.
pub(crate) fn is_exempt(obj: &Object, encrypt_metadata: bool) -> bool {
    match obj.dict_type() {
        Some("XRef") => matches!(obj, Object::Stream { .. }),
        Some("Metadata") => !encrypt_metadata && matches!(obj, Object::Stream { .. }),
        _ => false,
    }
}
