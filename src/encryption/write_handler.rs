//! Encryption on write.
//!
//! [`EncryptionWriteHandler::create`] turns an [`EncryptionConfig`] into a new
//! [`EncryptionHandler`] (computing `/O`, `/U` and, for AES-256, `/OE`, `/UE`
//! and `/Perms`). During serialization [`EncryptionWriteHandler`] encrypts
//! every string and stream with the key for the object's final number.

use super::algorithms::{self, LegacyParams};
use super::{Algorithm, CryptMethod, EncryptionConfig, EncryptionHandler, aes, rc4, std_crypt_filter};
use crate::error::Result;
use crate::object::{Dict, Object, ObjectRef};

/// Encrypts objects as they are written.
pub struct EncryptionWriteHandler<'a> {
    handler: &'a EncryptionHandler,
}

impl<'a> EncryptionWriteHandler<'a> {
    /// Wrap an authenticated handler.
    pub fn new(handler: &'a EncryptionHandler) -> Self {
        Self { handler }
    }

    /// Build a new security handler for `config`.
    ///
    /// `file_id` is the first element of the trailer `/ID`; R2-R4 keys depend on it.
    pub fn create(config: &EncryptionConfig, file_id: &[u8]) -> Result<EncryptionHandler> {
        let algorithm = config.algorithm;
        let (v, r) = algorithm.version_revision();
        let p = config.permissions.to_p();

        let mut dict = Dict::new();
        dict.insert("Filter".into(), Object::Name("Standard".into()));
        dict.insert("V".into(), Object::Integer(v as i64));
        dict.insert("R".into(), Object::Integer(r as i64));
        dict.insert("Length".into(), Object::Integer(algorithm.key_length() as i64 * 8));
        dict.insert("P".into(), Object::Integer(p as i64));
        if !config.encrypt_metadata {
            dict.insert("EncryptMetadata".into(), Object::Boolean(false));
        }

        let key = match algorithm {
            Algorithm::Aes256 => {
                let user = algorithms::prepare_password_r6(&config.user_password);
                let owner = algorithms::prepare_password_r6(config.effective_owner_password());
                let key = algorithms::random_bytes(32);
                let entries = algorithms::compute_r6_entries(user, owner, &key, p, config.encrypt_metadata)?;
                dict.insert("O".into(), Object::String(entries.owner_hash));
                dict.insert("U".into(), Object::String(entries.user_hash));
                dict.insert("OE".into(), Object::String(entries.owner_encryption));
                dict.insert("UE".into(), Object::String(entries.user_encryption));
                dict.insert("Perms".into(), Object::String(entries.perms));
                insert_crypt_filters(&mut dict, "AESV3", 32);
                key
            },
            _ => {
                let user = algorithms::prepare_password_legacy(&config.user_password);
                let owner = algorithms::prepare_password_legacy(config.effective_owner_password());
                let o = algorithms::compute_owner_hash(&owner, &user, r, algorithm.key_length());
                let params = LegacyParams {
                    revision: r,
                    key_length: algorithm.key_length(),
                    owner_hash: &o,
                    permissions: p,
                    file_id,
                    encrypt_metadata: config.encrypt_metadata,
                };
                let key = algorithms::compute_encryption_key(&user, &params);
                let u = algorithms::compute_user_hash(&key, &params);
                dict.insert("O".into(), Object::String(o));
                dict.insert("U".into(), Object::String(u));
                if algorithm == Algorithm::Aes128 {
                    insert_crypt_filters(&mut dict, "AESV2", 16);
                }
                key
            },
        };

        log::debug!("Created {} security handler (V={}, R={})", algorithm, v, r);
        EncryptionHandler::from_parts(dict, key, file_id)
    }

    /// Encrypt one payload for object `r`. AES payloads get a fresh random IV.
    pub fn encrypt_bytes(&self, r: ObjectRef, method: CryptMethod, data: &[u8]) -> Result<Vec<u8>> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4::rc4_crypt(&self.handler.key_for(r, method), data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => {
                let mut iv = [0u8; 16];
                iv.copy_from_slice(&algorithms::random_bytes(16));
                aes::encrypt_with_iv(&self.handler.key_for(r, method), &iv, data)
            },
        }
    }

    /// Encrypt every string and the stream payload of an object written as `r`.
    pub fn encrypt_object(&self, r: ObjectRef, obj: &mut Object) -> Result<()> {
        if super::handler::is_exempt(obj, self.handler.encrypt_metadata()) {
            return Ok(());
        }
        let string_method = self.handler.string_method();
        obj.map_strings(&mut |s| self.encrypt_bytes(r, string_method, s))?;
        if let Object::Stream { data, .. } = obj {
            let sealed = self.encrypt_bytes(r, self.handler.stream_method(), data)?;
            *data = bytes::Bytes::from(sealed);
        }
        Ok(())
    }
}

fn insert_crypt_filters(dict: &mut Dict, cfm: &str, length: i64) {
    dict.insert("CF".into(), std_crypt_filter(cfm, length));
    dict.insert("StmF".into(), Object::Name("StdCF".into()));
    dict.insert("StrF".into(), Object::Name("StdCF".into()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::Permissions;
    use crate::error::Error;

    const ID: &[u8] = b"0123456789abcdef";

    fn round_trip(algorithm: Algorithm) {
        let config = EncryptionConfig::new("user")
            .with_owner_password("owner")
            .with_algorithm(algorithm);
        let created = EncryptionWriteHandler::create(&config, ID).unwrap();
        assert_eq!(created.algorithm(), algorithm);

        let opened = EncryptionHandler::open(created.encrypt_dict(), ID, "user").unwrap();
        assert_eq!(opened.key(), created.key());
        let by_owner = EncryptionHandler::open(created.encrypt_dict(), ID, "owner").unwrap();
        assert_eq!(by_owner.key(), created.key());
        assert!(matches!(
            EncryptionHandler::open(created.encrypt_dict(), ID, "wrong"),
            Err(Error::IncorrectPassword)
        ));

        let writer = EncryptionWriteHandler::new(&created);
        let r = ObjectRef::new(7, 0);
        let mut dict = Dict::new();
        dict.insert("Author".into(), Object::String(b"Ada".to_vec()));
        let mut obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"q 1 0 0 1 0 0 cm Q"),
        };
        writer.encrypt_object(r, &mut obj).unwrap();
        assert_ne!(obj.as_dict().unwrap()["Author"].as_string(), Some(&b"Ada"[..]));

        opened.decrypt_object(r, &mut obj).unwrap();
        let Object::Stream { dict, data } = obj else { panic!("not a stream") };
        assert_eq!(dict["Author"].as_string(), Some(&b"Ada"[..]));
        assert_eq!(&data[..], b"q 1 0 0 1 0 0 cm Q");
    }

    #[test]
    fn test_rc4_40_round_trip() {
        round_trip(Algorithm::Rc4_40);
    }

    #[test]
    fn test_rc4_128_round_trip() {
        round_trip(Algorithm::Rc4_128);
    }

    #[test]
    fn test_aes128_round_trip() {
        round_trip(Algorithm::Aes128);
    }

    #[test]
    fn test_aes256_round_trip() {
        round_trip(Algorithm::Aes256);
    }

    #[test]
    fn test_permissions_written() {
        let config = EncryptionConfig::new("").with_permissions(Permissions::read_only());
        let created = EncryptionWriteHandler::create(&config, ID).unwrap();
        assert_eq!(created.permissions(), Permissions::read_only());
        assert_eq!(
            created.encrypt_dict()["P"].as_integer(),
            Some(Permissions::read_only().to_p() as i64)
        );
    }

    #[test]
    fn test_empty_user_password_opens() {
        let config = EncryptionConfig::new("").with_owner_password("owner");
        let created = EncryptionWriteHandler::create(&config, ID).unwrap();
        assert!(EncryptionHandler::open(created.encrypt_dict(), ID, "").is_ok());
    }
}
