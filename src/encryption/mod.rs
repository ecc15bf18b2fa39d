//! PDF encryption support.
//!
//! Implements the Standard Security Handler (ISO 32000-1:2008, Section 7.6;
//! ISO 32000-2:2020 for revision 6) in both directions:
//!
//! - RC4 encryption (40-bit and 128-bit), revisions 2 and 3
//! - AES-128 (AESV2 crypt filter), revision 4
//! - AES-256 (AESV3 crypt filter), revision 6 (revision 5 is read-only)
//!
//! Reading authenticates a password as user or owner password and yields an
//! [`EncryptionHandler`] holding the file key. Writing builds a fresh handler
//! from an [`EncryptionConfig`]. The handler lives on the
//! [`Document`](crate::document::Document) and is applied by the writer.
//!
//! # Security Considerations
//!
//! - RC4-40 is cryptographically weak and should only be used for legacy documents
//! - Password validation uses constant-time comparison
//! - Passwords are never logged and not kept after key derivation
//!
//! # References
//!
//! - PDF Spec Section 7.6: Encryption
//! - PDF Spec Section 7.6.3: Standard Security Handler
//! - PDF 2.0 Spec Section 7.6.4.3.4: Algorithm 2.B

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

mod aes;
mod algorithms;
mod handler;
mod rc4;
mod write_handler;

pub use handler::EncryptionHandler;
pub use write_handler::EncryptionWriteHandler;

pub(crate) use algorithms::random_bytes;

/// Encryption algorithm selectable for locking a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// RC4 with 40-bit key (V=1, R=2)
    Rc4_40,
    /// RC4 with 128-bit key (V=2, R=3)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (V=4, R=4, AESV2)
    Aes128,
    /// AES with 256-bit key in CBC mode (V=5, R=6, AESV3)
    #[default]
    Aes256,
}

impl Algorithm {
    /// Key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 | Algorithm::Aes128 => 16,
            Algorithm::Aes256 => 32,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128 | Algorithm::Aes256)
    }

    /// The `(V, R)` pair written to the encryption dictionary.
    pub fn version_revision(&self) -> (u32, u32) {
        match self {
            Algorithm::Rc4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
            Algorithm::Aes256 => (5, 6),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Rc4_40 => "rc4-40",
            Algorithm::Rc4_128 => "rc4-128",
            Algorithm::Aes128 => "aes-128",
            Algorithm::Aes256 => "aes-256",
        })
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rc4-40" | "rc4_40" => Ok(Algorithm::Rc4_40),
            "rc4-128" | "rc4_128" => Ok(Algorithm::Rc4_128),
            "aes-128" | "aes128" => Ok(Algorithm::Aes128),
            "aes-256" | "aes256" => Ok(Algorithm::Aes256),
            other => Err(Error::InvalidParameter(format!("unknown encryption algorithm '{}'", other))),
        }
    }
}

/// How a class of data (strings or streams) is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    /// Not encrypted (`/Identity` crypt filter)
    Identity,
    /// RC4 with a per-object key
    Rc4,
    /// AES-128-CBC with a per-object key, IV prepended
    AesV2,
    /// AES-256-CBC with the file key, IV prepended
    AesV3,
}

bitflags! {
    /// User access permissions (`/P` entry).
    ///
    /// PDF Spec: Table 22 - User access permissions. Bit positions are the
    /// 1-based bit numbers of the table minus one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Print the document (bit 3)
        const PRINT = 1 << 2;
        /// Modify contents (bit 4)
        const MODIFY = 1 << 3;
        /// Copy or extract text and graphics (bit 5)
        const COPY = 1 << 4;
        /// Add or modify annotations (bit 6)
        const ANNOTATE = 1 << 5;
        /// Fill in form fields (bit 9)
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility (bit 10)
        const ACCESSIBILITY = 1 << 9;
        /// Assemble: insert, rotate, delete pages (bit 11)
        const ASSEMBLE = 1 << 10;
        /// Faithful high-quality print (bit 12)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Reserved bits that must be set in `/P` (bits 7-8 and 13-32).
const P_RESERVED: u32 = 0xFFFF_F0C0;

impl Permissions {
    /// View and print only.
    pub fn read_only() -> Self {
        Permissions::PRINT | Permissions::PRINT_HIGH_QUALITY | Permissions::ACCESSIBILITY
    }

    /// Interpret a signed `/P` value. Reserved bits are dropped.
    pub fn from_bits_p(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }

    /// Signed `/P` value with the reserved bits set.
    pub fn to_p(&self) -> i32 {
        (self.bits() | P_RESERVED) as i32
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all()
    }
}

/// Configuration for locking a document.
///
/// # Example
///
/// ```
/// use minitools_pdf::encryption::{Algorithm, EncryptionConfig, Permissions};
///
/// let config = EncryptionConfig::new("secret")
///     .with_owner_password("admin")
///     .with_algorithm(Algorithm::Aes128)
///     .with_permissions(Permissions::read_only());
/// assert_eq!(config.algorithm, Algorithm::Aes128);
/// assert!(!format!("{:?}", config).contains("secret"));
/// ```
#[derive(Clone)]
pub struct EncryptionConfig {
    /// Password required to open the document (may be empty)
    pub user_password: String,
    /// Password for full access; defaults to the user password
    pub owner_password: Option<String>,
    /// Encryption algorithm
    pub algorithm: Algorithm,
    /// Permissions granted to user-password holders
    pub permissions: Permissions,
    /// Whether XMP metadata streams are encrypted
    pub encrypt_metadata: bool,
}

impl EncryptionConfig {
    /// Create a config with the given user password and default settings.
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: None,
            algorithm: Algorithm::default(),
            permissions: Permissions::all(),
            encrypt_metadata: true,
        }
    }

    /// Set the owner password.
    pub fn with_owner_password(mut self, owner_password: impl Into<String>) -> Self {
        self.owner_password = Some(owner_password.into());
        self
    }

    /// Set the encryption algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Leave metadata streams unencrypted.
    pub fn with_encrypt_metadata(mut self, encrypt: bool) -> Self {
        self.encrypt_metadata = encrypt;
        self
    }

    /// Owner password, falling back to the user password.
    pub(crate) fn effective_owner_password(&self) -> &str {
        self.owner_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.user_password)
    }
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("user_password", &"<redacted>")
            .field("owner_password", &self.owner_password.as_ref().map(|_| "<redacted>"))
            .field("algorithm", &self.algorithm)
            .field("permissions", &self.permissions)
            .field("encrypt_metadata", &self.encrypt_metadata)
            .finish()
    }
}

/// Parsed `/Encrypt` dictionary.
///
/// PDF Spec: Section 7.6.1 - General, Table 20 and Table 21
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Algorithm version (V)
    pub version: u32,
    /// Revision number (R)
    pub revision: u32,
    /// Key length in bytes
    pub key_length: usize,
    /// Owner password entry (O): 32 bytes, or 48 for R>=5
    pub owner_hash: Vec<u8>,
    /// User password entry (U): 32 bytes, or 48 for R>=5
    pub user_hash: Vec<u8>,
    /// Encrypted file key for the owner password (OE, R>=5)
    pub owner_encryption: Option<Vec<u8>>,
    /// Encrypted file key for the user password (UE, R>=5)
    pub user_encryption: Option<Vec<u8>>,
    /// Encrypted permissions (Perms, R>=5)
    pub perms: Option<Vec<u8>>,
    /// Raw permission value (P)
    pub permissions: i32,
    /// EncryptMetadata flag, true by default
    pub encrypt_metadata: bool,
    /// Method applied to strings
    pub string_method: CryptMethod,
    /// Method applied to streams
    pub stream_method: CryptMethod,
}

impl EncryptDict {
    /// Parse and validate an encryption dictionary.
    ///
    /// Non-Standard filters and unknown `(V, R)` combinations fail with
    /// [`Error::UnsupportedEncryption`]; missing required entries with
    /// [`Error::MalformedDocument`].
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let filter = dict.get("Filter").and_then(|o| o.as_name()).unwrap_or("");
        if filter != "Standard" {
            return Err(Error::UnsupportedEncryption(format!(
                "security handler /{} is not supported",
                filter
            )));
        }

        let int = |key: &str| dict.get(key).and_then(|o| o.as_integer());
        let bytes = |key: &str| dict.get(key).and_then(|o| o.as_string()).map(|s| s.to_vec());

        let version = int("V").unwrap_or(0) as u32;
        let revision = int("R").ok_or_else(|| Error::malformed("encryption dictionary has no /R"))? as u32;
        let owner_hash = bytes("O").ok_or_else(|| Error::malformed("encryption dictionary has no /O"))?;
        let user_hash = bytes("U").ok_or_else(|| Error::malformed("encryption dictionary has no /U"))?;
        let permissions = int("P").ok_or_else(|| Error::malformed("encryption dictionary has no /P"))? as i32;
        let encrypt_metadata = dict.get("EncryptMetadata").and_then(|o| o.as_bool()).unwrap_or(true);

        let (key_length, string_method, stream_method) = match (version, revision) {
            (1, 2) => (5, CryptMethod::Rc4, CryptMethod::Rc4),
            (2, 3) => {
                let bits = int("Length").unwrap_or(40);
                if !(40..=128).contains(&bits) || bits % 8 != 0 {
                    return Err(Error::UnsupportedEncryption(format!("RC4 key length {} bits", bits)));
                }
                ((bits / 8) as usize, CryptMethod::Rc4, CryptMethod::Rc4)
            },
            (4, 4) => {
                let strings = crypt_filter_method(dict, "StrF")?;
                let streams = crypt_filter_method(dict, "StmF")?;
                if [strings, streams].contains(&CryptMethod::AesV3) {
                    return Err(Error::UnsupportedEncryption("AESV3 crypt filter with R4".into()));
                }
                (16, strings, streams)
            },
            (5, 5) | (5, 6) => {
                let strings = crypt_filter_method(dict, "StrF")?;
                let streams = crypt_filter_method(dict, "StmF")?;
                (32, strings, streams)
            },
            (v, r) => {
                return Err(Error::UnsupportedEncryption(format!("encryption V={} R={}", v, r)));
            },
        };

        let expected = if revision >= 5 { 48 } else { 32 };
        if owner_hash.len() < expected || user_hash.len() < expected {
            return Err(Error::malformed(format!(
                "/O and /U must be at least {} bytes for R{}",
                expected, revision
            )));
        }

        Ok(Self {
            version,
            revision,
            key_length,
            owner_hash,
            user_hash,
            owner_encryption: bytes("OE"),
            user_encryption: bytes("UE"),
            perms: bytes("Perms"),
            permissions,
            encrypt_metadata,
            string_method,
            stream_method,
        })
    }

    /// The algorithm family this dictionary corresponds to.
    pub fn algorithm(&self) -> Algorithm {
        match (self.revision, self.stream_method) {
            (2, _) => Algorithm::Rc4_40,
            (_, CryptMethod::AesV3) => Algorithm::Aes256,
            (_, CryptMethod::AesV2) => Algorithm::Aes128,
            _ if self.revision >= 5 => Algorithm::Aes256,
            _ => Algorithm::Rc4_128,
        }
    }
}

/// Resolve `/StmF` or `/StrF` through the `/CF` dictionary.
fn crypt_filter_method(dict: &Dict, key: &str) -> Result<CryptMethod> {
    let name = dict.get(key).and_then(|o| o.as_name()).unwrap_or("Identity");
    if name == "Identity" {
        return Ok(CryptMethod::Identity);
    }
    let cfm = dict
        .get("CF")
        .and_then(|cf| cf.as_dict())
        .and_then(|cf| cf.get(name))
        .and_then(|f| f.as_dict())
        .and_then(|f| f.get("CFM"))
        .and_then(|m| m.as_name())
        .ok_or_else(|| Error::malformed(format!("crypt filter /{} is not defined in /CF", name)))?;
    match cfm {
        "V2" => Ok(CryptMethod::Rc4),
        "AESV2" => Ok(CryptMethod::AesV2),
        "AESV3" => Ok(CryptMethod::AesV3),
        "None" => Ok(CryptMethod::Identity),
        other => Err(Error::UnsupportedEncryption(format!("crypt filter method /{}", other))),
    }
}

/// Build the `/CF` entry naming a single `StdCF` crypt filter.
pub(crate) fn std_crypt_filter(cfm: &str, length: i64) -> Object {
    let mut std_cf = Dict::new();
    std_cf.insert("Type".into(), Object::Name("CryptFilter".into()));
    std_cf.insert("CFM".into(), Object::Name(cfm.into()));
    std_cf.insert("AuthEvent".into(), Object::Name("DocOpen".into()));
    std_cf.insert("Length".into(), Object::Integer(length));
    let mut cf = Dict::new();
    cf.insert("StdCF".into(), Object::Dictionary(std_cf));
    Object::Dictionary(cf)
}
