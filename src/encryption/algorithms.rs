//! Standard security handler algorithms.
//!
//! Key derivation and password validation for revisions 2-4 (MD5/RC4 based,
//! ISO 32000-1 Section 7.6.3.3-7.6.3.4) and revisions 5-6 (SHA-2 based,
//! ISO 32000-2 Section 7.6.4.3).

use super::aes;
use super::rc4::{rc4_crypt, rc4_rounds};
use crate::error::Result;
use md5::{Digest, Md5};
use sha2::{Sha256, Sha384, Sha512};

/// Padding string used in PDF encryption (32 bytes).
///
/// PDF Spec: Algorithm 2, step a
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Pad or truncate a password to 32 bytes using the standard padding.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PADDING[..32 - n]);
    padded
}

/// Parameters of an R2-R4 handler needed for key derivation.
#[derive(Debug, Clone, Copy)]
pub struct LegacyParams<'a> {
    /// Revision (2, 3 or 4)
    pub revision: u32,
    /// Key length in bytes
    pub key_length: usize,
    /// `/O` entry
    pub owner_hash: &'a [u8],
    /// `/P` entry
    pub permissions: i32,
    /// First element of the trailer `/ID`
    pub file_id: &'a [u8],
    /// `/EncryptMetadata`
    pub encrypt_metadata: bool,
}

/// Compute the file key from a user password (Algorithm 2).
pub fn compute_encryption_key(password: &[u8], params: &LegacyParams<'_>) -> Vec<u8> {
    let n = params.key_length.clamp(5, 16);
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(&params.owner_hash[..params.owner_hash.len().min(32)]);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    let mut hash = hasher.finalize().to_vec();

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(if params.revision == 2 { 5 } else { n });
    hash
}

/// RC4 key derived from the owner password (Algorithm 3, steps a-d).
fn owner_rc4_key(owner_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let n = if revision == 2 { 5 } else { key_length.clamp(5, 16) };
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

/// Compute the `/O` entry (Algorithm 3).
pub fn compute_owner_hash(owner_password: &[u8], user_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let key = owner_rc4_key(owner_password, revision, key_length);
    let padded_user = pad_password(user_password);
    if revision == 2 {
        rc4_crypt(&key, &padded_user)
    } else {
        rc4_rounds(&key, &padded_user, 0..20)
    }
}

/// Compute the `/U` entry from the file key (Algorithm 4 for R2, Algorithm 5 for R3/R4).
pub fn compute_user_hash(file_key: &[u8], params: &LegacyParams<'_>) -> Vec<u8> {
    if params.revision == 2 {
        return rc4_crypt(file_key, &PADDING);
    }
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(params.file_id);
    let digest = hasher.finalize();
    let mut u = rc4_rounds(file_key, &digest, 0..20);
    // 16 arbitrary bytes of padding
    u.extend_from_slice(&PADDING[..16]);
    u
}

/// Validate a user password (Algorithm 6). Returns the file key on success.
pub fn authenticate_user(password: &[u8], user_hash: &[u8], params: &LegacyParams<'_>) -> Option<Vec<u8>> {
    let key = compute_encryption_key(password, params);
    let expected = compute_user_hash(&key, params);
    let matches = if params.revision == 2 {
        constant_time_eq(&expected[..32], &user_hash[..32])
    } else {
        constant_time_eq(&expected[..16], &user_hash[..16])
    };
    matches.then_some(key)
}

/// Validate an owner password (Algorithm 7). Returns the file key on success.
///
/// Decrypting `/O` with the owner key recovers the padded user password,
/// which is then checked with [`authenticate_user`].
pub fn authenticate_owner(password: &[u8], user_hash: &[u8], params: &LegacyParams<'_>) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params.revision, params.key_length);
    let owner = &params.owner_hash[..32];
    let user_password = if params.revision == 2 {
        rc4_crypt(&key, owner)
    } else {
        rc4_rounds(&key, owner, (0..20).rev())
    };
    authenticate_user(&user_password, user_hash, params)
}

/// Hash a password for R5/R6 (Algorithm 2.B; plain SHA-256 for R5).
///
/// `udata` is the 48-byte `/U` entry for owner operations and empty for user operations.
pub fn hash_r6(password: &[u8], salt: &[u8], udata: &[u8], revision: u32) -> Result<[u8; 32]> {
    let mut k: Vec<u8> = {
        let mut h = Sha256::new();
        h.update(password);
        h.update(salt);
        h.update(udata);
        h.finalize().to_vec()
    };

    if revision >= 6 {
        let mut round = 0usize;
        loop {
            let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + udata.len()));
            for _ in 0..64 {
                k1.extend_from_slice(password);
                k1.extend_from_slice(&k);
                k1.extend_from_slice(udata);
            }
            let e = aes::cbc_encrypt_no_pad(&k[..16], &k[16..32], &k1)?;
            let selector = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
            k = match selector {
                0 => Sha256::digest(&e).to_vec(),
                1 => Sha384::digest(&e).to_vec(),
                _ => Sha512::digest(&e).to_vec(),
            };
            round += 1;
            let last = e.last().copied().unwrap_or(0) as usize;
            if round >= 64 && last + 32 <= round {
                break;
            }
        }
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    Ok(out)
}

/// Entries of an R6 dictionary needed to authenticate.
#[derive(Debug, Clone, Copy)]
pub struct ModernParams<'a> {
    /// Revision (5 or 6)
    pub revision: u32,
    /// `/O` entry (48 bytes)
    pub owner_hash: &'a [u8],
    /// `/U` entry (48 bytes)
    pub user_hash: &'a [u8],
    /// `/OE` entry (32 bytes)
    pub owner_encryption: &'a [u8],
    /// `/UE` entry (32 bytes)
    pub user_encryption: &'a [u8],
}

/// Validate an R5/R6 user password. Returns the file key on success.
pub fn authenticate_user_r6(password: &[u8], params: &ModernParams<'_>) -> Result<Option<Vec<u8>>> {
    let u = params.user_hash;
    let hash = hash_r6(password, &u[32..40], &[], params.revision)?;
    if !constant_time_eq(&hash, &u[..32]) {
        return Ok(None);
    }
    let key = hash_r6(password, &u[40..48], &[], params.revision)?;
    unwrap_file_key(&key, params.user_encryption).map(Some)
}

/// Validate an R5/R6 owner password. Returns the file key on success.
pub fn authenticate_owner_r6(password: &[u8], params: &ModernParams<'_>) -> Result<Option<Vec<u8>>> {
    let o = params.owner_hash;
    let u48 = &params.user_hash[..48];
    let hash = hash_r6(password, &o[32..40], u48, params.revision)?;
    if !constant_time_eq(&hash, &o[..32]) {
        return Ok(None);
    }
    let key = hash_r6(password, &o[40..48], u48, params.revision)?;
    unwrap_file_key(&key, params.owner_encryption).map(Some)
}

fn unwrap_file_key(key: &[u8; 32], wrapped: &[u8]) -> Result<Vec<u8>> {
    if wrapped.len() < 32 {
        return Err(crate::error::Error::malformed("/OE or /UE is shorter than 32 bytes"));
    }
    aes::cbc_decrypt_no_pad(key, &[0u8; 16], &wrapped[..32])
}

/// `/U`, `/UE`, `/O`, `/OE` and `/Perms` for a new R6 handler.
#[derive(Debug, Clone)]
pub struct R6Entries {
    /// `/U`
    pub user_hash: Vec<u8>,
    /// `/UE`
    pub user_encryption: Vec<u8>,
    /// `/O`
    pub owner_hash: Vec<u8>,
    /// `/OE`
    pub owner_encryption: Vec<u8>,
    /// `/Perms`
    pub perms: Vec<u8>,
}

/// Compute the R6 password entries for `file_key` (Algorithms 8, 9 and 10).
pub fn compute_r6_entries(
    user_password: &[u8],
    owner_password: &[u8],
    file_key: &[u8],
    permissions: i32,
    encrypt_metadata: bool,
) -> Result<R6Entries> {
    let salts = random_bytes(32);
    let (u_validation, u_key, o_validation, o_key) = (&salts[..8], &salts[8..16], &salts[16..24], &salts[24..32]);

    let mut user_hash = hash_r6(user_password, u_validation, &[], 6)?.to_vec();
    user_hash.extend_from_slice(u_validation);
    user_hash.extend_from_slice(u_key);
    let ue_key = hash_r6(user_password, u_key, &[], 6)?;
    let user_encryption = aes::cbc_encrypt_no_pad(&ue_key, &[0u8; 16], file_key)?;

    let mut owner_hash = hash_r6(owner_password, o_validation, &user_hash, 6)?.to_vec();
    owner_hash.extend_from_slice(o_validation);
    owner_hash.extend_from_slice(o_key);
    let oe_key = hash_r6(owner_password, o_key, &user_hash, 6)?;
    let owner_encryption = aes::cbc_encrypt_no_pad(&oe_key, &[0u8; 16], file_key)?;

    let mut block = [0u8; 16];
    block[..4].copy_from_slice(&permissions.to_le_bytes());
    block[4..8].copy_from_slice(&[0xFF; 4]);
    block[8] = if encrypt_metadata { b'T' } else { b'F' };
    block[9..12].copy_from_slice(b"adb");
    block[12..].copy_from_slice(&random_bytes(4));
    let perms = aes::ecb256_encrypt_block(file_key, &block)?.to_vec();

    Ok(R6Entries {
        user_hash,
        user_encryption,
        owner_hash,
        owner_encryption,
        perms,
    })
}

/// Check the decrypted `/Perms` block against `/P`.
pub fn perms_match(file_key: &[u8], perms: &[u8], permissions: i32) -> bool {
    match aes::ecb256_decrypt_block(file_key, perms) {
        Ok(block) => &block[9..12] == b"adb" && block[..4] == permissions.to_le_bytes(),
        Err(_) => false,
    }
}

/// Per-object key (Algorithm 1). AES-256 uses the file key directly.
pub fn object_key(file_key: &[u8], id: u32, gen: u16, aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(gen.to_le_bytes());
    if aes {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    hash[..(file_key.len() + 5).min(16)].to_vec()
}

/// Random bytes: UUID v4 output hashed with the current time.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());
        let hash = hasher.finalize();
        let take = (len - out.len()).min(hash.len());
        out.extend_from_slice(&hash[..take]);
    }
    out
}

/// UTF-8 password truncated to 127 bytes on a character boundary (R5/R6).
pub fn prepare_password_r6(password: &str) -> &[u8] {
    let mut end = password.len().min(127);
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password.as_bytes()[..end]
}

/// Password bytes for R2-R4: Latin-1 where possible, else raw UTF-8.
pub fn prepare_password_legacy(password: &str) -> Vec<u8> {
    if password.chars().all(|c| (c as u32) < 256) {
        password.chars().map(|c| c as u8).collect()
    } else {
        password.as_bytes().to_vec()
    }
}

/// Constant-time comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
