//! AES encryption/decryption for PDF.
//!
//! Object data uses AES-CBC with PKCS#7 padding and a 16-byte IV prepended
//! to the ciphertext. Revision 6 key handling additionally needs unpadded
//! CBC (Algorithm 2.B, `/OE`, `/UE`) and single-block ECB (`/Perms`).
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

use crate::error::{Error, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};

const BLOCK: usize = 16;

fn crypto_error(what: &str) -> Error {
    Error::malformed(format!("AES {}", what))
}

/// CBC-encrypt block-aligned data without padding. Key is 16 or 32 bytes.
pub fn cbc_encrypt_no_pad(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % BLOCK != 0 {
        return Err(crypto_error("input is not block aligned"));
    }
    let mut buf = data.to_vec();
    let len = buf.len();
    match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| crypto_error("key or IV has invalid length"))?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map(|_| ())
            .map_err(|_| crypto_error("encryption failed"))?,
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| crypto_error("key or IV has invalid length"))?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map(|_| ())
            .map_err(|_| crypto_error("encryption failed"))?,
        n => return Err(crypto_error(&format!("key must be 16 or 32 bytes, got {}", n))),
    }
    Ok(buf)
}

/// CBC-decrypt block-aligned data without removing padding.
pub fn cbc_decrypt_no_pad(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % BLOCK != 0 {
        return Err(crypto_error("ciphertext is not block aligned"));
    }
    let mut buf = data.to_vec();
    match key.len() {
        16 => {
            cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|_| crypto_error("key or IV has invalid length"))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| crypto_error("decryption failed"))?;
        },
        32 => {
            cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|_| crypto_error("key or IV has invalid length"))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| crypto_error("decryption failed"))?;
        },
        n => return Err(crypto_error(&format!("key must be 16 or 32 bytes, got {}", n))),
    }
    Ok(buf)
}

/// Encrypt with PKCS#7 padding and return `IV || ciphertext`.
pub fn encrypt_with_iv(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    let pad = BLOCK - data.len() % BLOCK;
    let mut padded = Vec::with_capacity(data.len() + pad);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat_n(pad as u8, pad));

    let mut out = iv.to_vec();
    out.extend(cbc_encrypt_no_pad(key, iv, &padded)?);
    Ok(out)
}

/// Decrypt `IV || ciphertext` and strip PKCS#7 padding.
pub fn decrypt_with_iv(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < BLOCK {
        return Err(crypto_error("data shorter than the IV"));
    }
    let (iv, ciphertext) = data.split_at(BLOCK);
    if ciphertext.is_empty() {
        return Ok(Vec::new());
    }
    let mut plain = cbc_decrypt_no_pad(key, iv, ciphertext)?;

    let pad = plain.last().copied().unwrap_or(0) as usize;
    if pad == 0 || pad > BLOCK || plain[plain.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(crypto_error("invalid PKCS#7 padding"));
    }
    plain.truncate(plain.len() - pad);
    Ok(plain)
}

/// Encrypt one block with AES-256 in ECB mode (the `/Perms` entry).
pub fn ecb256_encrypt_block(key: &[u8], block: &[u8; 16]) -> Result<[u8; 16]> {
    let cipher = Aes256::new_from_slice(key).map_err(|_| crypto_error("key must be 32 bytes"))?;
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    Ok(buf.into())
}

/// Decrypt one block with AES-256 in ECB mode.
pub fn ecb256_decrypt_block(key: &[u8], block: &[u8]) -> Result<[u8; 16]> {
    if block.len() < BLOCK {
        return Err(crypto_error("/Perms is shorter than one block"));
    }
    let cipher = Aes256::new_from_slice(key).map_err(|_| crypto_error("key must be 32 bytes"))?;
    let mut buf = GenericArray::clone_from_slice(&block[..BLOCK]);
    cipher.decrypt_block(&mut buf);
    Ok(buf.into())
}
