use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::ZlibDecoder;

use crate::cipher::{QRC_KEY, tdes_ecb_decrypt};
use crate::error::{QrcError, Result};

/// Upper bound on one inflated lyric document.
pub const MAX_INFLATED_LEN: u64 = 8 * 1024 * 1024;

/// First character of every plain LRC/QRC document.
pub const PLAINTEXT_SENTINEL: u8 = b'[';

/// Decode one lyric field exactly as the vendor ships it.
///
/// 1. base64-decode the payload;
/// 2. decoded text starting with `[` is already plain lyric text;
/// 3. otherwise the decoded text is hex ciphertext for [`decrypt_hex`].
///
/// Some fields (notably word-synced QRC) arrive as bare hex without the
/// base64 layer, so a hex payload that did not decode to anything usable is
/// decrypted directly.
pub fn decode_field(payload: &str) -> Result<String> {
    let payload = payload.trim();
    let decoded = BASE64.decode(payload);

    if let Ok(bytes) = &decoded {
        if bytes.first() == Some(&PLAINTEXT_SENTINEL) {
            return Ok(String::from_utf8(bytes.clone())?);
        }
        if is_hex(bytes) {
            // is_hex guarantees ASCII
            return decrypt_hex(&String::from_utf8_lossy(bytes));
        }
    }

    if is_hex(payload.as_bytes()) {
        return decrypt_hex(payload);
    }

    match decoded {
        Err(e) => Err(e.into()),
        Ok(_) => Err(QrcError::NotCiphertext),
    }
}

/// Hex → triple-DES → zlib inflate → UTF-8.
pub fn decrypt_hex(hex_text: &str) -> Result<String> {
    let ciphertext = hex::decode(hex_text.trim())?;
    let compressed = tdes_ecb_decrypt(&QRC_KEY, &ciphertext)?;

    let inflated = inflate(&compressed, MAX_INFLATED_LEN)?;
    Ok(String::from_utf8(inflated)?)
}

/// zlib inflate, refusing output longer than `limit` bytes.
fn inflate(compressed: &[u8], limit: u64) -> Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed)
        .take(limit + 1)
        .read_to_end(&mut inflated)?;
    if inflated.len() as u64 > limit {
        return Err(QrcError::TooLarge(limit));
    }
    Ok(inflated)
}

fn is_hex(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_hexdigit)
}
