//! Request signature for the `musics.fcg` endpoint.
//!
//! Flow: body bytes → SHA-1 → upper-case hex `H`
//!
//! - `part1` = `H` at [`PART_1_INDEXES`]
//! - `part2` = `H` at [`PART_2_INDEXES`]
//! - `part3` = digest XOR [`SCRAMBLE_VALUES`] → base64 with `\ / + =` stripped
//!
//! `sign = lowercase("zzc" + part1 + part2 + part3)`
//!
//! The signature covers the exact bytes that are POSTed, so the body must be
//! serialized once and reused.

use base64::{Engine, engine::general_purpose::STANDARD as B64};
use rand::Rng;
use sha1::{Digest, Sha1};

// Vendor table is [23, 14, 6, 36, 16, 40, 7, 19]; 40 is past the digest.
const PART_1_INDEXES: [usize; 7] = [23, 14, 6, 36, 16, 7, 19];
const PART_2_INDEXES: [usize; 8] = [16, 1, 32, 12, 19, 27, 8, 5];
const SCRAMBLE_VALUES: [u8; 20] = [
    89, 39, 179, 150, 218, 82, 58, 252, 177, 52, 186, 123, 120, 64, 242, 133, 143, 161, 121, 179,
];

/// Compute the `sign` query parameter for a serialized request body.
pub fn sign(body: &[u8]) -> String {
    let digest = Sha1::digest(body);

    let upper = hex::encode_upper(digest);
    let upper = upper.as_bytes();

    let scrambled: Vec<u8> = digest
        .iter()
        .zip(SCRAMBLE_VALUES)
        .map(|(d, s)| d ^ s)
        .collect();
    let part3 = B64.encode(scrambled);

    let mut out = String::with_capacity(48);
    out.push_str("zzc");
    out.extend(PART_1_INDEXES.iter().map(|&i| char::from(upper[i])));
    out.extend(PART_2_INDEXES.iter().map(|&i| char::from(upper[i])));
    out.extend(
        part3
            .chars()
            .filter(|c| !matches!(c, '\\' | '/' | '+' | '=')),
    );
    out.to_ascii_lowercase()
}

/// Random 32-character lowercase hex device id for vkey requests.
pub fn guid() -> String {
    const CHARSET: &[u8] = b"abcdef1234567890";
    let mut rng = rand::rng();
    (0..32)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}
