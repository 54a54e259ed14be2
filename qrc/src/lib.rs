//! Decoding of QQ Music lyric payloads.
//!
//! Lyric fields (`lyric`, `trans`, `qrc`, `roma`) come back from the vendor
//! either as base64 plain text or as hex-encoded, triple-DES encrypted,
//! zlib-compressed documents. [`decode_field`] handles both shapes.

mod cipher;
mod decoder;
pub mod error;

pub use cipher::{QRC_KEY, tdes_ecb_decrypt};
pub use decoder::{PLAINTEXT_SENTINEL, decode_field, decrypt_hex};
pub use error::{QrcError, Result};
