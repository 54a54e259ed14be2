use base64::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrcError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] DecodeError),
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("ciphertext length {0} is not a multiple of the 8-byte block size")]
    BlockLength(usize),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("zlib inflate error: {0}")]
    Inflate(#[from] std::io::Error),
    #[error("inflated lyric exceeds {0} bytes")]
    TooLarge(u64),
    #[error("lyric text is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload is neither plain lyric text nor hex ciphertext")]
    NotCiphertext,
}

pub type Result<T> = std::result::Result<T, QrcError>;
