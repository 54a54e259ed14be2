use des::TdesEde3;
use ecb::cipher::{BlockDecryptMut, KeyInit, block_padding::NoPadding};

use crate::error::{QrcError, Result};

type TdesEcbDec = ecb::Decryptor<TdesEde3>;

/// DES block size in bytes.
pub const BLOCK_SIZE: usize = 8;

/// Key used by the vendor for every encrypted lyric field.
pub const QRC_KEY: [u8; 24] = *b"!@#)(*$%123ZXC!@!@#)(NHL";

/// Triple-DES (EDE3) ECB decrypt without unpadding.
///
/// Lyric ciphertext is a zlib stream padded with garbage up to the block
/// size, so the trailing bytes are left for the inflater to ignore.
pub fn tdes_ecb_decrypt(key: &[u8; 24], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(QrcError::BlockLength(data.len()));
    }
    let mut buf = data.to_vec();
    TdesEcbDec::new(key.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map(<[u8]>::to_vec)
        .map_err(|e| QrcError::Decrypt(e.to_string()))
}

#[cfg(test)]
pub(crate) fn tdes_ecb_encrypt(key: &[u8; 24], data: &[u8]) -> Vec<u8> {
    use ecb::cipher::BlockEncryptMut;
    type TdesEcbEnc = ecb::Encryptor<TdesEde3>;

    let padded_len = data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut buf = vec![0u8; padded_len];
    buf[..data.len()].copy_from_slice(data);
    TdesEcbEnc::new(key.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, padded_len)
        .unwrap()
        .to_vec()
}
