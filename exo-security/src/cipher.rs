//! AES-128 block primitive

use crate::constants::{BLOCK_SIZE, KEY_LENGTH};
use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use exo_core::{ExoError, ExoResult};
use std::fmt;

/// Single-block AES-128 cipher (ECB, no chaining)
///
/// Chaining is done by the callers: the login derives one block, the frame
/// cipher applies its own accumulator rule on top.
#[derive(Clone)]
pub struct BlockCipher {
    cipher: Aes128,
}

impl BlockCipher {
    /// Create a block cipher from a 128-bit key
    pub fn new(key: &[u8; KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Create a block cipher from a key slice
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Security` if the key is not 16 bytes long
    pub fn from_slice(key: &[u8]) -> ExoResult<Self> {
        let cipher = Aes128::new_from_slice(key).map_err(|_| {
            ExoError::Security(format!(
                "Key must be {} bytes, got {}",
                KEY_LENGTH,
                key.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Encrypt one block
    pub fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut buffer = GenericArray::clone_from_slice(block);
        self.cipher.encrypt_block(&mut buffer);
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&buffer);
        out
    }

    /// Decrypt one block
    pub fn decrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut buffer = GenericArray::clone_from_slice(block);
        self.cipher.decrypt_block(&mut buffer);
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&buffer);
        out
    }
}

impl fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCipher").finish_non_exhaustive()
    }
}
