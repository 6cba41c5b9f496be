//! Chained frame cipher
//!
//! Every message exchanged after login is carried as one binary frame built
//! as follows:
//!
//! ```text
//! +------------------- padded_size = 16 * (len / 16 + 1) -------------------+
//! | message bytes ...                  | random filler (last 16 bytes) |n|
//! +-------------------------------------------------------------------------+
//! ```
//!
//! The message is copied over the filler when it reaches into the last block.
//! The low nibble `n` of the final byte holds `len % 16`; 0 marks a message
//! that is an exact multiple of 16 bytes.
//!
//! Blocks are chained with one accumulator per direction:
//!
//! - encrypt: `c = E(acc ^ p)`, then `acc = c ^ p`
//! - decrypt: `p = D(c) ^ acc`, then `acc = c ^ p`

use crate::cipher::BlockCipher;
use crate::constants::{ACCUMULATOR_LENGTH, BLOCK_SIZE, KEY_LENGTH, LENGTH_MARKER_MASK};
use crate::utils::{generate_iv, xor_block};
use exo_core::{ExoError, ExoResult};
use std::fmt;

/// Frame cipher with independent send and receive chaining state
pub struct ChainedFrameCipher {
    cipher: BlockCipher,
    send_accumulator: Option<[u8; ACCUMULATOR_LENGTH]>,
    receive_accumulator: Option<[u8; ACCUMULATOR_LENGTH]>,
}

impl ChainedFrameCipher {
    /// Create a frame cipher around a block cipher
    ///
    /// Both accumulators start unset and must be seeded before use.
    pub fn new(cipher: BlockCipher) -> Self {
        Self {
            cipher,
            send_accumulator: None,
            receive_accumulator: None,
        }
    }

    /// Create a frame cipher from a session key
    pub fn from_key(key: &[u8; KEY_LENGTH]) -> Self {
        Self::new(BlockCipher::new(key))
    }

    /// Seed the send accumulator
    pub fn set_send_accumulator(&mut self, seed: [u8; ACCUMULATOR_LENGTH]) {
        self.send_accumulator = Some(seed);
    }

    /// Seed the receive accumulator
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Security` if the seed is not 16 bytes long
    pub fn set_receive_accumulator(&mut self, seed: &[u8]) -> ExoResult<()> {
        if seed.len() != ACCUMULATOR_LENGTH {
            return Err(ExoError::Security(format!(
                "Accumulator seed must be {} bytes, got {}",
                ACCUMULATOR_LENGTH,
                seed.len()
            )));
        }
        let mut accumulator = [0u8; ACCUMULATOR_LENGTH];
        accumulator.copy_from_slice(seed);
        self.receive_accumulator = Some(accumulator);
        Ok(())
    }

    /// Check if both directions are seeded
    pub fn is_ready(&self) -> bool {
        self.send_accumulator.is_some() && self.receive_accumulator.is_some()
    }

    /// Encrypt a message into one frame, with random filler
    pub fn encrypt(&mut self, message: &str) -> ExoResult<Vec<u8>> {
        let filler = generate_iv()?;
        self.encrypt_with_filler(message, &filler)
    }

    /// Encrypt a message into one frame, with the given filler block
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Security` if the send accumulator is not seeded
    pub fn encrypt_with_filler(
        &mut self,
        message: &str,
        filler: &[u8; BLOCK_SIZE],
    ) -> ExoResult<Vec<u8>> {
        let mut accumulator = self
            .send_accumulator
            .ok_or_else(|| ExoError::Security("Send accumulator not seeded".to_string()))?;

        let data = message.as_bytes();
        let padded_size = BLOCK_SIZE * (data.len() / BLOCK_SIZE + 1);
        let mut buffer = vec![0u8; padded_size];
        buffer[padded_size - BLOCK_SIZE..].copy_from_slice(filler);
        buffer[..data.len()].copy_from_slice(data);
        let marker = (data.len() % BLOCK_SIZE) as u8;
        buffer[padded_size - 1] = (buffer[padded_size - 1] & !LENGTH_MARKER_MASK) | marker;

        for chunk in buffer.chunks_exact_mut(BLOCK_SIZE) {
            let mut plain = [0u8; BLOCK_SIZE];
            plain.copy_from_slice(chunk);
            let encrypted = self.cipher.encrypt_block(&xor_block(&accumulator, &plain));
            accumulator = xor_block(&encrypted, &plain);
            chunk.copy_from_slice(&encrypted);
        }

        self.send_accumulator = Some(accumulator);
        Ok(buffer)
    }

    /// Decrypt one frame back into its message
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Security` if the frame length is not a positive
    /// multiple of 16, the receive accumulator is not seeded, or the message
    /// is not valid UTF-8
    pub fn decrypt(&mut self, frame: &[u8]) -> ExoResult<String> {
        if frame.is_empty() || frame.len() % BLOCK_SIZE != 0 {
            return Err(ExoError::Security(format!(
                "Encrypted frame length {} is not a positive multiple of {}",
                frame.len(),
                BLOCK_SIZE
            )));
        }
        let mut accumulator = self
            .receive_accumulator
            .ok_or_else(|| ExoError::Security("Receive accumulator not seeded".to_string()))?;

        let mut plain = Vec::with_capacity(frame.len());
        for chunk in frame.chunks_exact(BLOCK_SIZE) {
            let mut encrypted = [0u8; BLOCK_SIZE];
            encrypted.copy_from_slice(chunk);
            let block = xor_block(&self.cipher.decrypt_block(&encrypted), &accumulator);
            accumulator = xor_block(&encrypted, &block);
            plain.extend_from_slice(&block);
        }
        self.receive_accumulator = Some(accumulator);

        let marker = (plain[plain.len() - 1] & LENGTH_MARKER_MASK) as usize;
        let length = if marker == 0 {
            plain.len() - BLOCK_SIZE
        } else {
            plain.len() - BLOCK_SIZE + marker
        };
        plain.truncate(length);

        String::from_utf8(plain)
            .map_err(|e| ExoError::Security(format!("Decrypted frame is not UTF-8: {}", e)))
    }
}

impl fmt::Debug for ChainedFrameCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedFrameCipher")
            .field("send_seeded", &self.send_accumulator.is_some())
            .field("receive_seeded", &self.receive_accumulator.is_some())
            .finish()
    }
}
