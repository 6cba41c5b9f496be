//! Security utility functions for EXOsocket

use crate::constants::{ACCUMULATOR_LENGTH, BLOCK_SIZE};
use exo_core::{ExoError, ExoResult};
use rand::RngCore;
use ring::rand::{SecureRandom, SystemRandom};

/// Reverse the byte order of a 32-bit value
///
/// Nonces travel on the wire byte-swapped relative to how they enter the
/// key derivation.
pub fn swap_u32(value: u32) -> u32 {
    value.swap_bytes()
}

/// Generate a random 32-bit value
pub fn random_u32() -> u32 {
    rand::thread_rng().next_u32()
}

/// Generate a random 16-byte block
///
/// Used for chaining accumulator seeds and frame filler.
pub fn generate_iv() -> ExoResult<[u8; ACCUMULATOR_LENGTH]> {
    let rng = SystemRandom::new();
    let mut iv = [0u8; ACCUMULATOR_LENGTH];
    rng.fill(&mut iv).map_err(|_| {
        log::debug!("System random source refused a {}-byte block", ACCUMULATOR_LENGTH);
        ExoError::Security("Failed to generate random block".to_string())
    })?;
    Ok(iv)
}

/// XOR two blocks
pub fn xor_block(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}
