//! EXOsocket security constants

/// Block size of the AES primitive and of every framing unit, in bytes
pub const BLOCK_SIZE: usize = 16;

/// Length of the derived session key, in bytes (AES-128)
pub const KEY_LENGTH: usize = 16;

/// Length of a chaining accumulator seed exchanged after login, in bytes
pub const ACCUMULATOR_LENGTH: usize = BLOCK_SIZE;

/// Mask selecting the length marker stored in the last byte of a frame
pub const LENGTH_MARKER_MASK: u8 = 0x0F;
