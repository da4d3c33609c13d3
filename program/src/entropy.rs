//! Entropy for winner selection.
//!
//! The program never produces randomness itself. The creator's client draws a
//! value from an [`EntropySource`] (an oracle result, a VRF output, or a fixed
//! value in tests) and passes it in the `SelectWinner` instruction.

/// Supplier of winner-selection entropy.
pub trait EntropySource {
    fn next_entropy(&mut self) -> u64;
}

/// Always yields the same value. Used for replays and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedEntropy(pub u64);

impl EntropySource for FixedEntropy {
    fn next_entropy(&mut self) -> u64 {
        self.0
    }
}

/// Reads successive little-endian words out of a 32-byte randomness result,
/// wrapping around after the fourth word.
#[derive(Clone, Debug)]
pub struct ByteEntropy {
    buffer: [u8; 32],
    cursor: usize,
}

impl ByteEntropy {
    pub fn new(buffer: [u8; 32]) -> Self {
        Self { buffer, cursor: 0 }
    }
}

impl EntropySource for ByteEntropy {
    fn next_entropy(&mut self) -> u64 {
        let value = entropy_from_bytes(&self.buffer[self.cursor..self.cursor + 8]);
        self.cursor = (self.cursor + 8) % self.buffer.len();
        value
    }
}

/// First 8 bytes of `seed` as a little-endian u64, zero padded when shorter.
pub fn entropy_from_bytes(seed: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    let len = std::cmp::min(seed.len(), 8);
    bytes[..len].copy_from_slice(&seed[..len]);
    u64::from_le_bytes(bytes)
}

/// Registry index of the winning ticket, `None` when nothing was sold.
pub fn winner_index(entropy: u64, total_tickets: u32) -> Option<u32> {
    if total_tickets == 0 {
        return None;
    }
    Some((entropy % total_tickets as u64) as u32)
}
