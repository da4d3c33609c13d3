/// Seed prefix of the raffle record PDA: `["raffle", name, creator]`.
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Seed prefix of the participant registry PDA: `["participants", raffle]`.
pub const PARTICIPANTS_SEED: &[u8] = b"participants";

/// Seed of the shared treasury escrow PDA.
pub const TREASURY_SEED: &[u8] = b"treasury";

/// Lamports the creator moves into the treasury when a raffle is initialized.
pub const INIT_TREASURY_FUND: u64 = 10_000_000; // 0.01 SOL

/// A PDA seed is at most 32 bytes, and the name is one.
pub const MAX_NAME_LEN: usize = 32;

/// Upper bound on `max_tickets`. The registry is allocated in one CPI, which
/// the runtime caps at 10 KiB of account data.
pub const MAX_PARTICIPANTS: u32 = 300;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
