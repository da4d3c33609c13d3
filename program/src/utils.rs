use solana_program::pubkey::Pubkey;

use crate::constants::{LAMPORTS_PER_SOL, PARTICIPANTS_SEED, RAFFLE_SEED, TREASURY_SEED};

/// Find the program derived address of a raffle record
pub fn find_raffle_address(program_id: &Pubkey, name: &str, creator: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, name.as_bytes(), creator.as_ref()], program_id)
}

/// Find the program derived address of a raffle's participant registry
pub fn find_participants_address(program_id: &Pubkey, raffle: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PARTICIPANTS_SEED, raffle.as_ref()], program_id)
}

/// Find the program derived address of the shared treasury
pub fn find_treasury_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[TREASURY_SEED], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
