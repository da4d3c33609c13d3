// Raffle settlement program
// Sells fixed-price tickets, escrows the proceeds in a shared treasury, picks
// one winner from injected entropy and pays the pool out exactly once.

pub mod constants;
pub mod engine;
pub mod entropy;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{error::RaffleError, processor::Processor};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    Processor::process(program_id, accounts, instruction_data).map_err(|error| {
        match &error {
            ProgramError::Custom(code) => match RaffleError::from_code(*code) {
                Some(raffle_error) => msg!("Raffle error: {}", raffle_error),
                None => msg!("Unknown custom error: {}", code),
            },
            other => msg!("Program error: {}", other),
        }
        error
    })
}
