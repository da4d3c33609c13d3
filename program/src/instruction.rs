use solana_program::{
    clock::UnixTimestamp,
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    constants::MAX_NAME_LEN,
    entropy::EntropySource,
    error::RaffleError,
    utils::{find_participants_address, find_raffle_address, find_treasury_address},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create a raffle and fund the treasury
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The creator, pays for both accounts and the treasury fund
    /// 1. `[writable]` The raffle record PDA `["raffle", name, creator]`
    /// 2. `[writable]` The participant registry PDA `["participants", raffle]`
    /// 3. `[writable]` The treasury PDA `["treasury"]`
    /// 4. `[]` The system program
    Initialize {
        /// Name of the raffle, 1 to 32 bytes
        name: String,
        /// Price per ticket in lamports
        ticket_price: u64,
        max_tickets: u32,
        /// Unix timestamp after which tickets can no longer be bought
        end_time: UnixTimestamp,
    },

    /// Buy one ticket
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The buyer
    /// 1. `[writable]` The raffle record
    /// 2. `[writable]` The participant registry
    /// 3. `[writable]` The treasury
    /// 4. `[]` The system program
    Participate {
        /// Lamports paid, must equal the ticket price
        payment: u64,
    },

    /// Pick the winner from the registry
    ///
    /// Accounts expected:
    /// 0. `[signer]` The raffle creator
    /// 1. `[writable]` The raffle record
    /// 2. `[]` The participant registry
    SelectWinner {
        /// Externally supplied randomness
        entropy: u64,
    },

    /// Pay the pool out to the winner and close the raffle
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The winner
    /// 1. `[writable]` The raffle record
    /// 2. `[writable]` The treasury
    /// 3. `[]` The system program
    ClaimReward,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let (name, rest) = Self::unpack_name(rest)?;
                let (ticket_price, rest) = Self::unpack_u64(rest)?;
                let (max_tickets, rest) = Self::unpack_u32(rest)?;
                let (end_time, _) = Self::unpack_i64(rest)?;
                Self::Initialize {
                    name,
                    ticket_price,
                    max_tickets,
                    end_time,
                }
            }
            1 => {
                let (payment, _) = Self::unpack_u64(rest)?;
                Self::Participate { payment }
            }
            2 => {
                let (entropy, _) = Self::unpack_u64(rest)?;
                Self::SelectWinner { entropy }
            }
            3 => Self::ClaimReward,
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::Initialize {
                name,
                ticket_price,
                max_tickets,
                end_time,
            } => {
                buf.push(0);
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
                buf.extend_from_slice(&ticket_price.to_le_bytes());
                buf.extend_from_slice(&max_tickets.to_le_bytes());
                buf.extend_from_slice(&end_time.to_le_bytes());
            }
            Self::Participate { payment } => {
                buf.push(1);
                buf.extend_from_slice(&payment.to_le_bytes());
            }
            Self::SelectWinner { entropy } => {
                buf.push(2);
                buf.extend_from_slice(&entropy.to_le_bytes());
            }
            Self::ClaimReward => buf.push(3),
        }
        buf
    }

    fn unpack_name(input: &[u8]) -> Result<(String, &[u8]), ProgramError> {
        let (&len, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstruction)?;
        let len = len as usize;
        if len > MAX_NAME_LEN || rest.len() < len {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (name, rest) = rest.split_at(len);
        let name = std::str::from_utf8(name)
            .map_err(|_| RaffleError::InvalidInstruction)?
            .to_string();
        Ok((name, rest))
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let bytes = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(RaffleError::InvalidInstruction)?;
        Ok((u64::from_le_bytes(bytes), &input[8..]))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let bytes = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(RaffleError::InvalidInstruction)?;
        Ok((i64::from_le_bytes(bytes), &input[8..]))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let bytes = input
            .get(..4)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(RaffleError::InvalidInstruction)?;
        Ok((u32::from_le_bytes(bytes), &input[4..]))
    }
}

/// Create an `Initialize` instruction. Returns the instruction and the raffle
/// id (record address) it will create.
pub fn initialize(
    program_id: &Pubkey,
    creator: &Pubkey,
    name: &str,
    ticket_price: u64,
    max_tickets: u32,
    end_time: UnixTimestamp,
) -> (Instruction, Pubkey) {
    let (raffle, _) = find_raffle_address(program_id, name, creator);
    let (participants, _) = find_participants_address(program_id, &raffle);
    let (treasury, _) = find_treasury_address(program_id);

    let data = RaffleInstruction::Initialize {
        name: name.to_string(),
        ticket_price,
        max_tickets,
        end_time,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*creator, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new(participants, false),
        AccountMeta::new(treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    let instruction = Instruction {
        program_id: *program_id,
        accounts,
        data,
    };
    (instruction, raffle)
}

/// Create a `Participate` instruction
pub fn participate(
    program_id: &Pubkey,
    buyer: &Pubkey,
    raffle: &Pubkey,
    payment: u64,
) -> Instruction {
    let (participants, _) = find_participants_address(program_id, raffle);
    let (treasury, _) = find_treasury_address(program_id);

    let accounts = vec![
        AccountMeta::new(*buyer, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new(participants, false),
        AccountMeta::new(treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::Participate { payment }.pack(),
    }
}

/// Create a `SelectWinner` instruction with an explicit entropy value
pub fn select_winner(
    program_id: &Pubkey,
    creator: &Pubkey,
    raffle: &Pubkey,
    entropy: u64,
) -> Instruction {
    let (participants, _) = find_participants_address(program_id, raffle);

    let accounts = vec![
        AccountMeta::new_readonly(*creator, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(participants, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::SelectWinner { entropy }.pack(),
    }
}

/// Create a `SelectWinner` instruction, drawing entropy from `source`
pub fn select_winner_from<E: EntropySource>(
    program_id: &Pubkey,
    creator: &Pubkey,
    raffle: &Pubkey,
    source: &mut E,
) -> Instruction {
    select_winner(program_id, creator, raffle, source.next_entropy())
}

/// Create a `ClaimReward` instruction
pub fn claim_reward(program_id: &Pubkey, winner: &Pubkey, raffle: &Pubkey) -> Instruction {
    let (treasury, _) = find_treasury_address(program_id);

    let accounts = vec![
        AccountMeta::new(*winner, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new(treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::ClaimReward.pack(),
    }
}
