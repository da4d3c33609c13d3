use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{constants::MAX_NAME_LEN, error::RaffleError};

/// Lifecycle position of a raffle, derived from the record fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleStatus {
    /// Tickets may be sold, no winner yet
    Open,
    /// Winner chosen, reward not yet claimed
    WinnerSelected,
    /// Reward paid out. Terminal.
    Closed,
}

/// Raffle record account data, one per `(name, creator)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleRecord {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Creator of the raffle, the only identity allowed to select the winner
    pub creator: Pubkey,
    /// Length of the name in `name`
    pub name_len: u8,
    /// Name of the raffle, zero padded
    pub name: [u8; MAX_NAME_LEN],
    /// Price per ticket in lamports
    pub ticket_price: u64,
    /// Maximum number of tickets that can be sold
    pub max_tickets: u32,
    /// Time the raffle was initialized
    pub start_time: UnixTimestamp,
    /// Sales are rejected from this time on
    pub end_time: UnixTimestamp,
    pub total_tickets_sold: u32,
    /// Lamports owed to the winner
    pub pool: u64,
    pub winner: Option<Pubkey>,
    /// Set once the reward has been paid
    pub is_closed: bool,
    /// Bump seed of the record PDA
    pub bump: u8,
}

impl RaffleRecord {
    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }

    pub fn name_str(&self) -> &str {
        std::str::from_utf8(self.name()).unwrap_or("<invalid utf-8>")
    }

    pub fn status(&self) -> RaffleStatus {
        match (self.winner, self.is_closed) {
            (_, true) => RaffleStatus::Closed,
            (Some(_), false) => RaffleStatus::WinnerSelected,
            (None, false) => RaffleStatus::Open,
        }
    }

    pub fn sale_ended(&self, now: UnixTimestamp) -> bool {
        now >= self.end_time
    }

    pub fn is_sold_out(&self) -> bool {
        self.total_tickets_sold >= self.max_tickets
    }

    /// Point-in-time projection for rendering.
    pub fn snapshot(&self, escrow_balance: u64) -> RaffleSnapshot {
        RaffleSnapshot {
            total_tickets_sold: self.total_tickets_sold,
            pool: self.pool,
            winner: self.winner,
            is_closed: self.is_closed,
            escrow_balance,
        }
    }
}

impl Sealed for RaffleRecord {}

impl IsInitialized for RaffleRecord {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for RaffleRecord {
    const LEN: usize = 1 + 32 + 1 + MAX_NAME_LEN + 8 + 4 + 8 + 8 + 4 + 8 + 1 + 32 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RaffleRecord::LEN];
        let (
            is_initialized,
            creator,
            name_len,
            name,
            ticket_price,
            max_tickets,
            start_time,
            end_time,
            total_tickets_sold,
            pool,
            winner_flag,
            winner,
            is_closed,
            bump,
        ) = array_refs![src, 1, 32, 1, MAX_NAME_LEN, 8, 4, 8, 8, 4, 8, 1, 32, 1, 1];

        let name_len = name_len[0];
        if name_len as usize > MAX_NAME_LEN {
            return Err(ProgramError::InvalidAccountData);
        }

        Ok(RaffleRecord {
            is_initialized: unpack_bool(is_initialized)?,
            creator: Pubkey::new_from_array(*creator),
            name_len,
            name: *name,
            ticket_price: u64::from_le_bytes(*ticket_price),
            max_tickets: u32::from_le_bytes(*max_tickets),
            start_time: UnixTimestamp::from_le_bytes(*start_time),
            end_time: UnixTimestamp::from_le_bytes(*end_time),
            total_tickets_sold: u32::from_le_bytes(*total_tickets_sold),
            pool: u64::from_le_bytes(*pool),
            winner: match winner_flag[0] {
                0 => None,
                1 => Some(Pubkey::new_from_array(*winner)),
                _ => return Err(ProgramError::InvalidAccountData),
            },
            is_closed: unpack_bool(is_closed)?,
            bump: bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RaffleRecord::LEN];
        let (
            is_initialized_dst,
            creator_dst,
            name_len_dst,
            name_dst,
            ticket_price_dst,
            max_tickets_dst,
            start_time_dst,
            end_time_dst,
            total_tickets_sold_dst,
            pool_dst,
            winner_flag_dst,
            winner_dst,
            is_closed_dst,
            bump_dst,
        ) = mut_array_refs![dst, 1, 32, 1, MAX_NAME_LEN, 8, 4, 8, 8, 4, 8, 1, 32, 1, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        creator_dst.copy_from_slice(self.creator.as_ref());
        name_len_dst[0] = self.name_len;
        name_dst.copy_from_slice(&self.name);
        *ticket_price_dst = self.ticket_price.to_le_bytes();
        *max_tickets_dst = self.max_tickets.to_le_bytes();
        *start_time_dst = self.start_time.to_le_bytes();
        *end_time_dst = self.end_time.to_le_bytes();
        *total_tickets_sold_dst = self.total_tickets_sold.to_le_bytes();
        *pool_dst = self.pool.to_le_bytes();
        match self.winner {
            Some(winner) => {
                winner_flag_dst[0] = 1;
                winner_dst.copy_from_slice(winner.as_ref());
            }
            None => {
                winner_flag_dst[0] = 0;
                *winner_dst = [0u8; 32];
            }
        }
        is_closed_dst[0] = self.is_closed as u8;
        bump_dst[0] = self.bump;
    }
}

fn unpack_bool(src: &[u8; 1]) -> Result<bool, ProgramError> {
    match src[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

/// Ordered ticket holders of one raffle. One entry per ticket.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParticipantRegistry {
    /// Raffle record this registry belongs to
    pub raffle: Pubkey,
    /// Number of entries the account was sized for
    pub capacity: u32,
    pub entries: Vec<Pubkey>,
}

impl ParticipantRegistry {
    /// Account size needed for `capacity` entries
    pub fn space(capacity: u32) -> usize {
        32 + 4 + 4 + 32 * capacity as usize
    }

    pub fn new(raffle: Pubkey, capacity: u32) -> Self {
        Self {
            raffle,
            capacity,
            entries: Vec::with_capacity(capacity as usize),
        }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Pubkey> {
        self.entries.get(index as usize)
    }

    /// Append a ticket holder and return its position.
    pub fn push(&mut self, participant: Pubkey) -> Result<u32, RaffleError> {
        if self.len() >= self.capacity {
            return Err(RaffleError::SoldOut);
        }
        self.entries.push(participant);
        Ok(self.len() - 1)
    }

    /// Decode from account data. The account is allocated at full capacity,
    /// so trailing bytes are expected.
    pub fn load(src: &[u8]) -> Result<Self, ProgramError> {
        let registry =
            Self::deserialize(&mut &src[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if registry.len() > registry.capacity {
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(registry)
    }

    pub fn store(&self, dst: &mut [u8]) -> ProgramResult {
        let mut writer = dst;
        self.serialize(&mut writer)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }
}

/// Result of a successful ticket purchase
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketReceipt {
    /// Zero-based index of the ticket in the registry
    pub position: u32,
    pub total_sold: u32,
}

/// Read-only view of a raffle handed to clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleSnapshot {
    pub total_tickets_sold: u32,
    pub pool: u64,
    pub winner: Option<Pubkey>,
    pub is_closed: bool,
    /// Treasury balance at the time of the snapshot
    pub escrow_balance: u64,
}
