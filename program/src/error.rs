use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

/// Coarse classification of a [`RaffleError`], for clients deciding how to
/// react to a failure. Rejection logs print it too.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad parameters, rejected before any state is touched
    Validation,
    /// The raffle is not in a state that allows the operation
    Precondition,
    /// Caller identity does not match the required role
    Authorization,
    /// The caller or environment broke an assumed invariant
    Consistency,
}

/// Errors that may be returned by the raffle settlement program.
///
/// The discriminant is the `ProgramError::Custom` code, so variants must only
/// ever be appended.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Instruction data could not be decoded
    #[error("Invalid instruction data")]
    InvalidInstruction,

    #[error("Invalid raffle parameter")]
    InvalidParameter,

    #[error("A raffle with this name already exists for this creator")]
    AlreadyExists,

    /// Sale period is over, or the raffle already has a winner
    #[error("Ticket sale is closed")]
    SaleClosed,

    #[error("All tickets have been sold")]
    SoldOut,

    #[error("Payment does not match the ticket price")]
    PaymentMismatch,

    #[error("Caller is not allowed to perform this action")]
    Unauthorized,

    #[error("Winner has already been selected")]
    AlreadySelected,

    #[error("No tickets were sold")]
    NoParticipants,

    #[error("Ticket sale is still open")]
    SaleStillOpen,

    #[error("Winner has not been selected yet")]
    NoWinnerYet,

    #[error("Reward has already been claimed")]
    AlreadyClaimed,

    /// Treasury holds less than the recorded pool
    #[error("Treasury escrow cannot cover the pool")]
    InsufficientEscrow,

    #[error("Insufficient funds for operation")]
    InsufficientFunds,

    /// Account does not belong to the raffle it was passed for
    #[error("Account does not match the raffle")]
    InvalidAccount,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl RaffleError {
    const ALL: [RaffleError; 16] = [
        RaffleError::InvalidInstruction,
        RaffleError::InvalidParameter,
        RaffleError::AlreadyExists,
        RaffleError::SaleClosed,
        RaffleError::SoldOut,
        RaffleError::PaymentMismatch,
        RaffleError::Unauthorized,
        RaffleError::AlreadySelected,
        RaffleError::NoParticipants,
        RaffleError::SaleStillOpen,
        RaffleError::NoWinnerYet,
        RaffleError::AlreadyClaimed,
        RaffleError::InsufficientEscrow,
        RaffleError::InsufficientFunds,
        RaffleError::InvalidAccount,
        RaffleError::Overflow,
    ];

    pub fn kind(&self) -> ErrorKind {
        match self {
            RaffleError::InvalidParameter | RaffleError::AlreadyExists => ErrorKind::Validation,
            RaffleError::SaleClosed
            | RaffleError::SoldOut
            | RaffleError::AlreadySelected
            | RaffleError::NoParticipants
            | RaffleError::SaleStillOpen
            | RaffleError::NoWinnerYet
            | RaffleError::AlreadyClaimed => ErrorKind::Precondition,
            RaffleError::Unauthorized => ErrorKind::Authorization,
            RaffleError::InvalidInstruction
            | RaffleError::PaymentMismatch
            | RaffleError::InsufficientEscrow
            | RaffleError::InsufficientFunds
            | RaffleError::InvalidAccount
            | RaffleError::Overflow => ErrorKind::Consistency,
        }
    }

    /// Map a `ProgramError::Custom` code back to the error that produced it.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}
