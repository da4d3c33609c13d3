use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::{clock::Clock, Sysvar},
};

use crate::{
    constants::{INIT_TREASURY_FUND, PARTICIPANTS_SEED, RAFFLE_SEED, TREASURY_SEED},
    engine::{self, RaffleParams},
    error::RaffleError,
    instruction::RaffleInstruction,
    state::{ParticipantRegistry, RaffleRecord},
    utils::{find_participants_address, find_raffle_address, find_treasury_address, lamports_to_sol},
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                name,
                ticket_price,
                max_tickets,
                end_time,
            } => {
                msg!("Instruction: Initialize");
                let params = RaffleParams {
                    name: &name,
                    ticket_price,
                    max_tickets,
                    end_time,
                };
                Self::process_initialize(program_id, accounts, &params)
            }
            RaffleInstruction::Participate { payment } => {
                msg!("Instruction: Participate");
                Self::process_participate(program_id, accounts, payment)
            }
            RaffleInstruction::SelectWinner { entropy } => {
                msg!("Instruction: Select Winner");
                Self::process_select_winner(program_id, accounts, entropy)
            }
            RaffleInstruction::ClaimReward => {
                msg!("Instruction: Claim Reward");
                Self::process_claim_reward(program_id, accounts)
            }
        }
    }

    /// Creates the raffle record and registry PDAs and funds the treasury.
    /// Publishes the raffle address as return data.
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        params: &RaffleParams,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let creator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let participants_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !creator_info.is_signer {
            msg!("Creator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;

        // The name is a PDA seed, so it has to be valid before deriving anything.
        let now = current_time()?;
        params.validate(now).map_err(reject)?;

        let (raffle_key, raffle_bump) =
            find_raffle_address(program_id, params.name, creator_info.key);
        if raffle_key != *raffle_info.key {
            msg!("Raffle account does not match the derived address {}", raffle_key);
            return Err(ProgramError::InvalidSeeds);
        }
        let (participants_key, participants_bump) =
            find_participants_address(program_id, &raffle_key);
        if participants_key != *participants_info.key {
            msg!("Participants account does not match the derived address {}", participants_key);
            return Err(ProgramError::InvalidSeeds);
        }
        check_treasury(program_id, treasury_info)?;

        if raffle_info.owner == program_id || participants_info.owner == program_id {
            msg!("Raffle {} already exists for {}", params.name, creator_info.key);
            return Err(RaffleError::AlreadyExists.into());
        }

        let record =
            engine::initialize(params, *creator_info.key, raffle_bump, now).map_err(reject)?;
        let registry = ParticipantRegistry::new(raffle_key, params.max_tickets);

        let rent = Rent::get()?;
        let registry_space = ParticipantRegistry::space(params.max_tickets);
        let record_lamports = rent.minimum_balance(RaffleRecord::LEN);
        let registry_lamports = rent.minimum_balance(registry_space);
        let required = record_lamports
            .saturating_sub(raffle_info.lamports())
            .checked_add(registry_lamports.saturating_sub(participants_info.lamports()))
            .and_then(|sum| sum.checked_add(INIT_TREASURY_FUND))
            .ok_or(RaffleError::Overflow)?;
        if creator_info.lamports() < required {
            msg!(
                "Insufficient funds: needed {} lamports, had {} lamports",
                required,
                creator_info.lamports()
            );
            return Err(RaffleError::InsufficientFunds.into());
        }

        create_pda_account(
            creator_info,
            raffle_info,
            system_program_info,
            program_id,
            record_lamports,
            RaffleRecord::LEN,
            &[RAFFLE_SEED, params.name.as_bytes(), creator_info.key.as_ref(), &[raffle_bump]],
        )?;
        create_pda_account(
            creator_info,
            participants_info,
            system_program_info,
            program_id,
            registry_lamports,
            registry_space,
            &[PARTICIPANTS_SEED, raffle_key.as_ref(), &[participants_bump]],
        )?;

        invoke(
            &system_instruction::transfer(creator_info.key, treasury_info.key, INIT_TREASURY_FUND),
            &[
                creator_info.clone(),
                treasury_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        RaffleRecord::pack(record, &mut raffle_info.data.borrow_mut())?;
        registry.store(&mut participants_info.data.borrow_mut())?;

        publish(&raffle_key)?;
        msg!(
            "Raffle {} initialized: address={}, price={} lamports, max tickets={}, end time={}",
            params.name,
            raffle_key,
            params.ticket_price,
            params.max_tickets,
            params.end_time
        );
        Ok(())
    }

    /// Sells one ticket. Publishes a `TicketReceipt` as return data.
    fn process_participate(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        payment: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let buyer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let participants_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !buyer_info.is_signer {
            msg!("Buyer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;
        check_treasury(program_id, treasury_info)?;

        let mut record = load_raffle(program_id, raffle_info)?;
        let mut registry = load_registry(program_id, raffle_info.key, participants_info)?;

        let receipt = engine::participate(
            &mut record,
            &mut registry,
            *buyer_info.key,
            payment,
            current_time()?,
        )
        .map_err(reject)?;

        if buyer_info.lamports() < payment {
            msg!(
                "Insufficient funds: needed {} lamports, had {} lamports",
                payment,
                buyer_info.lamports()
            );
            return Err(RaffleError::InsufficientFunds.into());
        }

        invoke(
            &system_instruction::transfer(buyer_info.key, treasury_info.key, payment),
            &[
                buyer_info.clone(),
                treasury_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        RaffleRecord::pack(record, &mut raffle_info.data.borrow_mut())?;
        registry.store(&mut participants_info.data.borrow_mut())?;

        publish(&receipt)?;
        msg!(
            "Ticket #{} of raffle {} sold to {} ({}/{} sold, pool {} SOL)",
            receipt.position,
            record.name_str(),
            buyer_info.key,
            receipt.total_sold,
            record.max_tickets,
            lamports_to_sol(record.pool)
        );
        Ok(())
    }

    /// Creator-only. Publishes the winner as return data.
    fn process_select_winner(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        entropy: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let creator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let participants_info = next_account_info(account_info_iter)?;

        if !creator_info.is_signer {
            msg!("Creator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut record = load_raffle(program_id, raffle_info)?;
        let registry = load_registry(program_id, raffle_info.key, participants_info)?;

        let winner = engine::select_winner(
            &mut record,
            &registry,
            creator_info.key,
            entropy,
            current_time()?,
        )
        .map_err(reject)?;

        RaffleRecord::pack(record, &mut raffle_info.data.borrow_mut())?;

        publish(&winner)?;
        msg!(
            "Winner of raffle {} selected: {} ({} tickets, pool {} lamports)",
            record.name_str(),
            winner,
            record.total_tickets_sold,
            record.pool
        );
        Ok(())
    }

    /// Winner-only. Moves the pool out of the treasury and closes the raffle.
    /// Publishes the payout as return data.
    fn process_claim_reward(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let winner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !winner_info.is_signer {
            msg!("Winner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_system_program(system_program_info)?;
        let treasury_bump = check_treasury(program_id, treasury_info)?;

        let mut record = load_raffle(program_id, raffle_info)?;
        let escrow_balance = treasury_info.lamports();
        let payout = engine::claim_reward(&mut record, winner_info.key, escrow_balance)
            .map_err(|error| {
                if error == RaffleError::InsufficientEscrow {
                    msg!(
                        "Treasury holds {} lamports but raffle {} owes {}",
                        escrow_balance,
                        record.name_str(),
                        record.pool
                    );
                }
                reject(error)
            })?;

        invoke_signed(
            &system_instruction::transfer(treasury_info.key, winner_info.key, payout),
            &[
                treasury_info.clone(),
                winner_info.clone(),
                system_program_info.clone(),
            ],
            &[&[TREASURY_SEED, &[treasury_bump]]],
        )?;

        RaffleRecord::pack(record, &mut raffle_info.data.borrow_mut())?;

        publish(&payout)?;
        msg!(
            "Reward of {} SOL from raffle {} claimed by {}",
            lamports_to_sol(payout),
            record.name_str(),
            winner_info.key
        );
        Ok(())
    }
}

fn reject(error: RaffleError) -> ProgramError {
    msg!("Rejected ({:?}): {}", error.kind(), error);
    error.into()
}

fn current_time() -> Result<UnixTimestamp, ProgramError> {
    Ok(Clock::get()?.unix_timestamp)
}

fn publish<T: BorshSerialize>(value: &T) -> ProgramResult {
    let data = value
        .try_to_vec()
        .map_err(|_| ProgramError::InvalidAccountData)?;
    set_return_data(&data);
    Ok(())
}

fn check_system_program(system_program_info: &AccountInfo) -> ProgramResult {
    if *system_program_info.key != system_program::id() {
        msg!("Expected the system program, got {}", system_program_info.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Verifies the treasury PDA and returns its bump seed.
fn check_treasury(program_id: &Pubkey, treasury_info: &AccountInfo) -> Result<u8, ProgramError> {
    let (treasury_key, bump) = find_treasury_address(program_id);
    if treasury_key != *treasury_info.key {
        msg!("Treasury account does not match the derived address {}", treasury_key);
        return Err(ProgramError::InvalidSeeds);
    }
    if treasury_info.owner != &system_program::id() {
        msg!("Treasury must be owned by the system program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(bump)
}

fn load_raffle(
    program_id: &Pubkey,
    raffle_info: &AccountInfo,
) -> Result<RaffleRecord, ProgramError> {
    if raffle_info.owner != program_id {
        msg!("Raffle account must be owned by the program");
        return Err(ProgramError::IncorrectProgramId);
    }
    let record = RaffleRecord::unpack(&raffle_info.data.borrow())?;

    let expected = Pubkey::create_program_address(
        &[RAFFLE_SEED, record.name(), record.creator.as_ref(), &[record.bump]],
        program_id,
    )
    .map_err(|_| ProgramError::InvalidSeeds)?;
    if expected != *raffle_info.key {
        msg!("Raffle account is not at its derived address");
        return Err(ProgramError::InvalidSeeds);
    }
    Ok(record)
}

fn load_registry(
    program_id: &Pubkey,
    raffle_key: &Pubkey,
    participants_info: &AccountInfo,
) -> Result<ParticipantRegistry, ProgramError> {
    if participants_info.owner != program_id {
        msg!("Participants account must be owned by the program");
        return Err(ProgramError::IncorrectProgramId);
    }
    let registry = ParticipantRegistry::load(&participants_info.data.borrow())?;
    if registry.raffle != *raffle_key {
        msg!("Participants account belongs to raffle {}", registry.raffle);
        return Err(RaffleError::InvalidAccount.into());
    }
    Ok(registry)
}

/// Creates a rent-exempt PDA owned by `owner`. Anyone can send lamports to a
/// PDA address before it is created, so an already funded target is topped up,
/// allocated and assigned instead.
fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    owner: &Pubkey,
    lamports: u64,
    space: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    if target.lamports() == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                target.key,
                lamports,
                space as u64,
                owner,
            ),
            &[payer.clone(), target.clone(), system_program_info.clone()],
            &[seeds],
        );
    }

    msg!("{} is already funded, allocating in place", target.key);
    let top_up = lamports.saturating_sub(target.lamports());
    if top_up > 0 {
        invoke(
            &system_instruction::transfer(payer.key, target.key, top_up),
            &[payer.clone(), target.clone(), system_program_info.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(target.key, space as u64),
        &[target.clone(), system_program_info.clone()],
        &[seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(target.key, owner),
        &[target.clone(), system_program_info.clone()],
        &[seeds],
    )
}
