//! State transitions of a raffle.
//!
//! Every function here validates all of its preconditions before touching the
//! state it was handed, so an `Err` always leaves the record and registry as
//! they were. Moving lamports and persisting accounts is the processor's job.

use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::{
    constants::{MAX_NAME_LEN, MAX_PARTICIPANTS},
    entropy::winner_index,
    error::RaffleError,
    state::{ParticipantRegistry, RaffleRecord, RaffleStatus, TicketReceipt},
};

/// Creator-supplied configuration of a new raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleParams<'a> {
    pub name: &'a str,
    pub ticket_price: u64,
    pub max_tickets: u32,
    pub end_time: UnixTimestamp,
}

impl RaffleParams<'_> {
    pub fn validate(&self, now: UnixTimestamp) -> Result<(), RaffleError> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(RaffleError::InvalidParameter);
        }
        if self.ticket_price == 0 {
            return Err(RaffleError::InvalidParameter);
        }
        if self.max_tickets == 0 || self.max_tickets > MAX_PARTICIPANTS {
            return Err(RaffleError::InvalidParameter);
        }
        if self.end_time <= now {
            return Err(RaffleError::InvalidParameter);
        }
        // A full raffle's pool must fit in a u64.
        self.ticket_price
            .checked_mul(self.max_tickets as u64)
            .ok_or(RaffleError::InvalidParameter)?;
        Ok(())
    }
}

/// Build the record of a fresh, open raffle.
pub fn initialize(
    params: &RaffleParams,
    creator: Pubkey,
    bump: u8,
    now: UnixTimestamp,
) -> Result<RaffleRecord, RaffleError> {
    params.validate(now)?;

    let mut name = [0u8; MAX_NAME_LEN];
    name[..params.name.len()].copy_from_slice(params.name.as_bytes());

    Ok(RaffleRecord {
        is_initialized: true,
        creator,
        name_len: params.name.len() as u8,
        name,
        ticket_price: params.ticket_price,
        max_tickets: params.max_tickets,
        start_time: now,
        end_time: params.end_time,
        total_tickets_sold: 0,
        pool: 0,
        winner: None,
        is_closed: false,
        bump,
    })
}

/// Sell one ticket to `buyer`.
pub fn participate(
    record: &mut RaffleRecord,
    registry: &mut ParticipantRegistry,
    buyer: Pubkey,
    payment: u64,
    now: UnixTimestamp,
) -> Result<TicketReceipt, RaffleError> {
    if record.status() != RaffleStatus::Open || record.sale_ended(now) {
        return Err(RaffleError::SaleClosed);
    }
    if record.is_sold_out() {
        return Err(RaffleError::SoldOut);
    }
    if payment != record.ticket_price {
        return Err(RaffleError::PaymentMismatch);
    }
    if registry.len() != record.total_tickets_sold {
        return Err(RaffleError::InvalidAccount);
    }

    let pool = record
        .pool
        .checked_add(record.ticket_price)
        .ok_or(RaffleError::Overflow)?;
    let total_sold = record
        .total_tickets_sold
        .checked_add(1)
        .ok_or(RaffleError::Overflow)?;

    let position = registry.push(buyer)?;
    record.total_tickets_sold = total_sold;
    record.pool = pool;

    Ok(TicketReceipt {
        position,
        total_sold,
    })
}

/// Pick the winning ticket. Allowed once the sale can no longer grow: either
/// the end time passed or every ticket is sold.
pub fn select_winner(
    record: &mut RaffleRecord,
    registry: &ParticipantRegistry,
    caller: &Pubkey,
    entropy: u64,
    now: UnixTimestamp,
) -> Result<Pubkey, RaffleError> {
    if *caller != record.creator {
        return Err(RaffleError::Unauthorized);
    }
    if record.winner.is_some() {
        return Err(RaffleError::AlreadySelected);
    }
    let index = winner_index(entropy, record.total_tickets_sold)
        .ok_or(RaffleError::NoParticipants)?;
    if !record.sale_ended(now) && !record.is_sold_out() {
        return Err(RaffleError::SaleStillOpen);
    }
    if registry.len() != record.total_tickets_sold {
        return Err(RaffleError::InvalidAccount);
    }

    let winner = *registry.get(index).ok_or(RaffleError::InvalidAccount)?;
    record.winner = Some(winner);
    Ok(winner)
}

/// Close the raffle and return the amount owed to the winner.
pub fn claim_reward(
    record: &mut RaffleRecord,
    caller: &Pubkey,
    escrow_balance: u64,
) -> Result<u64, RaffleError> {
    let winner = record.winner.ok_or(RaffleError::NoWinnerYet)?;
    if *caller != winner {
        return Err(RaffleError::Unauthorized);
    }
    if record.is_closed {
        return Err(RaffleError::AlreadyClaimed);
    }
    if escrow_balance < record.pool {
        return Err(RaffleError::InsufficientEscrow);
    }

    record.is_closed = true;
    Ok(record.pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::INIT_TREASURY_FUND,
        entropy::{EntropySource, FixedEntropy},
    };
    use std::collections::HashMap;

    const NOW: UnixTimestamp = 1_700_000_000;
    const HOUR: UnixTimestamp = 3_600;

    fn params(name: &str) -> RaffleParams {
        RaffleParams {
            name,
            ticket_price: 100,
            max_tickets: 4,
            end_time: NOW + HOUR,
        }
    }

    /// In-memory stand-in for the ledger: records keyed by `(name, creator)`,
    /// one shared escrow balance, and all-or-nothing commits.
    #[derive(Default)]
    struct MemoryLedger {
        raffles: HashMap<(String, Pubkey), (RaffleRecord, ParticipantRegistry)>,
        escrow: u64,
    }

    impl MemoryLedger {
        fn create(&mut self, params: &RaffleParams, creator: Pubkey) -> Result<(), RaffleError> {
            let key = (params.name.to_string(), creator);
            if self.raffles.contains_key(&key) {
                return Err(RaffleError::AlreadyExists);
            }
            let record = initialize(params, creator, 255, NOW)?;
            let registry = ParticipantRegistry::new(Pubkey::new_unique(), params.max_tickets);
            self.raffles.insert(key, (record, registry));
            self.escrow += INIT_TREASURY_FUND;
            Ok(())
        }

        fn apply<T>(
            &mut self,
            name: &str,
            creator: Pubkey,
            op: impl FnOnce(
                &mut RaffleRecord,
                &mut ParticipantRegistry,
                &mut u64,
            ) -> Result<T, RaffleError>,
        ) -> Result<T, RaffleError> {
            let key = (name.to_string(), creator);
            let (mut record, mut registry) = self.raffles.get(&key).cloned().unwrap();
            let mut escrow = self.escrow;
            let out = op(&mut record, &mut registry, &mut escrow)?;
            self.raffles.insert(key, (record, registry));
            self.escrow = escrow;
            Ok(out)
        }

        fn buy(
            &mut self,
            name: &str,
            creator: Pubkey,
            buyer: Pubkey,
            payment: u64,
            now: UnixTimestamp,
        ) -> Result<TicketReceipt, RaffleError> {
            self.apply(name, creator, |record, registry, escrow| {
                let receipt = participate(record, registry, buyer, payment, now)?;
                *escrow += payment;
                Ok(receipt)
            })
        }

        fn select(
            &mut self,
            name: &str,
            creator: Pubkey,
            caller: Pubkey,
            entropy: u64,
            now: UnixTimestamp,
        ) -> Result<Pubkey, RaffleError> {
            self.apply(name, creator, |record, registry, _| {
                select_winner(record, registry, &caller, entropy, now)
            })
        }

        fn claim(
            &mut self,
            name: &str,
            creator: Pubkey,
            caller: Pubkey,
        ) -> Result<u64, RaffleError> {
            self.apply(name, creator, |record, _, escrow| {
                let payout = claim_reward(record, &caller, *escrow)?;
                *escrow -= payout;
                Ok(payout)
            })
        }

        fn state(&self, name: &str, creator: Pubkey) -> (RaffleRecord, ParticipantRegistry) {
            self.raffles.get(&(name.to_string(), creator)).cloned().unwrap()
        }
    }

    fn open_raffle(name: &str, creator: Pubkey) -> MemoryLedger {
        let mut ledger = MemoryLedger::default();
        ledger.create(&params(name), creator).unwrap();
        ledger
    }

    #[test]
    fn initialize_rejects_bad_parameters() {
        let creator = Pubkey::new_unique();
        let mut p = params("r1");
        p.ticket_price = 0;
        assert_eq!(initialize(&p, creator, 0, NOW), Err(RaffleError::InvalidParameter));

        let mut p = params("r1");
        p.max_tickets = 0;
        assert_eq!(initialize(&p, creator, 0, NOW), Err(RaffleError::InvalidParameter));

        let mut p = params("r1");
        p.max_tickets = MAX_PARTICIPANTS + 1;
        assert_eq!(initialize(&p, creator, 0, NOW), Err(RaffleError::InvalidParameter));

        let mut p = params("r1");
        p.end_time = NOW;
        assert_eq!(initialize(&p, creator, 0, NOW), Err(RaffleError::InvalidParameter));

        let long_name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            initialize(&params(&long_name), creator, 0, NOW),
            Err(RaffleError::InvalidParameter)
        );
        assert_eq!(initialize(&params(""), creator, 0, NOW), Err(RaffleError::InvalidParameter));

        let mut p = params("r1");
        p.ticket_price = u64::MAX;
        assert_eq!(initialize(&p, creator, 0, NOW), Err(RaffleError::InvalidParameter));
    }

    #[test]
    fn initialize_opens_empty_raffle() {
        let creator = Pubkey::new_unique();
        let record = initialize(&params("r1"), creator, 7, NOW).unwrap();
        assert_eq!(record.status(), RaffleStatus::Open);
        assert_eq!(record.name_str(), "r1");
        assert_eq!(record.creator, creator);
        assert_eq!(record.start_time, NOW);
        assert_eq!(record.total_tickets_sold, 0);
        assert_eq!(record.pool, 0);
        assert_eq!(record.winner, None);
        assert!(!record.is_closed);
    }

    #[test]
    fn duplicate_name_for_same_creator_is_rejected() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        assert_eq!(ledger.create(&params("r1"), creator), Err(RaffleError::AlreadyExists));
        ledger.create(&params("r1"), Pubkey::new_unique()).unwrap();
        ledger.create(&params("r2"), creator).unwrap();
        assert_eq!(ledger.escrow, 3 * INIT_TREASURY_FUND);
    }

    #[test]
    fn end_to_end_settlement() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyers: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();

        for (i, buyer) in buyers.iter().enumerate() {
            let receipt = ledger.buy("r1", creator, *buyer, 100, NOW + 10).unwrap();
            assert_eq!(receipt.position, i as u32);
            assert_eq!(receipt.total_sold, i as u32 + 1);

            let (record, registry) = ledger.state("r1", creator);
            assert_eq!(record.total_tickets_sold, registry.len());
            assert_eq!(record.pool, record.total_tickets_sold as u64 * record.ticket_price);
        }

        let (record, _) = ledger.state("r1", creator);
        assert_eq!(record.total_tickets_sold, 4);
        assert_eq!(record.pool, 400);

        // Sold out, so selection is allowed before the end time.
        let mut source = FixedEntropy(4_242);
        let entropy = source.next_entropy();
        let winner = ledger.select("r1", creator, creator, entropy, NOW + 20).unwrap();
        assert_eq!(winner, buyers[(entropy % 4) as usize]);
        assert_eq!(ledger.state("r1", creator).0.status(), RaffleStatus::WinnerSelected);

        let escrow_before = ledger.escrow;
        assert_eq!(ledger.claim("r1", creator, winner), Ok(400));
        assert_eq!(ledger.escrow, escrow_before - 400);

        let (record, _) = ledger.state("r1", creator);
        assert!(record.is_closed);
        assert_eq!(record.status(), RaffleStatus::Closed);
        assert_eq!(
            record.snapshot(ledger.escrow),
            crate::state::RaffleSnapshot {
                total_tickets_sold: 4,
                pool: 400,
                winner: Some(winner),
                is_closed: true,
                escrow_balance: INIT_TREASURY_FUND,
            }
        );
    }

    #[test]
    fn fifth_ticket_is_sold_out() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyer = Pubkey::new_unique();
        for _ in 0..4 {
            ledger.buy("r1", creator, buyer, 100, NOW).unwrap();
        }
        let before = ledger.state("r1", creator);
        let escrow = ledger.escrow;
        assert_eq!(
            ledger.buy("r1", creator, Pubkey::new_unique(), 100, NOW),
            Err(RaffleError::SoldOut)
        );
        assert_eq!(ledger.state("r1", creator), before);
        assert_eq!(ledger.escrow, escrow);
    }

    #[test]
    fn same_buyer_may_hold_several_tickets() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyer = Pubkey::new_unique();
        ledger.buy("r1", creator, buyer, 100, NOW).unwrap();
        ledger.buy("r1", creator, buyer, 100, NOW).unwrap();
        let (_, registry) = ledger.state("r1", creator);
        assert_eq!(registry.entries, vec![buyer, buyer]);
    }

    #[test]
    fn participate_after_end_time_is_sale_closed() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        assert_eq!(
            ledger.buy("r1", creator, Pubkey::new_unique(), 100, NOW + HOUR),
            Err(RaffleError::SaleClosed)
        );
        assert_eq!(ledger.state("r1", creator).0.total_tickets_sold, 0);
    }

    #[test]
    fn participate_requires_exact_payment() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyer = Pubkey::new_unique();
        assert_eq!(ledger.buy("r1", creator, buyer, 99, NOW), Err(RaffleError::PaymentMismatch));
        assert_eq!(ledger.buy("r1", creator, buyer, 101, NOW), Err(RaffleError::PaymentMismatch));
        assert_eq!(ledger.state("r1", creator).1.len(), 0);
    }

    #[test]
    fn participate_after_selection_is_sale_closed() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        ledger.buy("r1", creator, Pubkey::new_unique(), 100, NOW).unwrap();
        ledger.select("r1", creator, creator, 0, NOW + HOUR).unwrap();
        assert_eq!(
            ledger.buy("r1", creator, Pubkey::new_unique(), 100, NOW),
            Err(RaffleError::SaleClosed)
        );
    }

    #[test]
    fn select_without_participants_leaves_record_unchanged() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let before = ledger.state("r1", creator);
        assert_eq!(
            ledger.select("r1", creator, creator, 9, NOW + HOUR),
            Err(RaffleError::NoParticipants)
        );
        assert_eq!(
            ledger.select("r1", creator, creator, 9, NOW),
            Err(RaffleError::NoParticipants)
        );
        assert_eq!(ledger.state("r1", creator), before);
    }

    #[test]
    fn select_waits_for_sale_to_close() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        ledger.buy("r1", creator, Pubkey::new_unique(), 100, NOW).unwrap();
        assert_eq!(
            ledger.select("r1", creator, creator, 1, NOW + HOUR - 1),
            Err(RaffleError::SaleStillOpen)
        );
        ledger.select("r1", creator, creator, 1, NOW + HOUR).unwrap();
    }

    #[test]
    fn only_creator_selects_and_only_once() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyers: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        for buyer in &buyers {
            ledger.buy("r1", creator, *buyer, 100, NOW).unwrap();
        }

        assert_eq!(
            ledger.select("r1", creator, buyers[0], 1, NOW + HOUR),
            Err(RaffleError::Unauthorized)
        );
        let winner = ledger.select("r1", creator, creator, 1, NOW + HOUR).unwrap();
        assert_eq!(winner, buyers[1]);

        assert_eq!(
            ledger.select("r1", creator, creator, 2, NOW + HOUR),
            Err(RaffleError::AlreadySelected)
        );
        assert_eq!(ledger.state("r1", creator).0.winner, Some(winner));
    }

    #[test]
    fn claim_rules() {
        let creator = Pubkey::new_unique();
        let mut ledger = open_raffle("r1", creator);
        let buyer = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        ledger.buy("r1", creator, buyer, 100, NOW).unwrap();
        ledger.buy("r1", creator, buyer, 100, NOW).unwrap();

        assert_eq!(ledger.claim("r1", creator, buyer), Err(RaffleError::NoWinnerYet));

        ledger.select("r1", creator, creator, 5, NOW + HOUR).unwrap();
        assert_eq!(ledger.claim("r1", creator, stranger), Err(RaffleError::Unauthorized));
        assert_eq!(ledger.claim("r1", creator, creator), Err(RaffleError::Unauthorized));

        assert_eq!(ledger.claim("r1", creator, buyer), Ok(200));
        let escrow = ledger.escrow;
        assert_eq!(ledger.claim("r1", creator, buyer), Err(RaffleError::AlreadyClaimed));
        assert_eq!(ledger.escrow, escrow);
    }

    #[test]
    fn claim_with_short_escrow_is_fatal_and_changes_nothing() {
        let creator = Pubkey::new_unique();
        let winner = Pubkey::new_unique();
        let mut record = initialize(&params("r1"), creator, 0, NOW).unwrap();
        let mut registry = ParticipantRegistry::new(Pubkey::new_unique(), 4);
        participate(&mut record, &mut registry, winner, 100, NOW).unwrap();
        select_winner(&mut record, &registry, &creator, 0, NOW + HOUR).unwrap();

        let before = record;
        assert_eq!(
            claim_reward(&mut record, &winner, 99),
            Err(RaffleError::InsufficientEscrow)
        );
        assert_eq!(record, before);
        assert_eq!(claim_reward(&mut record, &winner, 100), Ok(100));
    }

    #[test]
    fn registry_out_of_step_with_record_is_rejected() {
        let creator = Pubkey::new_unique();
        let mut record = initialize(&params("r1"), creator, 0, NOW).unwrap();
        let mut registry = ParticipantRegistry::new(Pubkey::new_unique(), 4);
        registry.push(Pubkey::new_unique()).unwrap();
        assert_eq!(
            participate(&mut record, &mut registry, Pubkey::new_unique(), 100, NOW),
            Err(RaffleError::InvalidAccount)
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(record.total_tickets_sold, 0);
    }
}
