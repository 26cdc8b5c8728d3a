//! Turnstile scans.
//!
//! A ticket enters once and exits once: ACTIVE -> IN_USE -> USED. Every
//! successful scan bumps the footfall counter of the station it happened at
//! while the ticket is still locked, so a counter never disagrees with the
//! ticket states it was derived from.

use std::{fmt, sync::Arc};

use tracing::{info, warn};

use crate::{
    clock::Clock,
    data::{Ticket, TicketId, TicketStatus, UserId},
    error::{AccessError, GateError},
    footfall::FootfallStore,
    ledger::{StatusChange, TicketLedger},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Success(Ticket),
    AlreadyScannedIn,
    InvalidEntryState(TicketStatus),
    NeverScannedIn,
    InvalidExitState(TicketStatus),
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success(_))
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::Success(ticket) if ticket.status == TicketStatus::Used => {
                write!(f, "Ticket {} Scanned OUT at {}", ticket.id, ticket.destination)
            }
            ScanOutcome::Success(ticket) => {
                write!(f, "Ticket {} Scanned IN at {}", ticket.id, ticket.source)
            }
            ScanOutcome::AlreadyScannedIn => f.write_str("ALREADY SCANNED IN!"),
            ScanOutcome::InvalidEntryState(status) => write!(f, "Invalid Entry! Status is {status}"),
            ScanOutcome::NeverScannedIn => f.write_str("Ticket was never scanned at Entry!"),
            ScanOutcome::InvalidExitState(status) => write!(f, "Invalid Exit! Status is {status}"),
        }
    }
}

pub struct GateController {
    ledger: Arc<TicketLedger>,
    footfall: Arc<FootfallStore>,
    clock: Arc<dyn Clock>,
    scanner: UserId,
}

impl GateController {
    pub fn new(
        ledger: Arc<TicketLedger>,
        footfall: Arc<FootfallStore>,
        clock: Arc<dyn Clock>,
        scanner: UserId,
    ) -> Self {
        Self {
            ledger,
            footfall,
            clock,
            scanner,
        }
    }

    pub fn scan_entry(&self, operator: &UserId, id: TicketId) -> Result<ScanOutcome, GateError> {
        self.authorize(operator, "scan_entry")?;
        let today = self.clock.now().date_naive();

        let change = self
            .ledger
            .transition(id, TicketStatus::Active, TicketStatus::InUse, |ticket| {
                self.footfall.record_entry(&ticket.source, today);
            })
            .ok_or(GateError::TicketNotFound(id))?;

        let outcome = match change {
            StatusChange::Applied(ticket) => ScanOutcome::Success(ticket),
            StatusChange::Rejected(ticket) => match ticket.status {
                TicketStatus::InUse => ScanOutcome::AlreadyScannedIn,
                status => ScanOutcome::InvalidEntryState(status),
            },
        };
        Self::log(id, &outcome);
        Ok(outcome)
    }

    pub fn scan_exit(&self, operator: &UserId, id: TicketId) -> Result<ScanOutcome, GateError> {
        self.authorize(operator, "scan_exit")?;
        let today = self.clock.now().date_naive();

        let change = self
            .ledger
            .transition(id, TicketStatus::InUse, TicketStatus::Used, |ticket| {
                self.footfall.record_exit(&ticket.destination, today);
            })
            .ok_or(GateError::TicketNotFound(id))?;

        let outcome = match change {
            StatusChange::Applied(ticket) => ScanOutcome::Success(ticket),
            StatusChange::Rejected(ticket) => match ticket.status {
                TicketStatus::Active => ScanOutcome::NeverScannedIn,
                status => ScanOutcome::InvalidExitState(status),
            },
        };
        Self::log(id, &outcome);
        Ok(outcome)
    }

    fn authorize(&self, operator: &UserId, operation: &'static str) -> Result<(), AccessError> {
        if operator == &self.scanner {
            Ok(())
        } else {
            warn!(user = %operator, operation, "Gate access denied");
            Err(AccessError::Forbidden {
                user: operator.clone(),
                operation,
            })
        }
    }

    fn log(id: TicketId, outcome: &ScanOutcome) {
        if outcome.is_success() {
            info!(ticket = %id, "{outcome}");
        } else {
            warn!(ticket = %id, "{outcome}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        clock::ManualClock,
        data::StationId,
        graph::{tests::red_blue, NetworkGraph},
        notifier::Outbox,
        pending::{PendingTransactionStore, DEFAULT_OTP_TTL_SECS},
        planner::{RoutePlanner, DEFAULT_FARE_PER_HOP},
        wallet::InMemoryWallet,
    };

    struct Fixture {
        gate: GateController,
        ledger: Arc<TicketLedger>,
        footfall: Arc<FootfallStore>,
        clock: Arc<ManualClock>,
        scanner: UserId,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap()));
        let wallet = Arc::new(InMemoryWallet::new());
        wallet.open(UserId::from("rider"), dec!(100));
        let pending = Arc::new(PendingTransactionStore::new(
            clock.clone(),
            Duration::seconds(DEFAULT_OTP_TTL_SECS),
        ));
        let ledger = Arc::new(TicketLedger::new(wallet, pending, Arc::new(Outbox::new()), clock.clone()));
        let footfall = Arc::new(FootfallStore::new());
        let scanner = UserId::from("scanner");
        let gate = GateController::new(ledger.clone(), footfall.clone(), clock.clone(), scanner.clone());

        Fixture {
            gate,
            ledger,
            footfall,
            clock,
            scanner,
        }
    }

    impl Fixture {
        fn issue(&self) -> Ticket {
            let planner = RoutePlanner::new(Arc::new(NetworkGraph::build(&red_blue())), DEFAULT_FARE_PER_HOP);
            let station = |id| Arc::clone(planner.graph().station(StationId(id)).unwrap());
            let transaction =
                self.ledger
                    .pending()
                    .create(&UserId::from("rider"), station(1), station(4), dec!(20));
            self.ledger.confirm_purchase(&transaction).unwrap()
        }

        fn counts(&self, station: u32, date: NaiveDate) -> (u32, u32) {
            self.footfall
                .counter(StationId(station), date)
                .map_or((0, 0), |c| (c.entry_count, c.exit_count))
        }
    }

    fn may_1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn full_journey_counts_entry_and_exit() {
        let f = fixture();
        let ticket = f.issue();

        let entry = f.gate.scan_entry(&f.scanner, ticket.id).unwrap();
        assert_eq!(entry.to_string(), "Ticket #1 Scanned IN at A");
        assert_eq!(f.counts(1, may_1()), (1, 0));

        let exit = f.gate.scan_exit(&f.scanner, ticket.id).unwrap();
        assert_eq!(exit.to_string(), "Ticket #1 Scanned OUT at D");
        assert_eq!(f.counts(4, may_1()), (0, 1));
        assert_eq!(f.ledger.ticket(ticket.id).unwrap().status, TicketStatus::Used);
    }

    #[test]
    fn second_entry_is_already_scanned_in() {
        let f = fixture();
        let ticket = f.issue();

        assert!(f.gate.scan_entry(&f.scanner, ticket.id).unwrap().is_success());
        assert_eq!(
            f.gate.scan_entry(&f.scanner, ticket.id).unwrap(),
            ScanOutcome::AlreadyScannedIn
        );
        assert_eq!(f.counts(1, may_1()), (1, 0));
    }

    #[test]
    fn exit_without_entry_is_refused() {
        let f = fixture();
        let ticket = f.issue();

        assert_eq!(
            f.gate.scan_exit(&f.scanner, ticket.id).unwrap(),
            ScanOutcome::NeverScannedIn
        );
        assert!(f.footfall.report(may_1()).is_empty());
        assert_eq!(f.ledger.ticket(ticket.id).unwrap().status, TicketStatus::Active);
    }

    #[test]
    fn used_and_expired_tickets_are_refused() {
        let f = fixture();
        let used = f.issue();
        f.gate.scan_entry(&f.scanner, used.id).unwrap();
        f.gate.scan_exit(&f.scanner, used.id).unwrap();

        assert_eq!(
            f.gate.scan_entry(&f.scanner, used.id).unwrap(),
            ScanOutcome::InvalidEntryState(TicketStatus::Used)
        );
        assert_eq!(
            f.gate.scan_exit(&f.scanner, used.id).unwrap(),
            ScanOutcome::InvalidExitState(TicketStatus::Used)
        );

        let expired = f.issue();
        f.ledger.expire(expired.id);
        assert_eq!(
            f.gate.scan_entry(&f.scanner, expired.id).unwrap().to_string(),
            "Invalid Entry! Status is EXPIRED"
        );
        assert_eq!(f.counts(1, may_1()), (1, 0));
    }

    #[test]
    fn unknown_ticket_and_foreign_operator_are_errors() {
        let f = fixture();
        let ticket = f.issue();

        assert_eq!(
            f.gate.scan_entry(&f.scanner, TicketId(404)),
            Err(GateError::TicketNotFound(TicketId(404)))
        );
        assert!(matches!(
            f.gate.scan_entry(&UserId::from("rider"), ticket.id),
            Err(GateError::Access(AccessError::Forbidden { .. }))
        ));
        assert_eq!(f.ledger.ticket(ticket.id).unwrap().status, TicketStatus::Active);
    }

    #[test]
    fn footfall_uses_the_scan_day() {
        let f = fixture();
        let ticket = f.issue();

        f.gate.scan_entry(&f.scanner, ticket.id).unwrap();
        f.clock.advance(Duration::hours(2));
        f.gate.scan_exit(&f.scanner, ticket.id).unwrap();

        let may_2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(f.counts(1, may_1()), (1, 0));
        assert_eq!(f.counts(4, may_2), (0, 1));
        assert_eq!(f.counts(4, may_1()), (0, 0));
    }

    #[test]
    fn racing_entry_scans_have_one_winner() {
        let f = fixture();
        let ticket = f.issue();

        let wins = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| f.gate.scan_entry(&f.scanner, ticket.id).unwrap().is_success()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count()
        });

        assert_eq!(wins, 1);
        assert_eq!(f.counts(1, may_1()), (1, 0));
    }

    #[test]
    fn racing_exit_scans_have_one_winner() {
        let f = fixture();
        let ticket = f.issue();
        assert!(f.gate.scan_entry(&f.scanner, ticket.id).unwrap().is_success());

        let wins = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| f.gate.scan_exit(&f.scanner, ticket.id).unwrap().is_success()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count()
        });

        assert_eq!(wins, 1);
        assert_eq!(f.counts(4, may_1()), (0, 1));
        assert_eq!(f.ledger.ticket(ticket.id).unwrap().status, TicketStatus::Used);
    }
}
