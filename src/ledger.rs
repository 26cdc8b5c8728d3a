use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    data::{StationId, Ticket, TicketId, TicketStatus, UserId},
    error::{PurchaseError, RouteError},
    network::StationReferences,
    notifier::{Notification, OtpNotifier},
    pending::{PendingTransaction, PendingTransactionStore},
    planner::RoutePlanner,
    wallet::Wallet,
};

/// Price and directions shown to the rider while the code is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseQuote {
    pub transaction_id: Uuid,
    pub price: Decimal,
    pub hops: u32,
    pub instructions: Vec<String>,
    pub expires_at: DateTime<Utc>,
    /// Balance seen when the quote was made.
    pub balance: Decimal,
    /// Advisory only; confirmation checks the balance again.
    pub sufficient_funds: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Applied(Ticket),
    /// The ticket was not in the expected state; carries it unchanged.
    Rejected(Ticket),
}

/// Append-only record of issued tickets.
pub struct TicketLedger {
    tickets: Mutex<BTreeMap<TicketId, Ticket>>,
    wallet: Arc<dyn Wallet>,
    pending: Arc<PendingTransactionStore>,
    notifier: Arc<dyn OtpNotifier>,
    clock: Arc<dyn Clock>,
}

impl TicketLedger {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        pending: Arc<PendingTransactionStore>,
        notifier: Arc<dyn OtpNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets: Mutex::new(BTreeMap::new()),
            wallet,
            pending,
            notifier,
            clock,
        }
    }

    pub fn pending(&self) -> &PendingTransactionStore {
        &self.pending
    }

    /// Prices a trip and sends the rider a code to confirm it.
    ///
    /// A short wallet does not stop the request: the quote flags it so the
    /// rider can top up before confirming. The binding check happens in
    /// [`TicketLedger::confirm_purchase`].
    pub fn purchase_request(
        &self,
        planner: &RoutePlanner,
        user: &UserId,
        source: StationId,
        destination: StationId,
    ) -> Result<PurchaseQuote, PurchaseError> {
        if source == destination {
            return Err(PurchaseError::SameStation);
        }

        let route = planner.find_route(source, destination)?;
        let balance = self.wallet.balance(user)?;
        let sufficient_funds = balance >= route.fare;
        if !sufficient_funds {
            warn!(user = %user, %balance, price = %route.fare, "Insufficient balance for quoted trip");
        }

        let station = |id| {
            planner
                .graph()
                .station(id)
                .cloned()
                .ok_or(RouteError::UnknownStation(id))
        };
        let transaction = self
            .pending
            .issue(user, station(source)?, station(destination)?, route.fare);

        // An undelivered code must not displace the rider's current slot.
        self.notifier.send(Notification::purchase_code(
            user,
            transaction.code,
            &route.describe(),
        ))?;
        let (transaction_id, created_at) = (transaction.id, transaction.created_at);
        self.pending.insert(transaction);

        Ok(PurchaseQuote {
            transaction_id,
            price: route.fare,
            hops: route.hops,
            instructions: route.instructions,
            expires_at: created_at + self.pending.ttl(),
            balance,
            sufficient_funds,
        })
    }

    /// Debits the wallet and issues the ticket as one unit.
    ///
    /// The ledger lock is held across the debit so no ticket exists without
    /// its payment and a failed debit leaves no ticket behind.
    pub fn confirm_purchase(&self, transaction: &PendingTransaction) -> Result<Ticket, PurchaseError> {
        let ticket = {
            let mut tickets = self.tickets.lock();
            self.wallet.debit(&transaction.user, transaction.price)?;

            let id = TicketId(tickets.last_key_value().map_or(1, |(id, _)| id.0 + 1));
            let ticket = Ticket {
                id,
                user: transaction.user.clone(),
                source: Arc::clone(&transaction.source),
                destination: Arc::clone(&transaction.destination),
                price: transaction.price,
                purchased_at: self.clock.now(),
                status: TicketStatus::Active,
            };
            tickets.insert(id, ticket.clone());
            ticket
        };

        info!(
            ticket = %ticket.id,
            user = %ticket.user,
            source = %ticket.source,
            destination = %ticket.destination,
            price = %ticket.price,
            "Ticket issued"
        );

        if let Err(err) = self.notifier.send(Notification::ticket_confirmed(&ticket)) {
            warn!(ticket = %ticket.id, %err, "Confirmation notice not delivered");
        }

        Ok(ticket)
    }

    /// Verifies the rider's code and confirms the purchase it protects.
    ///
    /// When the wallet no longer covers the price the transaction is put
    /// back, so the rider may top up and retry within the same window.
    pub fn verify_and_confirm(&self, user: &UserId, code: &str) -> Result<Ticket, PurchaseError> {
        let transaction = self.pending.verify(user, code)?;

        match self.confirm_purchase(&transaction) {
            Err(err @ PurchaseError::InsufficientFunds { .. }) => {
                let kept = self.pending.restore(transaction);
                warn!(user = %user, %err, kept, "Confirmation refused");
                Err(err)
            }
            result => result,
        }
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.tickets.lock().get(&id).cloned()
    }

    /// Tickets of a user, newest first.
    pub fn tickets_for_user(&self, user: &UserId) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .lock()
            .values()
            .filter(|ticket| &ticket.user == user)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at).then(b.id.cmp(&a.id)));
        tickets
    }

    pub fn latest_for_user(&self, user: &UserId) -> Option<Ticket> {
        self.tickets_for_user(user).into_iter().next()
    }

    /// Moves a ticket from `from` to `to` if, and only if, it is currently in
    /// `from`. `on_applied` runs before the ledger lock is released.
    ///
    /// Returns `None` for an unknown ticket.
    pub fn transition(
        &self,
        id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        on_applied: impl FnOnce(&Ticket),
    ) -> Option<StatusChange> {
        let mut tickets = self.tickets.lock();
        let ticket = tickets.get_mut(&id)?;
        if ticket.status != from {
            return Some(StatusChange::Rejected(ticket.clone()));
        }

        ticket.status = to;
        on_applied(ticket);
        Some(StatusChange::Applied(ticket.clone()))
    }

    /// Retires an unused ticket.
    pub fn expire(&self, id: TicketId) -> Option<StatusChange> {
        let change = self.transition(id, TicketStatus::Active, TicketStatus::Expired, |_| {});
        if let Some(StatusChange::Applied(ticket)) = &change {
            info!(ticket = %ticket.id, "Ticket expired");
        }
        change
    }
}

impl StationReferences for TicketLedger {
    fn references_station(&self, station: StationId) -> bool {
        self.tickets
            .lock()
            .values()
            .any(|ticket| ticket.references(station))
    }
}
