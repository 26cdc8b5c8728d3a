//! Wires the network, ledger, gates and footfall counters together behind
//! the operations a presentation layer calls.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    clock::Clock,
    config::{Config, Role},
    data::{LineId, Station, StationId, Ticket, TicketId, UserId},
    error::{AccessError, GateError, NetworkError, PurchaseError, RouteError, WalletError},
    footfall::{FootfallCounter, FootfallStore},
    gate::{GateController, ScanOutcome},
    graph::NetworkGraph,
    ledger::{PurchaseQuote, StatusChange, TicketLedger},
    map::MetroMap,
    network::Network,
    notifier::OtpNotifier,
    pending::{PendingStatus, PendingTransactionStore},
    planner::{RoutePlanner, RouteResult},
    wallet::Wallet,
};

pub struct MetroSystem {
    config: Config,
    network: RwLock<Network>,
    planner: RwLock<Arc<RoutePlanner>>,
    ledger: Arc<TicketLedger>,
    gate: GateController,
    footfall: Arc<FootfallStore>,
    wallet: Arc<dyn Wallet>,
    clock: Arc<dyn Clock>,
}

impl MetroSystem {
    pub fn new(
        config: Config,
        network: Network,
        wallet: Arc<dyn Wallet>,
        notifier: Arc<dyn OtpNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let planner = Arc::new(RoutePlanner::new(
            Arc::new(NetworkGraph::build(&network)),
            config.fare_per_hop,
        ));
        let pending = Arc::new(PendingTransactionStore::new(Arc::clone(&clock), config.otp_ttl));
        let ledger = Arc::new(TicketLedger::new(
            Arc::clone(&wallet),
            pending,
            notifier,
            Arc::clone(&clock),
        ));
        let footfall = Arc::new(FootfallStore::new());
        let gate = GateController::new(
            Arc::clone(&ledger),
            Arc::clone(&footfall),
            Arc::clone(&clock),
            config.scanner_user.clone(),
        );

        Self {
            config,
            network: RwLock::new(network),
            planner: RwLock::new(planner),
            ledger,
            gate,
            footfall,
            wallet,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn role_of(&self, user: &UserId) -> Role {
        self.config.role_of(user)
    }

    /// The planner over the current network snapshot.
    pub fn planner(&self) -> Arc<RoutePlanner> {
        Arc::clone(&*self.planner.read())
    }

    pub fn find_route(&self, source: StationId, destination: StationId) -> Result<RouteResult, RouteError> {
        self.planner().find_route(source, destination)
    }

    pub fn purchase_request(
        &self,
        user: &UserId,
        source: StationId,
        destination: StationId,
    ) -> Result<PurchaseQuote, PurchaseError> {
        let _network = self.network.read();
        self.ledger
            .purchase_request(&self.planner(), user, source, destination)
    }

    /// Holds the network read lock so a station cannot be removed between
    /// the code check and the ticket insert.
    pub fn confirm_purchase(&self, user: &UserId, code: &str) -> Result<Ticket, PurchaseError> {
        let _network = self.network.read();
        self.ledger.verify_and_confirm(user, code)
    }

    pub fn pending_status(&self, user: &UserId) -> Option<PendingStatus> {
        self.ledger.pending().status(user)
    }

    pub fn tickets(&self, user: &UserId) -> Vec<Ticket> {
        self.ledger.tickets_for_user(user)
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.ledger.ticket(id)
    }

    pub fn expire_ticket(&self, id: TicketId) -> Option<Ticket> {
        match self.ledger.expire(id)? {
            StatusChange::Applied(ticket) => Some(ticket),
            StatusChange::Rejected(_) => None,
        }
    }

    pub fn balance(&self, user: &UserId) -> Result<Decimal, WalletError> {
        self.wallet.balance(user)
    }

    pub fn top_up(&self, user: &UserId, amount: Decimal) -> Result<Decimal, WalletError> {
        self.wallet.credit(user, amount)
    }

    pub fn metro_map(&self, user: &UserId) -> MetroMap {
        let latest = self.ledger.latest_for_user(user);
        MetroMap::build(&self.network.read(), &self.planner(), latest.as_ref())
    }

    pub fn scan_entry(&self, operator: &UserId, id: TicketId) -> Result<ScanOutcome, GateError> {
        self.gate.scan_entry(operator, id)
    }

    pub fn scan_exit(&self, operator: &UserId, id: TicketId) -> Result<ScanOutcome, GateError> {
        self.gate.scan_exit(operator, id)
    }

    /// Today's counters when `date` is `None`.
    pub fn footfall_report(
        &self,
        user: &UserId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<FootfallCounter>, AccessError> {
        if self.role_of(user) != Role::Admin {
            return Err(AccessError::Forbidden {
                user: user.clone(),
                operation: "footfall_report",
            });
        }
        let date = date.unwrap_or_else(|| self.clock.now().date_naive());
        Ok(self.footfall.report(date))
    }

    pub fn add_station(&self, station: Station) -> Result<Arc<Station>, NetworkError> {
        self.modify_network(|network| network.add_station(station))
    }

    pub fn remove_station(&self, id: StationId) -> Result<Arc<Station>, NetworkError> {
        self.modify_network(|network| {
            let removed = network.remove_station(id, self.ledger.as_ref())?;
            self.ledger.pending().discard_for_station(id);
            Ok(removed)
        })
    }

    pub fn set_line_active(&self, line: LineId, is_active: bool) -> Result<(), NetworkError> {
        self.modify_network(|network| network.set_line_active(line, is_active))
    }

    /// Applies a change to the network and publishes a fresh graph snapshot.
    fn modify_network<T>(
        &self,
        change: impl FnOnce(&mut Network) -> Result<T, NetworkError>,
    ) -> Result<T, NetworkError> {
        let mut network = self.network.write();
        let result = change(&mut *network)?;

        let graph = NetworkGraph::build(&*network);
        info!(stations = graph.len(), "Network graph rebuilt");
        *self.planner.write() = Arc::new(RoutePlanner::new(Arc::new(graph), self.config.fare_per_hop));
        Ok(result)
    }
}
