//! One-time-code protected purchase intents.
//!
//! Each user owns at most one pending transaction. Issuing a new one replaces
//! the previous slot, so a code from an earlier attempt can never confirm a
//! later purchase.

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    data::{Station, StationId, UserId},
    error::OtpRejection,
};

pub const DEFAULT_OTP_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OtpCode(u32);

impl OtpCode {
    pub const MAX: u32 = 999_999;

    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(0..=Self::MAX))
    }

    /// Accepts exactly six ASCII digits; leading zeros are significant.
    pub fn parse(input: &str) -> Result<Self, OtpRejection> {
        let input = input.trim();
        if input.len() != 6 || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpRejection::InvalidFormat);
        }
        input.parse().map(Self).map_err(|_| OtpRejection::InvalidFormat)
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    pub user: UserId,
    pub code: OtpCode,
    pub source: Arc<Station>,
    pub destination: Arc<Station>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at < ttl
    }
}

/// What the presentation layer may know about a pending purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingStatus {
    pub id: Uuid,
    pub source: Arc<Station>,
    pub destination: Arc<Station>,
    pub price: Decimal,
    pub expires_at: DateTime<Utc>,
    pub is_valid: bool,
}

pub struct PendingTransactionStore {
    slots: Mutex<HashMap<UserId, PendingTransaction>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PendingTransactionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues and stores a transaction in one step.
    pub fn create(
        &self,
        user: &UserId,
        source: Arc<Station>,
        destination: Arc<Station>,
        price: Decimal,
    ) -> PendingTransaction {
        let transaction = self.issue(user, source, destination, price);
        self.insert(transaction.clone());
        transaction
    }

    /// Builds a transaction with a fresh code without storing it, so the
    /// code can be delivered before it replaces the user's current slot.
    pub fn issue(
        &self,
        user: &UserId,
        source: Arc<Station>,
        destination: Arc<Station>,
        price: Decimal,
    ) -> PendingTransaction {
        PendingTransaction {
            id: Uuid::new_v4(),
            user: user.clone(),
            code: OtpCode::generate(),
            source,
            destination,
            price,
            created_at: self.clock.now(),
        }
    }

    pub fn insert(&self, transaction: PendingTransaction) {
        let user = transaction.user.clone();
        let (id, price) = (transaction.id, transaction.price);

        let superseded = self.slots.lock().insert(user.clone(), transaction);
        if let Some(previous) = superseded {
            info!(user = %user, previous = %previous.id, "Pending transaction superseded");
        }
        info!(user = %user, transaction = %id, %price, "Pending transaction created");
    }

    /// Drops every pending transaction that starts or ends at `station`.
    pub fn discard_for_station(&self, station: StationId) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, transaction| {
            transaction.source.id != station && transaction.destination.id != station
        });
        let discarded = before - slots.len();
        if discarded > 0 {
            info!(station = %station, discarded, "Pending transactions discarded");
        }
        discarded
    }

    /// Checks a submitted code and, on success, consumes the transaction.
    ///
    /// A mismatched code is reported as `InvalidCode` even when the
    /// transaction has also expired; the slot is kept on mismatch so the
    /// rider can retype the code within the validity window. Expired slots
    /// are always dropped.
    pub fn verify(&self, user: &UserId, submitted: &str) -> Result<PendingTransaction, OtpRejection> {
        let code = OtpCode::parse(submitted)?;
        let now = self.clock.now();

        let mut slots = self.slots.lock();
        let transaction = slots.get(user).ok_or(OtpRejection::NoPendingTransaction)?;
        let expired = !transaction.is_valid_at(now, self.ttl);
        let matches = transaction.code == code;

        if expired {
            slots.remove(user);
        }

        let rejection = match (matches, expired) {
            (true, false) => None,
            (false, _) => Some(OtpRejection::InvalidCode),
            (true, true) => Some(OtpRejection::Expired),
        };
        if let Some(rejection) = rejection {
            warn!(user = %user, %rejection, "OTP rejected");
            return Err(rejection);
        }

        slots.remove(user).ok_or(OtpRejection::NoPendingTransaction)
    }

    /// Puts a consumed transaction back, unless the user has started a new
    /// purchase in the meantime or the transaction is no longer valid.
    pub fn restore(&self, transaction: PendingTransaction) -> bool {
        if !transaction.is_valid_at(self.clock.now(), self.ttl) {
            return false;
        }

        let mut slots = self.slots.lock();
        if slots.contains_key(&transaction.user) {
            return false;
        }
        slots.insert(transaction.user.clone(), transaction);
        true
    }

    pub fn status(&self, user: &UserId) -> Option<PendingStatus> {
        let now = self.clock.now();
        self.slots.lock().get(user).map(|transaction| PendingStatus {
            id: transaction.id,
            source: Arc::clone(&transaction.source),
            destination: Arc::clone(&transaction.destination),
            price: transaction.price,
            expires_at: transaction.created_at + self.ttl,
            is_valid: transaction.is_valid_at(now, self.ttl),
        })
    }
}
