use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::info;

use crate::{data::UserId, error::WalletError};

/// Stored-value balance of each rider.
///
/// `debit` must be a single check-and-subtract: it either removes exactly
/// `amount` or leaves the balance untouched.
pub trait Wallet: Send + Sync {
    fn balance(&self, user: &UserId) -> Result<Decimal, WalletError>;

    /// Returns the balance left after the debit.
    fn debit(&self, user: &UserId, amount: Decimal) -> Result<Decimal, WalletError>;

    /// Returns the balance after the top-up.
    fn credit(&self, user: &UserId, amount: Decimal) -> Result<Decimal, WalletError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWallet {
    balances: Mutex<HashMap<UserId, Decimal>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, user: UserId, initial_balance: Decimal) {
        self.balances.lock().insert(user, initial_balance);
    }
}

impl Wallet for InMemoryWallet {
    fn balance(&self, user: &UserId) -> Result<Decimal, WalletError> {
        self.balances
            .lock()
            .get(user)
            .copied()
            .ok_or_else(|| WalletError::UnknownAccount(user.clone()))
    }

    fn debit(&self, user: &UserId, amount: Decimal) -> Result<Decimal, WalletError> {
        if amount.is_sign_negative() {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut balances = self.balances.lock();
        let balance = balances
            .get_mut(user)
            .ok_or_else(|| WalletError::UnknownAccount(user.clone()))?;
        if *balance < amount {
            return Err(WalletError::InsufficientFunds {
                balance: *balance,
                requested: amount,
            });
        }

        *balance -= amount;
        Ok(*balance)
    }

    fn credit(&self, user: &UserId, amount: Decimal) -> Result<Decimal, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut balances = self.balances.lock();
        let balance = balances
            .get_mut(user)
            .ok_or_else(|| WalletError::UnknownAccount(user.clone()))?;
        *balance += amount;
        let balance = *balance;
        info!(user = %user, %amount, %balance, "Wallet topped up");
        Ok(balance)
    }
}
