use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::{LineId, StationId, TicketId, UserId};

/// Coarse classification the presentation layer uses to pick between a
/// warning and a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInput,
    NotFound,
    StateConflict,
    InvalidCredential,
    InsufficientFunds,
    Forbidden,
    Transient,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Unable to open feed file {path:?}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed feed row: {0}")]
    Csv(#[from] csv::Error),

    #[error("Station {station_id} references unknown Line {line_id}")]
    UnknownLine { station_id: u32, line_id: u32 },

    #[error("Line {0} is defined more than once")]
    DuplicateLine(u32),

    #[error("Station {0} is defined more than once")]
    DuplicateStation(u32),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("No such Station {0}")]
    UnknownStation(StationId),

    #[error("No such Line {0}")]
    UnknownLine(LineId),

    #[error("Line {0} already exists")]
    DuplicateLine(LineId),

    #[error("Station {0} already exists")]
    DuplicateStation(StationId),

    #[error("Sequence number {sequence_number} is already taken on Line {line_id}")]
    SequenceTaken { line_id: LineId, sequence_number: u32 },

    #[error("Station {0} is referenced by issued tickets and cannot be removed")]
    StationInUse(StationId),
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::UnknownStation(_) | NetworkError::UnknownLine(_) => ErrorKind::NotFound,
            NetworkError::DuplicateLine(_)
            | NetworkError::DuplicateStation(_)
            | NetworkError::SequenceTaken { .. } => ErrorKind::UserInput,
            NetworkError::StationInUse(_) => ErrorKind::StateConflict,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No such Station {0}")]
    UnknownStation(StationId),

    #[error("No route found from {source_name} to {destination_name}")]
    NotFound {
        source_name: String,
        destination_name: String,
    },
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::UnknownStation(_) => ErrorKind::UserInput,
            RouteError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("No wallet for user {0}")]
    UnknownAccount(UserId),

    #[error("Insufficient balance: {balance} < {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::UnknownAccount(_) => ErrorKind::NotFound,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::InvalidAmount(_) => ErrorKind::UserInput,
        }
    }
}

/// Why a submitted one-time code did not confirm a purchase.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    #[error("No pending transaction")]
    NoPendingTransaction,

    #[error("OTP must be exactly 6 digits")]
    InvalidFormat,

    #[error("Invalid OTP")]
    InvalidCode,

    #[error("OTP has expired")]
    Expired,
}

impl OtpRejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OtpRejection::NoPendingTransaction => ErrorKind::NotFound,
            OtpRejection::InvalidFormat => ErrorKind::UserInput,
            OtpRejection::InvalidCode | OtpRejection::Expired => ErrorKind::InvalidCredential,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Could not deliver notification to {user}: {reason}")]
    Delivery { user: UserId, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("Source and Destination cannot be same")]
    SameStation,

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("Insufficient balance: {balance} < {price}")]
    InsufficientFunds { balance: Decimal, price: Decimal },

    #[error(transparent)]
    Otp(#[from] OtpRejection),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<WalletError> for PurchaseError {
    fn from(value: WalletError) -> Self {
        match value {
            WalletError::InsufficientFunds { balance, requested } => PurchaseError::InsufficientFunds {
                balance,
                price: requested,
            },
            other => PurchaseError::Wallet(other),
        }
    }
}

impl PurchaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PurchaseError::SameStation => ErrorKind::UserInput,
            PurchaseError::Route(err) => err.kind(),
            PurchaseError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            PurchaseError::Otp(err) => err.kind(),
            PurchaseError::Wallet(err) => err.kind(),
            PurchaseError::Notify(_) => ErrorKind::Transient,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("ACCESS DENIED: {user} may not perform {operation}")]
    Forbidden { user: UserId, operation: &'static str },
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Forbidden
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Ticket {0} not found")]
    TicketNotFound(TicketId),
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Access(_) => ErrorKind::Forbidden,
            GateError::TicketNotFound(_) => ErrorKind::NotFound,
        }
    }
}
