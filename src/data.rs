use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StationId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TicketId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub line_id: LineId,
    pub sequence_number: u32,
}

impl Station {
    /// Lowercased name, the key under which interchanges are matched.
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_physically_adjacent(&self, other: &Station) -> bool {
        self.line_id == other.line_id && self.sequence_number.abs_diff(other.sequence_number) == 1
    }

    /// Same physical location on another line.
    pub fn is_transfer_pair(&self, other: &Station) -> bool {
        self.id != other.id && self.line_id != other.line_id && self.name_key() == other.name_key()
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    InUse,
    Used,
    Expired,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::InUse => "IN_USE",
            TicketStatus::Used => "USED",
            TicketStatus::Expired => "EXPIRED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user: UserId,
    pub source: Arc<Station>,
    pub destination: Arc<Station>,
    pub price: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub status: TicketStatus,
}

impl Ticket {
    pub fn references(&self, station: StationId) -> bool {
        self.source.id == station || self.destination.id == station
    }
}
