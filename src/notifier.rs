use parking_lot::Mutex;
use tracing::info;

use crate::{
    data::{Ticket, UserId},
    error::NotifyError,
    pending::OtpCode,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user: UserId,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn purchase_code(user: &UserId, code: OtpCode, route_description: &str) -> Self {
        Self {
            user: user.clone(),
            subject: "Confirm Purchase".to_owned(),
            body: format!("OTP: {code}. Route: {route_description}"),
        }
    }

    pub fn ticket_confirmed(ticket: &Ticket) -> Self {
        Self {
            user: ticket.user.clone(),
            subject: "Ticket Confirmed".to_owned(),
            body: format!("Ticket purchased for {}.", ticket.price),
        }
    }
}

/// Delivers one-time codes and purchase receipts to riders.
pub trait OtpNotifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl OtpNotifier for LogNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            user = %notification.user,
            subject = %notification.subject,
            body = %notification.body,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<Notification>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn last_for(&self, user: &UserId) -> Option<Notification> {
        self.sent.lock().iter().rev().find(|n| &n.user == user).cloned()
    }

    /// The code carried by the most recent purchase message of `user`.
    pub fn last_code_for(&self, user: &UserId) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .filter(|n| &n.user == user)
            .find_map(|n| n.body.strip_prefix("OTP: ")?.get(..6).map(str::to_owned))
    }
}

impl OtpNotifier for Outbox {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::data::{LineId, Station, StationId, TicketId, TicketStatus};

    #[test]
    fn purchase_message_carries_code_and_route() {
        let user = UserId::from("rider");
        let outbox = Outbox::new();
        let code = OtpCode::parse("004211").unwrap();

        outbox
            .send(Notification::purchase_code(&user, code, "switch at B to Blue"))
            .unwrap();

        let sent = outbox.last_for(&user).unwrap();
        assert_eq!(sent.subject, "Confirm Purchase");
        assert_eq!(sent.body, "OTP: 004211. Route: switch at B to Blue");
        assert_eq!(outbox.last_code_for(&user).as_deref(), Some("004211"));
        assert_eq!(outbox.last_code_for(&UserId::from("other")), None);
    }

    #[test]
    fn receipt_states_the_price() {
        let station = |id: u32, name: &str| {
            Arc::new(Station {
                id: StationId(id),
                name: name.into(),
                line_id: LineId(1),
                sequence_number: id,
            })
        };
        let ticket = Ticket {
            id: TicketId(1),
            user: UserId::from("rider"),
            source: station(1, "A"),
            destination: station(4, "D"),
            price: dec!(20),
            purchased_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            status: TicketStatus::Active,
        };

        let receipt = Notification::ticket_confirmed(&ticket);
        assert_eq!(receipt.subject, "Ticket Confirmed");
        assert_eq!(receipt.body, "Ticket purchased for 20.");
    }
}
