//! Runtime configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored; every setting has a
//! default so the binary starts with no environment at all.

use std::{env, path::PathBuf};

use chrono::Duration;
use rust_decimal::Decimal;

use crate::{
    data::UserId,
    pending::DEFAULT_OTP_TTL_SECS,
    planner::DEFAULT_FARE_PER_HOP,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `lines.txt` and `stations.txt`
    pub feed_dir: PathBuf,
    /// Price of one hop between adjacent stations
    pub fare_per_hop: Decimal,
    /// How long a purchase code stays valid
    pub otp_ttl: Duration,
    /// The only identity allowed to operate gates
    pub scanner_user: UserId,
    /// The identity allowed to read footfall reports
    pub admin_user: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Scanner,
    Admin,
    Rider,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_dir: PathBuf::from("network"),
            fare_per_hop: DEFAULT_FARE_PER_HOP,
            otp_ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
            scanner_user: UserId::from("scanner"),
            admin_user: UserId::from("admin"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            feed_dir: env::var("METRO_FEED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.feed_dir),
            fare_per_hop: env::var("METRO_FARE_PER_HOP")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fare: &Decimal| !fare.is_sign_negative())
                .unwrap_or(defaults.fare_per_hop),
            otp_ttl: env::var("METRO_OTP_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .map(Duration::seconds)
                .unwrap_or(defaults.otp_ttl),
            scanner_user: env::var("METRO_SCANNER_USER")
                .map(UserId)
                .unwrap_or(defaults.scanner_user),
            admin_user: env::var("METRO_ADMIN_USER")
                .map(UserId)
                .unwrap_or(defaults.admin_user),
        }
    }

    /// Where a signed-in user belongs.
    pub fn role_of(&self, user: &UserId) -> Role {
        if user == &self.scanner_user {
            Role::Scanner
        } else if user == &self.admin_user {
            Role::Admin
        } else {
            Role::Rider
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn defaults_match_the_fare_table() {
        let config = Config::default();

        assert_eq!(config.fare_per_hop, dec!(10));
        assert_eq!(config.otp_ttl, Duration::minutes(5));
        assert_eq!(config.feed_dir, PathBuf::from("network"));
    }

    #[test]
    fn roles_follow_configured_identities() {
        let config = Config::default();

        assert_eq!(config.role_of(&UserId::from("scanner")), Role::Scanner);
        assert_eq!(config.role_of(&UserId::from("admin")), Role::Admin);
        assert_eq!(config.role_of(&UserId::from("alice")), Role::Rider);
    }
}
