//! Test-data builder for auctions.

use chrono::{DateTime, Duration, Utc};

use crate::auction::{Auction, AuctionState, Bid};
use crate::user::User;

/// Fluent builder with sensible defaults for every field.
///
/// Bids are attached before the closed flag is applied, so a closed auction
/// with a bid history can be described in any order.
#[derive(Debug, Clone)]
pub struct AuctionBuilder {
    name: String,
    initial_value: f64,
    owner: User,
    opened_at: DateTime<Utc>,
    used: bool,
    closed: bool,
    bids: Vec<Bid>,
}

impl Default for AuctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionBuilder {
    pub fn new() -> Self {
        Self {
            name: "Xbox".to_string(),
            initial_value: 1500.0,
            owner: User::unvalidated("Joao da Silva", "joao@silva.com.br"),
            opened_at: Utc::now(),
            used: false,
            closed: false,
            bids: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn owned_by(mut self, owner: User) -> Self {
        self.owner = owner;
        self
    }

    pub fn opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = opened_at;
        self
    }

    pub fn days_ago(mut self, days: i64) -> Self {
        self.opened_at = Utc::now() - Duration::days(days);
        self
    }

    pub fn used(mut self) -> Self {
        self.used = true;
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn with_bid(mut self, bid: Bid) -> Self {
        self.bids.push(bid);
        self
    }

    pub fn build(self) -> Auction {
        Auction::restore(AuctionState {
            id: None,
            name: self.name,
            initial_value: self.initial_value,
            opened_at: self.opened_at,
            closed: self.closed,
            used: self.used,
            owner: self.owner,
            bids: self.bids,
        })
    }
}
