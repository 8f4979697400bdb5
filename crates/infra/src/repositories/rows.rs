//! SQLx row types and their mapping onto domain entities.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use gavel_auction::{Auction, AuctionState, Bid, User};
use gavel_core::{AuctionId, BidId, UserId};

/// Columns selected for a user.
pub(super) const USER_COLUMNS: &str = "u.id, u.name, u.email";

/// Columns selected for an auction joined with its owner (`o`).
pub(super) const AUCTION_COLUMNS: &str = "a.id, a.name, a.initial_value, a.opened_at, a.closed, a.used, \
     a.owner_id, o.name AS owner_name, o.email AS owner_email";

/// Columns selected for a bid joined with its bidder (`u`).
pub(super) const BID_COLUMNS: &str =
    "b.id, b.auction_id, b.value, b.placed_at, b.bidder_id, u.name AS bidder_name, u.email AS bidder_email";

#[derive(Debug)]
pub(super) struct UserRow {
    id: i64,
    name: String,
    email: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for UserRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::restore(UserId::from_i64(row.id), row.name, row.email)
    }
}

#[derive(Debug)]
pub(super) struct AuctionRow {
    pub(super) id: i64,
    name: String,
    initial_value: f64,
    opened_at: DateTime<Utc>,
    closed: bool,
    used: bool,
    owner_id: i64,
    owner_name: String,
    owner_email: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for AuctionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(AuctionRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            initial_value: row.try_get("initial_value")?,
            opened_at: row.try_get("opened_at")?,
            closed: row.try_get("closed")?,
            used: row.try_get("used")?,
            owner_id: row.try_get("owner_id")?,
            owner_name: row.try_get("owner_name")?,
            owner_email: row.try_get("owner_email")?,
        })
    }
}

impl AuctionRow {
    pub(super) fn into_auction(self, bids: Vec<Bid>) -> Auction {
        Auction::restore(AuctionState {
            id: Some(AuctionId::from_i64(self.id)),
            name: self.name,
            initial_value: self.initial_value,
            opened_at: self.opened_at,
            closed: self.closed,
            used: self.used,
            owner: User::restore(UserId::from_i64(self.owner_id), self.owner_name, self.owner_email),
            bids,
        })
    }
}

#[derive(Debug)]
pub(super) struct BidRow {
    id: i64,
    pub(super) auction_id: i64,
    value: f64,
    placed_at: DateTime<Utc>,
    bidder_id: i64,
    bidder_name: String,
    bidder_email: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for BidRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(BidRow {
            id: row.try_get("id")?,
            auction_id: row.try_get("auction_id")?,
            value: row.try_get("value")?,
            placed_at: row.try_get("placed_at")?,
            bidder_id: row.try_get("bidder_id")?,
            bidder_name: row.try_get("bidder_name")?,
            bidder_email: row.try_get("bidder_email")?,
        })
    }
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid::restore(
            BidId::from_i64(row.id),
            row.placed_at,
            User::restore(UserId::from_i64(row.bidder_id), row.bidder_name, row.bidder_email),
            row.value,
        )
    }
}
