use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gavel_core::{AuctionId, BidId, DomainError, DomainResult, Entity};

use crate::user::User;

/// A value offered by a user against an auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    id: Option<BidId>,
    placed_at: DateTime<Utc>,
    bidder: User,
    value: f64,
}

impl Bid {
    pub fn new(placed_at: DateTime<Utc>, bidder: User, value: f64) -> Self {
        Self {
            id: None,
            placed_at,
            bidder,
            value,
        }
    }

    /// Rehydrate a bid loaded from storage.
    pub fn restore(id: BidId, placed_at: DateTime<Utc>, bidder: User, value: f64) -> Self {
        Self {
            id: Some(id),
            placed_at,
            bidder,
            value,
        }
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn bidder(&self) -> &User {
        &self.bidder
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn assign_id(&mut self, id: BidId) {
        self.id = Some(id);
    }
}

impl Entity for Bid {
    type Id = BidId;
    const KIND: &'static str = "bid";

    fn id(&self) -> Option<BidId> {
        self.id
    }
}

/// Full field set of an auction, used to rehydrate one from storage
/// (or from a test builder) without going through the lifecycle methods.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionState {
    pub id: Option<AuctionId>,
    pub name: String,
    pub initial_value: f64,
    pub opened_at: DateTime<Utc>,
    pub closed: bool,
    pub used: bool,
    pub owner: User,
    pub bids: Vec<Bid>,
}

/// A listing with an initial value, an owner and a bid history.
///
/// ## Invariants
///
/// - Closing is one-directional: a closed auction never reopens.
/// - Bids are kept in submission order.
/// - A closed auction accepts no further bids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    id: Option<AuctionId>,
    name: String,
    initial_value: f64,
    opened_at: DateTime<Utc>,
    closed: bool,
    used: bool,
    owner: User,
    bids: Vec<Bid>,
}

impl Auction {
    /// Open a new auction now.
    pub fn new(name: impl Into<String>, initial_value: f64, owner: User, used: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            initial_value,
            opened_at: Utc::now(),
            closed: false,
            used,
            owner,
            bids: Vec::new(),
        }
    }

    pub fn restore(state: AuctionState) -> Self {
        Self {
            id: state.id,
            name: state.name,
            initial_value: state.initial_value,
            opened_at: state.opened_at,
            closed: state.closed,
            used: state.used,
            owner: state.owner,
            bids: state.bids,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("auction name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }

    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    pub fn set_opened_at(&mut self, opened_at: DateTime<Utc>) {
        self.opened_at = opened_at;
    }

    /// Close the auction. Closing an already closed auction is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whole days elapsed between opening and `now`.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.opened_at).num_days()
    }

    /// Append a bid to the history.
    pub fn place_bid(&mut self, bid: Bid) -> DomainResult<()> {
        if self.closed {
            return Err(DomainError::invariant(format!(
                "auction '{}' is closed and accepts no bids",
                self.name
            )));
        }
        if !bid.value.is_finite() || bid.value <= 0.0 {
            return Err(DomainError::validation(format!(
                "bid value must be positive, got {}",
                bid.value
            )));
        }
        self.bids.push(bid);
        Ok(())
    }

    pub fn lowest_bid(&self) -> Option<f64> {
        self.bids.iter().map(Bid::value).reduce(f64::min)
    }

    pub fn highest_bid(&self) -> Option<f64> {
        self.bids.iter().map(Bid::value).reduce(f64::max)
    }

    /// Whether the auction is still open and its bid values span any part of
    /// `[min, max]`. An inverted or NaN-bounded range never matches.
    pub fn is_disputed_between(&self, min: f64, max: f64) -> bool {
        if self.closed || min.is_nan() || max.is_nan() || min > max {
            return false;
        }
        match (self.lowest_bid(), self.highest_bid()) {
            (Some(low), Some(high)) => low <= max && high >= min,
            _ => false,
        }
    }

    pub fn assign_id(&mut self, id: AuctionId) {
        self.id = Some(id);
    }

    /// Record store identities for the bid history, in submission order.
    pub fn assign_bid_ids(&mut self, ids: &[BidId]) {
        for (bid, id) in self.bids.iter_mut().zip(ids) {
            bid.assign_id(*id);
        }
    }
}

impl Entity for Auction {
    type Id = AuctionId;
    const KIND: &'static str = "auction";

    fn id(&self) -> Option<AuctionId> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn user(name: &str, email: &str) -> User {
        User::new(name, email).unwrap()
    }

    fn owner() -> User {
        user("Judith", "judith@email.com")
    }

    #[test]
    fn closing_is_one_directional() {
        let mut auction = Auction::new("RTX 3090", 10000.0, owner(), false);
        assert!(!auction.is_closed());

        auction.close();
        auction.close();
        assert!(auction.is_closed());
    }

    #[test]
    fn closed_auctions_reject_bids() {
        let mut auction = Auction::new("RTX 3080", 5000.0, owner(), false);
        auction.close();

        let bid = Bid::new(Utc::now(), user("Joao", "joao@joao.com.br"), 5100.0);
        assert!(matches!(
            auction.place_bid(bid),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(auction.bids().is_empty());
    }

    #[test]
    fn non_positive_bids_are_rejected() {
        let mut auction = Auction::new("RTX 3080", 5000.0, owner(), false);
        let bidder = user("Joao", "joao@joao.com.br");

        assert!(auction.place_bid(Bid::new(Utc::now(), bidder.clone(), 0.0)).is_err());
        assert!(auction.place_bid(Bid::new(Utc::now(), bidder, f64::NAN)).is_err());
    }

    #[test]
    fn bid_span_tracks_lowest_and_highest() {
        let mut auction = Auction::new("Nintendo Wii", 2500.0, owner(), false);
        assert_eq!(auction.lowest_bid(), None);
        assert!(!auction.is_disputed_between(0.0, f64::MAX));

        let joao = user("Joao", "joao@joao.com.br");
        let maria = user("Maria", "maria@maria.com.br");
        auction.place_bid(Bid::new(Utc::now(), joao.clone(), 3000.0)).unwrap();
        auction.place_bid(Bid::new(Utc::now(), maria, 3500.0)).unwrap();
        auction.place_bid(Bid::new(Utc::now(), joao, 4000.0)).unwrap();

        assert_eq!(auction.lowest_bid(), Some(3000.0));
        assert_eq!(auction.highest_bid(), Some(4000.0));
        assert!(auction.is_disputed_between(1000.0, 3000.0));
        assert!(auction.is_disputed_between(3200.0, 3300.0));
        assert!(!auction.is_disputed_between(4000.5, 9000.0));
        assert!(!auction.is_disputed_between(100.0, 2999.0));
        assert!(!auction.is_disputed_between(3300.0, 3200.0));
        assert!(!auction.is_disputed_between(f64::NAN, 3300.0));

        auction.close();
        assert!(!auction.is_disputed_between(1000.0, 3000.0));
    }

    #[test]
    fn age_counts_whole_days() {
        let now = Utc::now();
        let mut auction = Auction::new("RTX 2080 TI", 10000.0, owner(), false);

        auction.set_opened_at(now - Duration::days(7));
        assert_eq!(auction.age_in_days(now), 7);

        auction.set_opened_at(now - Duration::days(2) - Duration::hours(23));
        assert_eq!(auction.age_in_days(now), 2);
    }

    proptest! {
        #[test]
        fn age_matches_offset_in_days(days in 0i64..3650) {
            let now = Utc::now();
            let mut auction = Auction::new("Geladeira", 1500.0, owner(), true);
            auction.set_opened_at(now - Duration::days(days));
            prop_assert_eq!(auction.age_in_days(now), days);
        }
    }
}
