//! `gavel-auction`: users, auctions and their bids.

pub mod auction;
pub mod builder;
pub mod user;

pub use auction::{Auction, AuctionState, Bid};
pub use builder::AuctionBuilder;
pub use user::User;
