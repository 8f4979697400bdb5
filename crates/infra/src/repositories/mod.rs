//! Repository facades over a `Session`, one per root entity.

mod auctions;
mod rows;
mod users;

pub use auctions::AuctionRepository;
pub use users::UserRepository;
