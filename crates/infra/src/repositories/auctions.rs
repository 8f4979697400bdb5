//! Auction repository.
//!
//! Every read returns fully hydrated auctions: owner plus bid history in
//! submission order. Filters are composed with `QueryBuilder` on top of a
//! shared `SELECT ... FROM auctions a JOIN users o` prefix; bids for the
//! returned page are then loaded with a single `IN (...)` query.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, FromRow, QueryBuilder, Row, Sqlite, Transaction};
use tracing::{Span, instrument};

use gavel_auction::{Auction, Bid, User};
use gavel_core::{AuctionId, BidId, DomainError, Entity, UserId};

use crate::db::Session;
use crate::error::{RepositoryError, map_sqlx_error, require_id};

use super::rows::{AUCTION_COLUMNS, AuctionRow, BID_COLUMNS, BidRow};

/// Age after which an auction counts as old.
const ONE_WEEK_DAYS: i64 = 7;

/// Deterministic ordering for date-based listings (ties keep insertion order).
const ORDER_BY_OPENED_AT: &str = " ORDER BY a.opened_at ASC, a.id ASC";

/// Reads and writes `auctions` rows (and, by cascade, `bids`) through a
/// borrowed session.
pub struct AuctionRepository<'s> {
    session: &'s mut Session,
}

impl<'s> AuctionRepository<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Number of auctions that are not closed.
    #[instrument(skip(self), err)]
    pub async fn count_open(&mut self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM auctions WHERE closed = 0")
            .fetch_one(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("count_open_auctions", e))?;

        row.try_get("total")
            .map_err(|e| map_sqlx_error("decode_count", e))
    }

    /// Auctions for items that were never used, by name.
    #[instrument(skip(self), fields(result_count = tracing::field::Empty), err)]
    pub async fn new_items(&mut self) -> Result<Vec<Auction>, RepositoryError> {
        let mut query = select_auctions();
        query.push(" WHERE a.used = 0 ORDER BY a.name ASC, a.id ASC");
        self.fetch_hydrated("list_new_item_auctions", query).await
    }

    /// Auctions opened a week or more before now.
    pub async fn older_than_a_week(&mut self) -> Result<Vec<Auction>, RepositoryError> {
        self.older_than_a_week_at(Utc::now()).await
    }

    /// Auctions opened at or before `now - 7 days`; the boundary is inclusive.
    #[instrument(skip(self), fields(result_count = tracing::field::Empty), err)]
    pub async fn older_than_a_week_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let cutoff = now - Duration::days(ONE_WEEK_DAYS);

        let mut query = select_auctions();
        query.push(" WHERE a.opened_at <= ").push_bind(cutoff);
        query.push(ORDER_BY_OPENED_AT);
        self.fetch_hydrated("list_auctions_older_than_a_week", query).await
    }

    /// Open auctions whose opening date lies in `[start, end]`.
    ///
    /// Closed auctions are excluded whatever their date.
    #[instrument(skip(self), fields(result_count = tracing::field::Empty), err)]
    pub async fn open_between(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let mut query = select_auctions();
        query
            .push(" WHERE a.closed = 0 AND a.opened_at BETWEEN ")
            .push_bind(start)
            .push(" AND ")
            .push_bind(end);
        query.push(ORDER_BY_OPENED_AT);
        self.fetch_hydrated("list_open_auctions_between", query).await
    }

    /// Open auctions whose bid span `[lowest, highest]` touches `[min, max]`.
    ///
    /// Auctions without bids are never disputed. An inverted range, or one
    /// with a NaN bound, matches nothing.
    #[instrument(skip(self), fields(result_count = tracing::field::Empty), err)]
    pub async fn disputed_between(
        &mut self,
        min: f64,
        max: f64,
    ) -> Result<Vec<Auction>, RepositoryError> {
        if min.is_nan() || max.is_nan() || min > max {
            Span::current().record("result_count", 0);
            return Ok(Vec::new());
        }

        let mut query = select_auctions();
        query
            .push(
                " WHERE a.closed = 0 AND a.id IN (\
                 SELECT auction_id FROM bids GROUP BY auction_id \
                 HAVING MIN(value) <= ",
            )
            .push_bind(max)
            .push(" AND MAX(value) >= ")
            .push_bind(min)
            .push(")");
        query.push(ORDER_BY_OPENED_AT);
        self.fetch_hydrated("list_disputed_auctions", query).await
    }

    /// Auctions `bidder` placed at least one bid on, each listed once.
    #[instrument(skip(self, bidder), fields(bidder_id = ?bidder.id(), result_count = tracing::field::Empty), err)]
    pub async fn bid_on_by(&mut self, bidder: &User) -> Result<Vec<Auction>, RepositoryError> {
        let bidder_id = require_id(bidder, "bidder")?;

        let mut query = select_auctions();
        query
            .push(" WHERE a.id IN (SELECT auction_id FROM bids WHERE bidder_id = ")
            .push_bind(bidder_id.as_i64())
            .push(")");
        query.push(ORDER_BY_OPENED_AT);
        self.fetch_hydrated("list_auctions_bid_on_by_user", query).await
    }

    /// Mean initial value of the distinct auctions `bidder` bid on.
    ///
    /// `None` when the user never bid.
    #[instrument(skip(self, bidder), fields(bidder_id = ?bidder.id()), err)]
    pub async fn average_initial_value_bid_on_by(
        &mut self,
        bidder: &User,
    ) -> Result<Option<f64>, RepositoryError> {
        let bidder_id = require_id(bidder, "bidder")?;

        let row = sqlx::query(
            r#"
            SELECT AVG(initial_value) AS average
            FROM auctions
            WHERE id IN (SELECT auction_id FROM bids WHERE bidder_id = ?)
            "#,
        )
        .bind(bidder_id.as_i64())
        .fetch_one(self.session.connection())
        .await
        .map_err(|e| map_sqlx_error("average_initial_value", e))?;

        row.try_get::<Option<f64>, _>("average")
            .map_err(|e| map_sqlx_error("decode_average", e))
    }

    #[instrument(skip(self), err)]
    pub async fn find_by_id(&mut self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        let mut query = select_auctions();
        query.push(" WHERE a.id = ").push_bind(id.as_i64());
        let mut found = self.fetch_hydrated("find_auction_by_id", query).await?;
        Ok(found.pop())
    }

    /// Insert `auction` together with its bids.
    ///
    /// The owner and every bidder must already be persisted; this is checked
    /// before any row is written. The inserts run under a savepoint, so a
    /// failed bid leaves no auction row behind.
    #[instrument(skip(self, auction), fields(name = %auction.name(), bid_count = auction.bids().len()), err)]
    pub async fn save(&mut self, auction: &mut Auction) -> Result<AuctionId, RepositoryError> {
        if let Some(id) = auction.id() {
            return Err(RepositoryError::AlreadyPersisted {
                kind: Auction::KIND,
                id: id.as_i64(),
            });
        }
        let owner_id = require_id(auction.owner(), "auction owner")?;
        ensure_bidders_persisted(auction.bids())?;

        let mut tx = self
            .session
            .connection()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_savepoint", e))?;

        let written = insert_auction(&mut *tx, auction, owner_id).await;
        let (id, bid_ids) = release_or_rollback(tx, written).await?;

        auction.assign_id(id);
        auction.assign_bid_ids(&bid_ids);
        Ok(id)
    }

    /// Overwrite a persisted auction and replace its bid history.
    ///
    /// A stored auction that is already closed cannot be reopened: a copy
    /// that still reads as open is rejected with an invariant violation.
    /// On any failure the stored row and its bids are left as they were.
    #[instrument(skip(self, auction), fields(auction_id = ?auction.id()), err)]
    pub async fn update(&mut self, auction: &mut Auction) -> Result<(), RepositoryError> {
        let id = require_id(&*auction, Auction::KIND)?;
        let owner_id = require_id(auction.owner(), "auction owner")?;
        ensure_bidders_persisted(auction.bids())?;

        let mut tx = self
            .session
            .connection()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_savepoint", e))?;

        let written = rewrite_auction(&mut *tx, id, auction, owner_id).await;
        let bid_ids = release_or_rollback(tx, written).await?;

        auction.assign_bid_ids(&bid_ids);
        Ok(())
    }

    /// Remove a persisted auction and its bids.
    #[instrument(skip(self, auction), fields(auction_id = ?auction.id()), err)]
    pub async fn delete(&mut self, auction: &Auction) -> Result<(), RepositoryError> {
        let id = require_id(auction, Auction::KIND)?;

        let mut tx = self
            .session
            .connection()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_savepoint", e))?;

        let removed = remove_auction(&mut *tx, id).await;
        release_or_rollback(tx, removed).await
    }

    /// Run an auction query, then attach each auction's bid history.
    async fn fetch_hydrated(
        &mut self,
        operation: &'static str,
        mut query: QueryBuilder<'_, Sqlite>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        let conn = self.session.connection();

        let rows = query
            .build()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let auction_rows = rows
            .iter()
            .map(AuctionRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_auction", e))?;

        let ids: Vec<i64> = auction_rows.iter().map(|row| row.id).collect();
        let mut bids = load_bids(conn, &ids).await?;

        let auctions: Vec<Auction> = auction_rows
            .into_iter()
            .map(|row| {
                let history = bids.remove(&row.id).unwrap_or_default();
                row.into_auction(history)
            })
            .collect();

        Span::current().record("result_count", auctions.len());
        Ok(auctions)
    }
}

fn select_auctions() -> QueryBuilder<'static, Sqlite> {
    QueryBuilder::new(format!(
        "SELECT {AUCTION_COLUMNS} FROM auctions a JOIN users o ON o.id = a.owner_id"
    ))
}

fn ensure_bidders_persisted(bids: &[Bid]) -> Result<(), RepositoryError> {
    for bid in bids {
        require_id(bid.bidder(), "bidder")?;
    }
    Ok(())
}

/// Release the savepoint when `outcome` succeeded, roll it back otherwise.
async fn release_or_rollback<T>(
    tx: Transaction<'_, Sqlite>,
    outcome: Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("release_savepoint", e))?;
            Ok(value)
        }
        Err(err) => {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback_savepoint", e))?;
            Err(err)
        }
    }
}

async fn insert_auction(
    conn: &mut SqliteConnection,
    auction: &Auction,
    owner_id: UserId,
) -> Result<(AuctionId, Vec<BidId>), RepositoryError> {
    let result = sqlx::query(
        r#"
        INSERT INTO auctions (name, initial_value, opened_at, closed, used, owner_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auction.name())
    .bind(auction.initial_value())
    .bind(auction.opened_at())
    .bind(auction.is_closed())
    .bind(auction.is_used())
    .bind(owner_id.as_i64())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("save_auction", e))?;

    let id = AuctionId::from_i64(result.last_insert_rowid());
    let bid_ids = insert_bids(conn, id, auction.bids()).await?;
    Ok((id, bid_ids))
}

async fn rewrite_auction(
    conn: &mut SqliteConnection,
    id: AuctionId,
    auction: &Auction,
    owner_id: UserId,
) -> Result<Vec<BidId>, RepositoryError> {
    let stored_closed: Option<bool> = sqlx::query_scalar("SELECT closed FROM auctions WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_auction_state", e))?;

    match stored_closed {
        None => {
            return Err(RepositoryError::NotFound {
                kind: Auction::KIND,
                id: id.as_i64(),
            });
        }
        Some(true) if !auction.is_closed() => {
            return Err(DomainError::invariant(format!(
                "auction {id} is closed and cannot be reopened"
            ))
            .into());
        }
        Some(_) => {}
    }

    sqlx::query(
        r#"
        UPDATE auctions
        SET name = ?, initial_value = ?, opened_at = ?, closed = ?, used = ?, owner_id = ?
        WHERE id = ?
        "#,
    )
    .bind(auction.name())
    .bind(auction.initial_value())
    .bind(auction.opened_at())
    .bind(auction.is_closed())
    .bind(auction.is_used())
    .bind(owner_id.as_i64())
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("update_auction", e))?;

    sqlx::query("DELETE FROM bids WHERE auction_id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("replace_bids", e))?;

    insert_bids(conn, id, auction.bids()).await
}

async fn remove_auction(conn: &mut SqliteConnection, id: AuctionId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM bids WHERE auction_id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_bids", e))?;

    let result = sqlx::query("DELETE FROM auctions WHERE id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_auction", e))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound {
            kind: Auction::KIND,
            id: id.as_i64(),
        });
    }
    Ok(())
}

/// Insert `bids` for `auction_id`, keeping their order in `position`.
async fn insert_bids(
    conn: &mut SqliteConnection,
    auction_id: AuctionId,
    bids: &[Bid],
) -> Result<Vec<BidId>, RepositoryError> {
    let mut ids = Vec::with_capacity(bids.len());

    for (position, bid) in bids.iter().enumerate() {
        let bidder_id = require_id(bid.bidder(), "bidder")?;

        let result = sqlx::query(
            r#"
            INSERT INTO bids (auction_id, bidder_id, value, placed_at, position)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(auction_id.as_i64())
        .bind(bidder_id.as_i64())
        .bind(bid.value())
        .bind(bid.placed_at())
        .bind(position as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_bid", e))?;

        ids.push(BidId::from_i64(result.last_insert_rowid()));
    }

    Ok(ids)
}

/// Bid histories keyed by auction id, each in submission order.
async fn load_bids(
    conn: &mut SqliteConnection,
    auction_ids: &[i64],
) -> Result<HashMap<i64, Vec<Bid>>, RepositoryError> {
    let mut by_auction: HashMap<i64, Vec<Bid>> = HashMap::new();
    if auction_ids.is_empty() {
        return Ok(by_auction);
    }

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT {BID_COLUMNS} FROM bids b JOIN users u ON u.id = b.bidder_id WHERE b.auction_id IN ("
    ));
    let mut ids = query.separated(", ");
    for id in auction_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY b.auction_id ASC, b.position ASC");

    let rows = query
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_bids", e))?;

    for row in &rows {
        let bid = BidRow::from_row(row).map_err(|e| map_sqlx_error("decode_bid", e))?;
        by_auction.entry(bid.auction_id).or_default().push(bid.into());
    }

    Ok(by_auction)
}
