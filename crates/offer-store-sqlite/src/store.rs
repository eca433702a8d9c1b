//! [`SqliteOfferRepository`], the SQLite implementation of
//! [`OfferRepository`].

use std::path::Path;

use offer_core::{
  offer::Offer,
  query::{ListRequest, ListResponse, QueryTranslator as _},
  repository::OfferRepository,
};
use tracing::debug;

use crate::{
  Result,
  encode::{OFFER_COLUMNS, OfferRow},
  schema::SCHEMA,
  translate::SqlTranslator,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An offer projection backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteOfferRepository {
  conn:       tokio_rusqlite::Connection,
  translator: SqlTranslator,
}

impl SqliteOfferRepository {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, translator: SqlTranslator })
  }
}

// ─── OfferRepository impl ────────────────────────────────────────────────────

impl OfferRepository for SqliteOfferRepository {
  type Error = crate::Error;

  async fn upsert(&self, offers: &[Offer]) -> Result<()> {
    if offers.is_empty() {
      return Ok(());
    }
    let rows: Vec<OfferRow> = offers.iter().map(OfferRow::from_offer).collect();
    let count = rows.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO offers (
               code, id, seller_id, status,
               new_at, sales_at, in_order_at, sold_at, returned_to_seller_at,
               indexed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(code) DO UPDATE SET
               id                    = excluded.id,
               seller_id             = excluded.seller_id,
               status                = excluded.status,
               new_at                = excluded.new_at,
               sales_at              = excluded.sales_at,
               in_order_at           = excluded.in_order_at,
               sold_at               = excluded.sold_at,
               returned_to_seller_at = excluded.returned_to_seller_at,
               indexed_at            = excluded.indexed_at",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.code,
              row.id,
              row.seller_id,
              row.status,
              row.new_at,
              row.sales_at,
              row.in_order_at,
              row.sold_at,
              row.returned_to_seller_at,
              row.indexed_at,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(count, "upserted offers");
    Ok(())
  }

  async fn list(&self, request: &ListRequest) -> Result<ListResponse<Offer>> {
    // The translator only speaks in first pages: compute the offset here,
    // hand it page 1, and apply the offset directly in SQL.
    let mut first_page = request.clone();
    let offset = first_page.pagination.map(|p| p.offset()).unwrap_or(0);
    if let Some(p) = first_page.pagination.as_mut() {
      p.page = 1;
    }
    let query = self.translator.translate(&first_page)?;

    let (total, rows): (i64, Vec<OfferRow>) = self
      .conn
      .call(move |conn| {
        let count_sql = format!("SELECT COUNT(*) FROM offers {}", query.where_clause);
        let total: i64 = conn.query_row(
          &count_sql,
          rusqlite::params_from_iter(query.params.iter()),
          |r| r.get(0),
        )?;

        let select_sql = format!(
          "SELECT {OFFER_COLUMNS} FROM offers {} {} LIMIT {} OFFSET {offset}",
          query.where_clause,
          query.order_by,
          query.limit.unwrap_or(-1),
        );
        let mut stmt = conn.prepare(&select_sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(query.params.iter()),
            OfferRow::from_sql,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    let data = rows
      .into_iter()
      .map(OfferRow::into_offer)
      .collect::<Result<Vec<_>>>()?;

    Ok(ListResponse { total: u64::try_from(total).unwrap_or(0), data })
  }
}
