//! HTTP JSON clients for the upstream systems of record.
//!
//! | Client | Request | Response |
//! |--------|---------|----------|
//! | [`OfferClient`] | `POST /offers/search` with an [`OfferSearch`] | `[RawOffer]` |
//! | [`OfferClient`] | `POST /offers/by-codes` `{"offer_codes":[..]}` | `[RawOffer]` |
//! | [`CatalogWriteClient`] | `POST /items/by-codes` `{"item_codes":[..]}` | `[CatalogItem]` |
//! | [`StockClient`] | `POST /stock-units/list` `{"limit":n,"offer_codes":[..]}` | `[StockUnit]` |

use std::time::Duration;

use offer_core::upstream::{
  CatalogItem, CatalogWriteSource, OfferSearch, OfferSource, RawOffer, StockSource, StockUnit,
};
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::settings::UpstreamConfig;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request to {url} failed: {source}")]
  Http {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} → {status}")]
  Status { url: String, status: StatusCode },
}

/// A base URL plus a shared connection pool.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
struct JsonClient {
  client:   Client,
  base_url: String,
}

impl JsonClient {
  fn new(client: Client, base_url: &str) -> Self {
    Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
  }

  async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = format!("{}{path}", self.base_url);
    let resp = self
      .client
      .post(&url)
      .json(body)
      .send()
      .await
      .map_err(|source| ClientError::Http { url: url.clone(), source })?;

    if !resp.status().is_success() {
      return Err(ClientError::Status { url, status: resp.status() });
    }
    resp.json().await.map_err(|source| ClientError::Http { url, source })
  }
}

/// Build the three upstream clients over one connection pool.
pub fn connect(
  cfg: &UpstreamConfig,
) -> anyhow::Result<(OfferClient, CatalogWriteClient, StockClient)> {
  use anyhow::Context as _;

  let client = Client::builder()
    .timeout(Duration::from_secs(cfg.timeout_secs))
    .build()
    .context("failed to build HTTP client")?;

  Ok((
    OfferClient(JsonClient::new(client.clone(), &cfg.offer_url)),
    CatalogWriteClient(JsonClient::new(client.clone(), &cfg.catalog_write_url)),
    StockClient(JsonClient::new(client, &cfg.stock_url)),
  ))
}

// ─── Offers ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct OfferClient(JsonClient);

#[derive(Serialize)]
struct OfferCodes<'a> {
  offer_codes: &'a [String],
}

impl OfferSource for OfferClient {
  type Error = ClientError;

  async fn search_offers(&self, search: &OfferSearch) -> Result<Vec<RawOffer>, ClientError> {
    self.0.post("/offers/search", search).await
  }

  async fn offers_by_codes(&self, offer_codes: &[String]) -> Result<Vec<RawOffer>, ClientError> {
    self.0.post("/offers/by-codes", &OfferCodes { offer_codes }).await
  }
}

// ─── Catalog (write view) ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CatalogWriteClient(JsonClient);

#[derive(Serialize)]
struct ItemCodes<'a> {
  item_codes: &'a [String],
}

impl CatalogWriteSource for CatalogWriteClient {
  type Error = ClientError;

  async fn items_by_codes(&self, item_codes: &[String]) -> Result<Vec<CatalogItem>, ClientError> {
    self.0.post("/items/by-codes", &ItemCodes { item_codes }).await
  }
}

// ─── Stock ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct StockClient(JsonClient);

#[derive(Serialize)]
struct ListUnits<'a> {
  limit:       u32,
  offer_codes: &'a [String],
}

impl StockSource for StockClient {
  type Error = ClientError;

  async fn list_stock_units(
    &self,
    limit: u32,
    offer_codes: &[String],
  ) -> Result<Vec<StockUnit>, ClientError> {
    self.0.post("/stock-units/list", &ListUnits { limit, offer_codes }).await
  }
}
