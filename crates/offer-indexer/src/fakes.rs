//! In-memory upstreams and repository for tests, with failure injection.

use std::{
  collections::BTreeMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Utc};
use offer_core::{
  offer::Offer,
  query::{FilterOp, ListRequest, ListResponse},
  repository::OfferRepository,
  upstream::{
    CatalogItem, CatalogWriteSource, OfferSearch, OfferSource, RawOffer, StockSource,
    StockUnit,
  },
};
use thiserror::Error;
use tokio::sync::{Notify, OwnedMutexGuard};

#[derive(Debug, Error)]
#[error("injected failure in {0}")]
pub struct FakeError(&'static str);

/// Fails the next `n` calls.
#[derive(Default)]
struct Faults(AtomicU32);

impl Faults {
  fn arm(&self, n: u32) { self.0.store(n, Ordering::SeqCst); }

  fn check(&self, what: &'static str) -> Result<(), FakeError> {
    let armed = self
      .0
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if armed { Err(FakeError(what)) } else { Ok(()) }
  }
}

pub fn raw_offer(id: i64, offer_code: &str, item_code: &str) -> RawOffer {
  RawOffer {
    id,
    offer_code: offer_code.into(),
    item_code: item_code.into(),
    seller_id: 100 + id % 3,
    price: None,
  }
}

pub fn catalog_item(code: &str, created_at: DateTime<Utc>, flags: &[&str]) -> CatalogItem {
  CatalogItem {
    code: code.into(),
    is_draft: false,
    publication_flags: flags.iter().map(|f| (*f).to_owned()).collect(),
    created_at,
  }
}

/// A catalog knowing the item of every offer in `offers`.
pub fn catalog_for(offers: &[RawOffer], created_at: DateTime<Utc>) -> FakeCatalog {
  FakeCatalog::with(
    offers.iter().map(|o| catalog_item(&o.item_code, created_at, &[])).collect(),
  )
}

// ─── Offers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct OffersInner {
  offers:   Mutex<Vec<RawOffer>>,
  searches: Mutex<Vec<(u32, u32)>>,
  by_code:  AtomicUsize,
  faults:   Faults,
  gate:     Arc<tokio::sync::Mutex<()>>,
  entered:  Notify,
}

#[derive(Clone, Default)]
pub struct FakeOffers(Arc<OffersInner>);

impl FakeOffers {
  pub fn with(offers: Vec<RawOffer>) -> Self {
    let fake = Self::default();
    *fake.0.offers.lock().unwrap() = offers;
    fake
  }

  /// Offers `O1..=On`, each on its own item `I1..=In`.
  pub fn population(n: i64) -> Self {
    Self::with(
      (1..=n).map(|id| raw_offer(id, &format!("O{id}"), &format!("I{id}"))).collect(),
    )
  }

  pub fn all(&self) -> Vec<RawOffer> { self.0.offers.lock().unwrap().clone() }

  /// `(limit, offset)` of every page requested so far.
  pub fn searches(&self) -> Vec<(u32, u32)> { self.0.searches.lock().unwrap().clone() }

  pub fn by_code_calls(&self) -> usize { self.0.by_code.load(Ordering::SeqCst) }

  pub fn fail_next(&self, n: u32) { self.0.faults.arm(n); }

  /// Block page fetches until the returned guard is dropped.
  pub async fn hold(&self) -> OwnedMutexGuard<()> { self.0.gate.clone().lock_owned().await }

  /// Resolves once a page fetch has started.
  pub async fn entered(&self) { self.0.entered.notified().await }
}

impl OfferSource for FakeOffers {
  type Error = FakeError;

  async fn search_offers(&self, search: &OfferSearch) -> Result<Vec<RawOffer>, FakeError> {
    self.0.entered.notify_one();
    drop(self.0.gate.lock().await);

    self.0.searches.lock().unwrap().push((search.limit, search.offset));
    self.0.faults.check("search_offers")?;

    let mut offers = self.all();
    offers.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(
      offers
        .into_iter()
        .skip(search.offset as usize)
        .take(search.limit as usize)
        .collect(),
    )
  }

  async fn offers_by_codes(&self, offer_codes: &[String]) -> Result<Vec<RawOffer>, FakeError> {
    self.0.by_code.fetch_add(1, Ordering::SeqCst);
    self.0.faults.check("offers_by_codes")?;
    Ok(self.all().into_iter().filter(|o| offer_codes.contains(&o.offer_code)).collect())
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeCatalog {
  items:  Arc<Mutex<Vec<CatalogItem>>>,
  faults: Arc<Faults>,
}

impl FakeCatalog {
  pub fn with(items: Vec<CatalogItem>) -> Self {
    Self { items: Arc::new(Mutex::new(items)), ..Default::default() }
  }

  pub fn fail_next(&self, n: u32) { self.faults.arm(n); }
}

impl CatalogWriteSource for FakeCatalog {
  type Error = FakeError;

  async fn items_by_codes(&self, item_codes: &[String]) -> Result<Vec<CatalogItem>, FakeError> {
    self.faults.check("items_by_codes")?;
    let items = self.items.lock().unwrap();
    Ok(items.iter().filter(|i| item_codes.contains(&i.code)).cloned().collect())
  }
}

// ─── Stock ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StockInner {
  units:    Mutex<Vec<StockUnit>>,
  requests: Mutex<Vec<(u32, Vec<String>)>>,
  faults:   Faults,
  hung:     AtomicBool,
}

#[derive(Clone, Default)]
pub struct FakeStock(Arc<StockInner>);

impl FakeStock {
  pub fn with(units: Vec<StockUnit>) -> Self {
    let fake = Self::default();
    fake.replace(units);
    fake
  }

  pub fn replace(&self, units: Vec<StockUnit>) { *self.0.units.lock().unwrap() = units; }

  pub fn calls(&self) -> usize { self.0.requests.lock().unwrap().len() }

  pub fn last_request(&self) -> Option<(u32, Vec<String>)> {
    self.0.requests.lock().unwrap().last().cloned()
  }

  pub fn fail_next(&self, n: u32) { self.0.faults.arm(n); }

  /// Every later call is recorded and then never answers.
  pub fn hang(&self) { self.0.hung.store(true, Ordering::SeqCst); }
}

impl StockSource for FakeStock {
  type Error = FakeError;

  async fn list_stock_units(
    &self,
    limit: u32,
    offer_codes: &[String],
  ) -> Result<Vec<StockUnit>, FakeError> {
    self.0.requests.lock().unwrap().push((limit, offer_codes.to_vec()));
    if self.0.hung.load(Ordering::SeqCst) {
      std::future::pending::<()>().await;
    }
    self.0.faults.check("list_stock_units")?;
    let units = self.0.units.lock().unwrap();
    Ok(
      units
        .iter()
        .filter(|u| offer_codes.contains(&u.offer_code))
        .take(limit as usize)
        .cloned()
        .collect(),
    )
  }
}

// ─── Repository ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct RepoInner {
  rows:    Mutex<BTreeMap<String, Offer>>,
  upserts: AtomicUsize,
  faults:  Faults,
  reads:   Faults,
}

/// Keyed by offer code. `list` understands a `code` filter and pagination,
/// and orders by id descending.
#[derive(Clone, Default)]
pub struct FakeRepo(Arc<RepoInner>);

impl FakeRepo {
  pub fn len(&self) -> usize { self.0.rows.lock().unwrap().len() }

  pub fn get(&self, code: &str) -> Option<Offer> { self.0.rows.lock().unwrap().get(code).cloned() }

  /// Number of successful upserts.
  pub fn upserts(&self) -> usize { self.0.upserts.load(Ordering::SeqCst) }

  pub fn fail_upserts(&self, n: u32) { self.0.faults.arm(n); }

  pub fn fail_lists(&self, n: u32) { self.0.reads.arm(n); }
}

impl OfferRepository for FakeRepo {
  type Error = FakeError;

  async fn upsert(&self, offers: &[Offer]) -> Result<(), FakeError> {
    self.0.faults.check("upsert")?;
    let mut rows = self.0.rows.lock().unwrap();
    for offer in offers {
      rows.insert(offer.code.clone(), offer.clone());
    }
    self.0.upserts.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn list(&self, request: &ListRequest) -> Result<ListResponse<Offer>, FakeError> {
    self.0.reads.check("list")?;
    let rows = self.0.rows.lock().unwrap();
    let mut matched: Vec<Offer> = rows
      .values()
      .filter(|o| {
        request.filters.iter().all(|f| match (&f.op, f.field.as_str()) {
          (FilterOp::TextIn { values }, "code") => values.contains(&o.code),
          _ => true,
        })
      })
      .cloned()
      .collect();
    matched.sort_by(|a, b| b.id.cmp(&a.id));

    let total = matched.len() as u64;
    let data = match request.pagination {
      Some(p) => matched
        .into_iter()
        .skip(p.offset() as usize)
        .take(p.per_page as usize)
        .collect(),
      None => matched,
    };
    Ok(ListResponse { total, data })
  }
}
