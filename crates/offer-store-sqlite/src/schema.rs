//! SQL schema for the offer projection store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per offer, addressed by its natural key.
-- Timestamps are fixed-width RFC 3339 UTC strings so they sort as text.
CREATE TABLE IF NOT EXISTS offers (
    code                  TEXT PRIMARY KEY,
    id                    INTEGER NOT NULL,
    seller_id             INTEGER NOT NULL,
    status                TEXT NOT NULL,   -- 'new' | 'sales' | 'in_order' | 'sold' | 'returned_to_seller'
    new_at                TEXT,
    sales_at              TEXT,
    in_order_at           TEXT,
    sold_at               TEXT,
    returned_to_seller_at TEXT,
    indexed_at            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS offers_id_idx     ON offers(id);
CREATE INDEX IF NOT EXISTS offers_status_idx ON offers(status);
CREATE INDEX IF NOT EXISTS offers_seller_idx ON offers(seller_id);

PRAGMA user_version = 1;
";
