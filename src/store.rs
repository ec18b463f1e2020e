//! Persistence: alias store, catalogs and purchase records over SQLite.
//!
//! The traits are the collaborator seams the resolver and the learning loop
//! talk to; `SqliteStore` implements all of them on one connection with the
//! schema created on open.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::matcher::normalize_name;
use crate::model::{CatalogItem, ItemAlias, MatchedItem, ParsedReceipt};

/// Alias persistence seam.
pub trait AliasStore {
    /// Exact lookup by (owner, normalized alias name).
    fn find_alias_exact(&self, owner_id: &str, alias_name: &str) -> Result<Option<ItemAlias>>;
    /// Idempotent upsert keyed on (owner, normalized alias name). A conflict
    /// updates the row in place; re-saving the same mapping never creates a
    /// duplicate.
    fn upsert_alias(
        &self,
        owner_id: &str,
        alias_name: &str,
        canonical_name: &str,
        store_name: Option<&str>,
        confirmed: bool,
    ) -> Result<()>;
    fn list_aliases(&self, owner_id: &str) -> Result<Vec<ItemAlias>>;
    fn delete_alias(&self, alias_id: i64) -> Result<()>;
}

/// Catalog read seam for fuzzy-match candidates.
pub trait Catalog {
    /// The owner's personal catalog: historical item names deduplicated,
    /// preferring the variant that has an image.
    fn personal_items(&self, owner_id: &str) -> Result<Vec<CatalogItem>>;
    /// A capped sample of the shared global catalog.
    fn global_catalog_sample(&self, limit: u32) -> Result<Vec<CatalogItem>>;
}

/// Purchase-record seam for the learning loop.
pub trait PurchaseStore {
    fn record_purchase(
        &self,
        owner_id: &str,
        receipt_uid: &str,
        store_name: Option<&str>,
        purchase_date: Option<&str>,
        item: &MatchedItem,
    ) -> Result<i64>;
}

/// Deterministic UID for a parsed receipt, so re-saving the same receipt is
/// detectable downstream.
pub fn receipt_uid(owner_id: &str, receipt: &ParsedReceipt) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(receipt.store_name.as_deref().unwrap_or("").as_bytes());
    hasher.update(receipt.purchase_date.as_deref().unwrap_or("").as_bytes());
    for item in &receipt.items {
        hasher.update(item.name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::init(Connection::open(db_path)?)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS item_aliases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                canonical_name TEXT NOT NULL,
                alias_name TEXT NOT NULL,
                alias_norm TEXT NOT NULL,
                store_name TEXT,
                confirmed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, alias_norm)
            );

            CREATE TABLE IF NOT EXISTS list_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                image_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS global_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                image_url TEXT
            );

            CREATE TABLE IF NOT EXISTS purchases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                receipt_uid TEXT NOT NULL,
                store_name TEXT,
                purchase_date TEXT,
                item_name TEXT NOT NULL,
                canonical_name TEXT,
                quantity REAL NOT NULL,
                unit_price REAL,
                total_price REAL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_aliases_owner ON item_aliases(owner_id);
            CREATE INDEX IF NOT EXISTS idx_list_items_owner ON list_items(owner_id);
            CREATE INDEX IF NOT EXISTS idx_purchases_owner ON purchases(owner_id);
            CREATE INDEX IF NOT EXISTS idx_purchases_uid ON purchases(receipt_uid);",
        )?;
        info!("Store initialized");
        Ok(Self { conn })
    }

    /// Seed a personal-catalog entry (catalog CRUD itself lives elsewhere).
    pub fn add_list_item(
        &self,
        owner_id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO list_items (owner_id, name, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, name, image_url, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Seed a global-catalog entry.
    pub fn add_global_item(&self, name: &str, image_url: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO global_items (name, image_url) VALUES (?1, ?2)",
            params![name, image_url],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Row counts: (aliases, personal items, purchases).
    pub fn counts(&self) -> Result<(usize, usize, usize)> {
        let aliases: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM item_aliases", [], |row| row.get(0))?;
        let items: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM list_items", [], |row| row.get(0))?;
        let purchases: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM purchases", [], |row| row.get(0))?;
        Ok((aliases, items, purchases))
    }

    fn row_to_alias(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemAlias> {
        Ok(ItemAlias {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            canonical_name: row.get(2)?,
            alias_name: row.get(3)?,
            store_name: row.get(4)?,
            confirmed: row.get(5)?,
        })
    }
}

impl AliasStore for SqliteStore {
    fn find_alias_exact(&self, owner_id: &str, alias_name: &str) -> Result<Option<ItemAlias>> {
        let alias = self
            .conn
            .prepare(
                "SELECT id, owner_id, canonical_name, alias_name, store_name, confirmed
                 FROM item_aliases
                 WHERE owner_id = ?1 AND alias_norm = ?2",
            )?
            .query_row(
                params![owner_id, normalize_name(alias_name)],
                Self::row_to_alias,
            )
            .optional()?;
        Ok(alias)
    }

    fn upsert_alias(
        &self,
        owner_id: &str,
        alias_name: &str,
        canonical_name: &str,
        store_name: Option<&str>,
        confirmed: bool,
    ) -> Result<()> {
        // The conflict-then-update path converges to exactly one row even
        // under concurrent saves of the same (owner, alias) key. A confirmed
        // alias is never downgraded by a later unconfirmed save.
        self.conn.execute(
            "INSERT INTO item_aliases
                (owner_id, canonical_name, alias_name, alias_norm, store_name, confirmed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner_id, alias_norm) DO UPDATE SET
                canonical_name = excluded.canonical_name,
                alias_name = excluded.alias_name,
                store_name = COALESCE(excluded.store_name, item_aliases.store_name),
                confirmed = MAX(item_aliases.confirmed, excluded.confirmed)",
            params![
                owner_id,
                canonical_name,
                alias_name,
                normalize_name(alias_name),
                store_name,
                confirmed,
                Utc::now().to_rfc3339(),
            ],
        )?;
        info!(owner = owner_id, alias = alias_name, canonical = canonical_name, "Alias upserted");
        Ok(())
    }

    fn list_aliases(&self, owner_id: &str) -> Result<Vec<ItemAlias>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, canonical_name, alias_name, store_name, confirmed
             FROM item_aliases
             WHERE owner_id = ?1
             ORDER BY alias_name",
        )?;
        let aliases = stmt
            .query_map(params![owner_id], Self::row_to_alias)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(aliases)
    }

    fn delete_alias(&self, alias_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM item_aliases WHERE id = ?1", params![alias_id])?;
        Ok(())
    }
}

impl Catalog for SqliteStore {
    fn personal_items(&self, owner_id: &str) -> Result<Vec<CatalogItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, image_url FROM list_items WHERE owner_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok(CatalogItem {
                    name: row.get(0)?,
                    image_url: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Derived catalog: one entry per normalized name, preferring the
        // variant that has an image.
        let mut deduped: Vec<CatalogItem> = Vec::new();
        let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for row in rows {
            let key = normalize_name(&row.name);
            match index.get(&key) {
                Some(&i) => {
                    if deduped[i].image_url.is_none() && row.image_url.is_some() {
                        deduped[i] = row;
                    }
                }
                None => {
                    index.insert(key, deduped.len());
                    deduped.push(row);
                }
            }
        }
        Ok(deduped)
    }

    fn global_catalog_sample(&self, limit: u32) -> Result<Vec<CatalogItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, image_url FROM global_items LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(CatalogItem {
                    name: row.get(0)?,
                    image_url: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl PurchaseStore for SqliteStore {
    fn record_purchase(
        &self,
        owner_id: &str,
        receipt_uid: &str,
        store_name: Option<&str>,
        purchase_date: Option<&str>,
        item: &MatchedItem,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO purchases
                (owner_id, receipt_uid, store_name, purchase_date, item_name,
                 canonical_name, quantity, unit_price, total_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                owner_id,
                receipt_uid,
                store_name,
                purchase_date,
                item.original_name,
                item.matched_canonical_name,
                item.quantity,
                item.unit_price,
                item.total_price,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParsedItem;

    #[test]
    fn alias_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_alias("u1", "קוטג'", "גבינת קוטג'", None, true)
            .unwrap();
        store
            .upsert_alias("u1", "קוטג'", "גבינת קוטג'", None, true)
            .unwrap();

        let aliases = store.list_aliases("u1").unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].canonical_name, "גבינת קוטג'");
        assert!(aliases[0].confirmed);
    }

    #[test]
    fn alias_lookup_is_case_and_whitespace_insensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_alias("u1", "Milk  1L", "חלב", None, false)
            .unwrap();

        let hit = store.find_alias_exact("u1", "milk 1l").unwrap();
        assert_eq!(hit.unwrap().canonical_name, "חלב");
        // Different owner sees nothing.
        assert!(store.find_alias_exact("u2", "milk 1l").unwrap().is_none());
    }

    #[test]
    fn upsert_never_downgrades_confirmed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_alias("u1", "קוטג'", "גבינת קוטג'", None, true)
            .unwrap();
        store
            .upsert_alias("u1", "קוטג'", "גבינת קוטג'", None, false)
            .unwrap();

        let hit = store.find_alias_exact("u1", "קוטג'").unwrap().unwrap();
        assert!(hit.confirmed);
    }

    #[test]
    fn upsert_keeps_existing_store_name_when_hint_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_alias("u1", "חלב", "חלב תנובה", Some("שופרסל"), false)
            .unwrap();
        store.upsert_alias("u1", "חלב", "חלב תנובה", None, false).unwrap();

        let hit = store.find_alias_exact("u1", "חלב").unwrap().unwrap();
        assert_eq!(hit.store_name.as_deref(), Some("שופרסל"));
    }

    #[test]
    fn personal_catalog_dedups_preferring_image() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_list_item("u1", "במבה", None).unwrap();
        store
            .add_list_item("u1", "במבה", Some("https://img/bamba.png"))
            .unwrap();
        store.add_list_item("u1", "חלב", None).unwrap();

        let items = store.personal_items("u1").unwrap();
        assert_eq!(items.len(), 2);
        let bamba = items.iter().find(|i| i.name == "במבה").unwrap();
        assert!(bamba.image_url.is_some());
    }

    #[test]
    fn global_sample_honors_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..10 {
            store.add_global_item(&format!("item {i}"), None).unwrap();
        }
        assert_eq!(store.global_catalog_sample(3).unwrap().len(), 3);
    }

    #[test]
    fn delete_alias_removes_the_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_alias("u1", "חלב", "חלב תנובה", None, false).unwrap();
        let id = store.list_aliases("u1").unwrap()[0].id;
        store.delete_alias(id).unwrap();
        assert!(store.list_aliases("u1").unwrap().is_empty());
    }

    #[test]
    fn receipt_uid_is_deterministic() {
        let receipt = ParsedReceipt {
            store_name: Some("שופרסל".to_string()),
            purchase_date: Some("2026-03-01".to_string()),
            items: vec![ParsedItem::new("חלב")],
            total_amount: Some(6.9),
        };
        assert_eq!(receipt_uid("u1", &receipt), receipt_uid("u1", &receipt));
        assert_ne!(receipt_uid("u1", &receipt), receipt_uid("u2", &receipt));
    }
}
