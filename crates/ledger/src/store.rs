use merkle::{Hash32, MerkleTree};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::schema::{key_hash, row_hash, LedgerRow, LedgerRowRecord, LedgerTrees, RootRecord};
use crate::tree_store::TreeKind;
use crate::{LedgerError, Result};

/// System of record for address/key registrations.
///
/// Rows are append-only; each insert is a single statement, so concurrent
/// callers never observe a half-written row.
#[derive(Clone)]
pub struct HashLedger {
    pool: SqlitePool,
}

impl HashLedger {
    /// Wrap a pool whose schema has already been migrated
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Hash and append one row. Duplicates are accepted and become duplicate leaves.
    pub async fn insert(&self, address: &str, key: &str) -> Result<LedgerRow> {
        let key_hash = key_hash(key);
        let row_hash = row_hash(address, key);

        let result = sqlx::query(
            r#"INSERT INTO addresses_keys (address, key, key_hash, row_hash) VALUES (?, ?, ?, ?)"#,
        )
        .bind(address)
        .bind(key)
        .bind(&key_hash[..])
        .bind(&row_hash[..])
        .execute(&self.pool)
        .await?;

        let row = LedgerRow {
            id: result.last_insert_rowid(),
            address: address.to_string(),
            key: key.to_string(),
            key_hash,
            row_hash,
        };
        debug!(id = row.id, row_hash = %hex::encode(row.row_hash), "ledger: row inserted");
        Ok(row)
    }

    /// Every row in insertion order
    pub async fn snapshot(&self) -> Result<Vec<LedgerRow>> {
        let records: Vec<LedgerRowRecord> = sqlx::query_as(
            r#"SELECT id, address, key, key_hash, row_hash FROM addresses_keys ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(LedgerRow::try_from).collect()
    }

    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM addresses_keys"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Build both trees from one snapshot.
    ///
    /// The result is the root as of that snapshot; rows inserted concurrently
    /// may already be missing from it.
    pub async fn calculate_roots(&self) -> Result<LedgerTrees> {
        let rows = self.snapshot().await?;
        let trees = LedgerTrees::from_rows(&rows);
        debug!(
            leaves = trees.roots.leaf_count,
            row_root = %hex::encode(trees.roots.row_root),
            "ledger: roots calculated"
        );
        Ok(trees)
    }

    /// Recompute the row root and require it to equal `expected`
    pub async fn check_full_tree(&self, expected: &Hash32) -> Result<RootRecord> {
        let trees = self.calculate_roots().await?;
        let actual = trees.roots.row_root;
        if actual != *expected {
            warn!(
                expected = %hex::encode(expected),
                actual = %hex::encode(actual),
                "ledger: row root mismatch"
            );
            return Err(LedgerError::IntegrityMismatch { expected: *expected, actual });
        }
        Ok(trees.roots)
    }

    /// Require `tree` to commit to exactly the current ledger column of `kind`
    pub async fn verify_tree(&self, kind: TreeKind, tree: &MerkleTree) -> Result<()> {
        let trees = self.calculate_roots().await?;
        let expected = match kind {
            TreeKind::Key => trees.roots.key_root,
            TreeKind::Row => trees.roots.row_root,
        };
        let actual = tree.root();
        if actual != expected {
            return Err(LedgerError::IntegrityMismatch { expected, actual });
        }
        Ok(())
    }
}
