use std::fmt;

use chrono::Utc;
use merkle::{Hash32, MerkleTree};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::{to_digest, LedgerError, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Key,
    Row,
}

impl TreeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TreeKind::Key => "key",
            TreeKind::Row => "row",
        }
    }
}

/// Structured name of a persisted tree.
///
/// The SQL identifier is derived only from the enum and the integer version,
/// so caller input never reaches a schema statement.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TreeTable {
    pub kind: TreeKind,
    pub version: u32,
}

impl TreeTable {
    pub fn new(kind: TreeKind, version: u32) -> Self {
        Self { kind, version }
    }

    pub fn identifier(&self) -> String {
        format!("tree_{}_v{}", self.kind.as_str(), self.version)
    }
}

impl fmt::Display for TreeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Durable overflow store for tree leaves.
///
/// Once a root is committed the in-memory tree can be dropped and rebuilt
/// from here.
#[derive(Clone)]
pub struct TreeStore {
    pool: SqlitePool,
}

impl TreeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the contents of `table` with the leaves of `tree` and record its root
    pub async fn store(&self, tree: &MerkleTree, table: TreeTable) -> Result<()> {
        self.store_all(&[(tree, table)]).await
    }

    /// Store several trees in one transaction; either every table is
    /// replaced or none is.
    pub async fn store_all(&self, trees: &[(&MerkleTree, TreeTable)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (tree, table) in trees {
            write_table(&mut tx, tree, *table).await?;
        }
        tx.commit().await?;

        for (tree, table) in trees {
            info!(table = %table, leaves = tree.len(), root = %hex::encode(tree.root()), "tree_store: stored");
        }
        Ok(())
    }

    /// Leaves of `table` in their original order
    pub async fn load(&self, table: TreeTable) -> Result<Vec<Hash32>> {
        let select = format!("SELECT hash FROM {} ORDER BY seq ASC", table.identifier());
        let hashes: Vec<Vec<u8>> = sqlx::query_scalar(&select).fetch_all(&self.pool).await?;
        hashes.into_iter().map(to_digest).collect()
    }

    pub async fn load_tree(&self, table: TreeTable) -> Result<MerkleTree> {
        Ok(MerkleTree::build_from(self.load(table).await?))
    }

    /// Root recorded when `table` was last stored
    pub async fn stored_root(&self, table: TreeTable) -> Result<Option<Hash32>> {
        let root: Option<Vec<u8>> =
            sqlx::query_scalar(r#"SELECT root FROM tree_roots WHERE table_name = ?"#)
                .bind(table.identifier())
                .fetch_optional(&self.pool)
                .await?;
        root.map(to_digest).transpose()
    }

    /// Rebuild `table` and require its root to equal the recorded one
    pub async fn verify_stored(&self, table: TreeTable) -> Result<Hash32> {
        let expected = self
            .stored_root(table)
            .await?
            .ok_or_else(|| LedgerError::Validation(format!("no root recorded for {table}")))?;
        let actual = self.load_tree(table).await?.root();
        if actual != expected {
            return Err(LedgerError::IntegrityMismatch { expected, actual });
        }
        Ok(actual)
    }
}

async fn write_table(
    tx: &mut Transaction<'_, Sqlite>,
    tree: &MerkleTree,
    table: TreeTable,
) -> Result<()> {
    let ident = table.identifier();

    let create =
        format!("CREATE TABLE IF NOT EXISTS {ident} (seq INTEGER PRIMARY KEY, hash BLOB NOT NULL)");
    sqlx::query(&create).execute(&mut **tx).await?;

    let clear = format!("DELETE FROM {ident}");
    sqlx::query(&clear).execute(&mut **tx).await?;

    let insert = format!("INSERT INTO {ident} (seq, hash) VALUES (?, ?)");
    for (i, leaf) in tree.leaves().iter().enumerate() {
        sqlx::query(&insert)
            .bind((i + 1) as i64)
            .bind(&leaf[..])
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO tree_roots (table_name, root, leaf_count, stored_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (table_name) DO UPDATE SET
          root = excluded.root,
          leaf_count = excluded.leaf_count,
          stored_at = excluded.stored_at
        "#,
    )
    .bind(&ident)
    .bind(&tree.root()[..])
    .bind(tree.len() as i64)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
