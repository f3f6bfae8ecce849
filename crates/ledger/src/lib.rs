//! Persistent hash ledger
//!
//! Records address/key rows, computes Merkle roots over their hashes,
//! persists tree leaves for later reconstruction and journals the state of
//! on-chain registrations.

mod db;
mod intent;
mod intent_store;
mod schema;
mod store;
mod tree_store;

pub use db::{connect, connect_in_memory, migrate};
pub use intent::{IntentPhase, RegistrationIntent, Reservation};
pub use intent_store::IntentStore;
pub use schema::{
    decode_root, encode_root, key_hash, row_hash, EncodedRoots, LedgerRow, LedgerTrees, RootRecord,
};
pub use store::HashLedger;
pub use tree_store::{TreeKind, TreeStore, TreeTable};

pub use merkle::Hash32;
pub use sqlx::SqlitePool;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Stored digest has {0} bytes, expected 32")]
    MalformedDigest(usize),

    #[error(
        "Integrity mismatch: expected root {}, recomputed {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    IntegrityMismatch { expected: Hash32, actual: Hash32 },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

pub(crate) fn to_digest(bytes: Vec<u8>) -> Result<Hash32> {
    let len = bytes.len();
    bytes.try_into().map_err(|_| LedgerError::MalformedDigest(len))
}
