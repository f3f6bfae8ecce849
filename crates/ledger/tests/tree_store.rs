use ledger::{connect_in_memory, migrate, HashLedger, LedgerError, TreeKind, TreeStore, TreeTable};
use merkle::{hash_bytes, Hash32, MerkleTree};
use sqlx::SqlitePool;

async fn pool() -> SqlitePool {
    let pool = connect_in_memory().await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}

fn leaves(n: usize) -> Vec<Hash32> {
    (0..n).map(|i| hash_bytes(format!("leaf{i}").as_bytes())).collect()
}

#[test]
fn test_identifier_comes_from_structure() {
    assert_eq!(TreeTable::new(TreeKind::Row, 3).identifier(), "tree_row_v3");
    assert_eq!(TreeTable::new(TreeKind::Key, 0).to_string(), "tree_key_v0");
}

#[tokio::test]
async fn test_round_trip_various_sizes() {
    let store = TreeStore::new(pool().await);
    for (version, n) in [0usize, 1, 2, 3, 8, 13].into_iter().enumerate() {
        let table = TreeTable::new(TreeKind::Row, version as u32);
        let tree = MerkleTree::build_from(leaves(n));
        store.store(&tree, table).await.unwrap();
        assert_eq!(store.load(table).await.unwrap(), tree.leaves().to_vec(), "n = {n}");
        assert_eq!(store.load_tree(table).await.unwrap().root(), tree.root());
    }
}

#[tokio::test]
async fn test_store_replaces_previous_contents() {
    let store = TreeStore::new(pool().await);
    let table = TreeTable::new(TreeKind::Key, 1);

    store.store(&MerkleTree::build_from(leaves(5)), table).await.unwrap();
    let smaller = MerkleTree::build_from(leaves(2));
    store.store(&smaller, table).await.unwrap();

    assert_eq!(store.load(table).await.unwrap(), smaller.leaves().to_vec());
    assert_eq!(store.stored_root(table).await.unwrap(), Some(smaller.root()));
}

#[tokio::test]
async fn test_verify_stored_detects_tampering() {
    let pool = pool().await;
    let store = TreeStore::new(pool.clone());
    let table = TreeTable::new(TreeKind::Row, 1);
    let tree = MerkleTree::build_from(leaves(4));
    store.store(&tree, table).await.unwrap();

    assert_eq!(store.verify_stored(table).await.unwrap(), tree.root());

    sqlx::query("DELETE FROM tree_row_v1 WHERE seq = 2")
        .execute(&pool)
        .await
        .unwrap();
    let err = store.verify_stored(table).await.unwrap_err();
    assert!(matches!(err, LedgerError::IntegrityMismatch { expected, .. } if expected == tree.root()));
}

#[tokio::test]
async fn test_unknown_table() {
    let store = TreeStore::new(pool().await);
    let table = TreeTable::new(TreeKind::Key, 99);

    assert_eq!(store.stored_root(table).await.unwrap(), None);
    assert!(matches!(store.load(table).await, Err(LedgerError::Storage(_))));
    assert!(matches!(store.verify_stored(table).await, Err(LedgerError::Validation(_))));
}

#[tokio::test]
async fn test_ledger_trees_survive_persistence() {
    let pool = pool().await;
    let ledger = HashLedger::new(pool.clone());
    let store = TreeStore::new(pool);

    for i in 0..7 {
        ledger.insert(&format!("addr{i}"), &format!("key{i}")).await.unwrap();
    }
    let trees = ledger.calculate_roots().await.unwrap();
    let table = TreeTable::new(TreeKind::Row, 1);
    store.store(&trees.row_tree, table).await.unwrap();
    drop(trees);

    let reloaded = store.load_tree(table).await.unwrap();
    ledger.verify_tree(TreeKind::Row, &reloaded).await.unwrap();
}

#[tokio::test]
async fn test_store_all_writes_both_tables() {
    let store = TreeStore::new(pool().await);
    let key_table = TreeTable::new(TreeKind::Key, 2);
    let row_table = TreeTable::new(TreeKind::Row, 2);
    let key_tree = MerkleTree::build_from(leaves(3));
    let row_tree = MerkleTree::build_from(leaves(6));

    store
        .store_all(&[(&key_tree, key_table), (&row_tree, row_table)])
        .await
        .unwrap();

    assert_eq!(store.verify_stored(key_table).await.unwrap(), key_tree.root());
    assert_eq!(store.verify_stored(row_table).await.unwrap(), row_tree.root());
}

#[tokio::test]
async fn test_store_all_rolls_back_on_partial_failure() {
    let pool = pool().await;
    let store = TreeStore::new(pool.clone());
    let key_table = TreeTable::new(TreeKind::Key, 4);
    let row_table = TreeTable::new(TreeKind::Row, 4);

    // incompatible layout: the insert into the row table fails
    sqlx::query("CREATE TABLE tree_row_v4 (note TEXT)")
        .execute(&pool)
        .await
        .unwrap();

    let key_tree = MerkleTree::build_from(leaves(3));
    let row_tree = MerkleTree::build_from(leaves(3));
    let err = store
        .store_all(&[(&key_tree, key_table), (&row_tree, row_table)])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));

    assert_eq!(store.stored_root(key_table).await.unwrap(), None);
    assert!(store.load(key_table).await.is_err());
}
