use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ledger::{decode_root, EncodedRoots, LedgerError, RegistrationIntent, TreeKind, TreeTable};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::chain::{self, ChainCommand, CommandError};
use crate::state::SharedState;

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn command_error(e: CommandError) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("Error executing command: {e}"))
}

fn ledger_error(e: LedgerError) -> ApiError {
    let status = match &e {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::IntegrityMismatch { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

// ---- node passthrough ----

#[derive(Deserialize)]
pub struct NameNewReq {
    pub name: String,
}

#[derive(Deserialize)]
pub struct NameFirstUpdateReq {
    pub name: String,
    pub rand: String,
    pub txid: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct CommandResp {
    pub response: String,
}

pub async fn name_new(State(st): State<SharedState>, Json(req): Json<NameNewReq>) -> ApiResult<CommandResp> {
    let response = st
        .chain
        .execute(&ChainCommand::NameNew { name: req.name })
        .await
        .map_err(command_error)?;
    Ok(Json(CommandResp { response }))
}

pub async fn name_firstupdate(
    State(st): State<SharedState>,
    Json(req): Json<NameFirstUpdateReq>,
) -> ApiResult<CommandResp> {
    let cmd = ChainCommand::NameFirstUpdate {
        name: req.name,
        rand: req.rand,
        txid: req.txid,
        value: req.value,
    };
    let response = st.chain.execute(&cmd).await.map_err(command_error)?;
    Ok(Json(CommandResp { response }))
}

pub async fn get_balance(State(st): State<SharedState>) -> ApiResult<serde_json::Value> {
    let balance = chain::balance(st.chain.as_ref()).await.map_err(command_error)?;
    Ok(Json(serde_json::json!({ "balance": balance })))
}

pub async fn generate_address(State(st): State<SharedState>) -> ApiResult<serde_json::Value> {
    let address = st
        .chain
        .execute(&ChainCommand::GetNewAddress)
        .await
        .map_err(command_error)?;
    Ok(Json(serde_json::json!({ "address": address })))
}

pub async fn get_blockheight(State(st): State<SharedState>) -> ApiResult<serde_json::Value> {
    let height = chain::block_height(st.chain.as_ref()).await.map_err(command_error)?;
    Ok(Json(serde_json::json!({ "blockheight": height })))
}

// ---- ledger ----

#[derive(Deserialize)]
pub struct InsertKeyReq {
    pub address: String,
    pub key: String,
}

#[derive(Serialize)]
pub struct InsertKeyResp {
    pub id: i64,
    pub key_hash: String,
    pub row_hash: String,
}

pub async fn insert_key(
    State(st): State<SharedState>,
    Json(req): Json<InsertKeyReq>,
) -> ApiResult<InsertKeyResp> {
    let row = st.ledger.insert(&req.address, &req.key).await.map_err(ledger_error)?;
    Ok(Json(InsertKeyResp {
        id: row.id,
        key_hash: hex::encode(row.key_hash),
        row_hash: hex::encode(row.row_hash),
    }))
}

#[derive(Serialize)]
pub struct RootsResp {
    #[serde(flatten)]
    pub roots: EncodedRoots,
    pub leaf_count: usize,
}

pub async fn get_roots(State(st): State<SharedState>) -> ApiResult<RootsResp> {
    let trees = st.ledger.calculate_roots().await.map_err(ledger_error)?;
    Ok(Json(RootsResp {
        roots: trees.roots.encoded(),
        leaf_count: trees.roots.leaf_count,
    }))
}

#[derive(Deserialize)]
pub struct VerifyRootReq {
    pub row_root: String,
}

pub async fn verify_root(
    State(st): State<SharedState>,
    Json(req): Json<VerifyRootReq>,
) -> ApiResult<RootsResp> {
    let expected = decode_root(&req.row_root).map_err(ledger_error)?;
    let roots = st.ledger.check_full_tree(&expected).await.map_err(ledger_error)?;
    Ok(Json(RootsResp { roots: roots.encoded(), leaf_count: roots.leaf_count }))
}

#[derive(Deserialize)]
pub struct StoreTreesReq {
    pub version: u32,
}

#[derive(Serialize)]
pub struct StoreTreesResp {
    pub key_table: String,
    pub row_table: String,
    #[serde(flatten)]
    pub roots: EncodedRoots,
    pub leaf_count: usize,
}

/// Persist both trees of the current snapshot under `version`, atomically
pub async fn store_trees(
    State(st): State<SharedState>,
    Json(req): Json<StoreTreesReq>,
) -> ApiResult<StoreTreesResp> {
    let trees = st.ledger.calculate_roots().await.map_err(ledger_error)?;
    let key_table = TreeTable::new(TreeKind::Key, req.version);
    let row_table = TreeTable::new(TreeKind::Row, req.version);

    st.trees
        .store_all(&[(&trees.key_tree, key_table), (&trees.row_tree, row_table)])
        .await
        .map_err(ledger_error)?;

    Ok(Json(StoreTreesResp {
        key_table: key_table.identifier(),
        row_table: row_table.identifier(),
        roots: trees.roots.encoded(),
        leaf_count: trees.roots.leaf_count,
    }))
}

// ---- registration ----

#[derive(Deserialize)]
pub struct RegisterReq {
    pub domain_name: String,
    /// Defaults to the current base64 row root
    pub value: Option<String>,
}

/// Accept an intent and drive it in the background
pub async fn register(
    State(st): State<SharedState>,
    Json(req): Json<RegisterReq>,
) -> Result<(StatusCode, Json<RegistrationIntent>), ApiError> {
    if req.domain_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "domain_name must not be empty".to_string()));
    }

    let value = match req.value {
        Some(v) => v,
        None => {
            let trees = st.ledger.calculate_roots().await.map_err(ledger_error)?;
            trees.roots.encoded().row_root
        }
    };

    let intent = st
        .workflow
        .accept(&req.domain_name, &value)
        .await
        .map_err(ledger_error)?;

    let workflow = st.workflow.clone();
    let cancel = st.shutdown.child_token();
    let pending = intent.clone();
    st.tasks.spawn(async move {
        if let Err(e) = workflow.run(pending, &cancel).await {
            error!(
                intent_id = %e.intent_id,
                reservation = ?e.reservation,
                finalize_txid = ?e.finalize_txid,
                "workflow journal error: {e}"
            );
        }
    });

    Ok((StatusCode::ACCEPTED, Json(intent)))
}

pub async fn get_intent(
    State(st): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RegistrationIntent> {
    match st.intents.get(id).await.map_err(ledger_error)? {
        Some(intent) => Ok(Json(intent)),
        None => Err((StatusCode::NOT_FOUND, format!("intent {id} not found"))),
    }
}
