//! Bulk key registration: ledger roots published through a
//! confirmation-gated, two-phase on-chain registration.

pub mod chain;
pub mod config;
pub mod gate;
pub mod routes;
pub mod state;
pub mod workflow;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/name_new", post(routes::name_new))
        .route("/name_firstupdate", post(routes::name_firstupdate))
        .route("/get_balance", post(routes::get_balance))
        .route("/generate_address", post(routes::generate_address))
        .route("/get_blockheight", post(routes::get_blockheight))
        .route("/keys", post(routes::insert_key))
        .route("/roots", get(routes::get_roots))
        .route("/roots/verify", post(routes::verify_root))
        .route("/roots/store", post(routes::store_trees))
        .route("/register", post(routes::register))
        .route("/register/:id", get(routes::get_intent))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
