//! Handler contracts for the validator REST API.
//!
//! The HTTP server itself is thin; everything interesting happens against the
//! fork choice controller, so the handlers are plain functions that tests can
//! call without a socket.

pub use crate::context::ApiContext;

mod context;
mod error;
mod handlers;
mod misc;

use axum::{routing::get, Router};

#[must_use]
pub fn routes(context: ApiContext) -> Router {
    Router::new()
        .route("/node/version", get(handlers::node_version))
        .route("/node/genesis_time", get(handlers::node_genesis_time))
        .route("/node/syncing", get(handlers::node_syncing))
        .route("/validator/duties", get(handlers::validator_duties))
        .route(
            "/validator/block",
            get(handlers::produce_block).post(handlers::publish_block),
        )
        .with_state(context)
}
