//! shipyard library - HTTP handlers and application setup.
//!
//! this crate provides the build callback server for provisioned machines:
//! - [`handlers`]: http request handlers
//! - [`token`]: machine callback token verification and minting
//! - [`cli`]: command-line interface implementation

#![warn(missing_docs)]

/// command-line interface.
pub mod cli;
/// http request handlers.
pub mod handlers;
mod notifier;
/// machine callback tokens.
pub mod token;

pub use notifier::{MACHINES_VIEW, ViewInvalidated, ViewNotifier};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use shipyard_db::ShipyardDb;
use shipyard_types::Config;

use crate::token::MachineTokenVerifier;

/// shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// machine store.
    pub db: ShipyardDb,
    /// verifier holding the callback signing secret.
    pub verifier: Arc<MachineTokenVerifier>,
    /// view invalidation broadcaster.
    pub notifier: ViewNotifier,
}

/// create the axum application with all routes configured.
///
/// `/api/update-run` is an alias kept for machines provisioned against
/// the older route name. callback bodies may be as large as
/// `config.max_callback_body_bytes`.
pub fn create_app(db: ShipyardDb, config: &Config, notifier: ViewNotifier) -> Router {
    let state = AppState {
        db,
        verifier: Arc::new(MachineTokenVerifier::new(&config.token)),
        notifier,
    };
    let body_limit = DefaultBodyLimit::max(config.max_callback_body_bytes);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/machine-built",
            post(handlers::machine_built).layer(body_limit),
        )
        .route(
            "/api/update-run",
            post(handlers::machine_built).layer(body_limit),
        )
        .with_state(state)
}
