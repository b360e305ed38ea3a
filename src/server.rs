//! The HTTP gate in front of [`Deployer`].
//!
//! Only `POST /deploy` is routed; everything else is a plain 404. Requests
//! must carry the shared secret in `X-Deploy-Token` before any flag or remote
//! access happens.

use crate::deploy::Deployer;
use crate::error::DeployError;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const DEPLOY_PATH: &str = "/deploy";
pub const DEPLOY_TOKEN_HEADER: &str = "x-deploy-token";

#[derive(Clone)]
pub struct AppState {
    deployer: Deployer,
    deploy_token: Arc<str>,
}

impl AppState {
    pub fn new(deployer: Deployer, deploy_token: &str) -> Self {
        Self {
            deployer,
            deploy_token: Arc::from(deploy_token),
        }
    }

    fn authorised(&self, headers: &HeaderMap) -> bool {
        headers
            .get(DEPLOY_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|token| token == &*self.deploy_token)
    }
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        let status = match self {
            DeployError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(json!({ "ok": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(DEPLOY_PATH, post(deploy).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

async fn deploy(State(state): State<AppState>, headers: HeaderMap) -> Response {
    tracing::info!("deploy called");

    if !state.authorised(&headers) {
        tracing::warn!("unauthorized deploy request");
        return DeployError::Unauthorized.into_response();
    }

    match state.deployer.run().await {
        Ok(outcome) => {
            tracing::info!(?outcome, "deploy finished");
            Json(json!({ "ok": true, "result": outcome.to_json() })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "deploy failed");
            e.into_response()
        }
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Serves the gate on `listen_addr` until Ctrl-C.
pub async fn serve(state: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
