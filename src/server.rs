//! HTTP surface over the read path
//!
//! `GET /customer/{id}` reads without coalescing, `GET /customer/{id}/coalesced`
//! goes through the coalescer, and `GET /metrics` exposes the counters.
//! `/credentials/{user}` registers and checks passwords.

use crate::app::App;
use crate::error::{HerdError, HerdResult};
use crate::store::Customer;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct PasswordBody {
    password: String,
}

#[derive(Serialize)]
struct Verdict {
    valid: bool,
}

impl HerdError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BackendUnavailable { .. } | Self::Abandoned { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HerdError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Build the router for `app`
pub fn router(app: App) -> Router {
    Router::new()
        .route("/customer/{id}", get(customer))
        .route("/customer/{id}/coalesced", get(customer_coalesced))
        .route("/metrics", get(metrics))
        .route("/credentials/{user}", put(register_credentials))
        .route("/credentials/{user}/verify", post(verify_credentials))
        .with_state(app)
}

/// Serve `app` on `bind` until the process receives Ctrl-C
pub async fn serve(app: App, bind: &str) -> HerdResult<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| HerdError::io(format!("binding {}", bind), e))?;

    info!("Listening on {}", bind);
    axum::serve(listener, router(app))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| HerdError::io("serving HTTP", e))
}

async fn customer(State(app): State<App>, Path(id): Path<String>) -> HerdResult<Json<Customer>> {
    app.reader.get_uncoalesced(&id).await.map(Json)
}

async fn customer_coalesced(
    State(app): State<App>,
    Path(id): Path<String>,
) -> HerdResult<Json<Customer>> {
    app.reader.get(&id).await.map(Json)
}

async fn metrics(State(app): State<App>) -> HerdResult<impl IntoResponse> {
    let body = app.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

async fn register_credentials(
    State(app): State<App>,
    Path(user): Path<String>,
    Json(body): Json<PasswordBody>,
) -> HerdResult<StatusCode> {
    app.credentials.register(&user, &body.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_credentials(
    State(app): State<App>,
    Path(user): Path<String>,
    Json(body): Json<PasswordBody>,
) -> HerdResult<Json<Verdict>> {
    let valid = app.credentials.verify(&user, &body.password).await?;
    Ok(Json(Verdict { valid }))
}
