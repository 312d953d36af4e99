//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. All handlers
//! share [`AppState`] through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path             | Description                               |
//! |--------|------------------|-------------------------------------------|
//! | GET    | `/health`        | Liveness probe                            |
//! | GET    | `/status`        | Version, latest commit, state root        |
//! | POST   | `/invoke`        | Run one invocation as a registered caller |
//! | GET    | `/accounts/:id`  | Committed balance of an account           |
//! | GET    | `/supply`        | Total supply                              |
//!
//! Errors come back as `{"error": {"code", "message", "transient"}}` with a
//! status derived from the error code.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hashlock_contracts::{ContractError, Invocation};
use hashlock_protocol::storage::CommitError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::dispatcher::{DispatchError, Dispatcher};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub dispatcher: Arc<Dispatcher>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the axum [`Router`] with all API routes and request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/invoke", post(invoke_handler))
        .route("/accounts/:id", get(account_handler))
        .route("/supply", get(supply_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /invoke`.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    /// Registry name or full client ID of the caller.
    pub caller: String,
    pub invocation: Invocation,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    /// Version of the latest world-state commit.
    pub committed_version: u64,
    /// Hex BLAKE3 Merkle root over all committed entries.
    pub state_root: String,
    pub identities: usize,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub transient: bool,
}

/// Maps a dispatch failure to an HTTP response.
pub struct ApiError(DispatchError);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DispatchError::UnknownCaller(_) => StatusCode::UNAUTHORIZED,
            DispatchError::Commit(CommitError::MvccReadConflict { .. }) => StatusCode::CONFLICT,
            DispatchError::Commit(CommitError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Contract(e) => match e {
                ContractError::Unauthorized(_) => StatusCode::FORBIDDEN,
                ContractError::AccountNotFound(_) | ContractError::LockNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ContractError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ContractError::CorruptState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
            transient: self.0.is_transient(),
        };
        (self.status(), Json(serde_json::json!({ "error": body }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: latest commit and state root.
async fn status_handler(State(state): State<AppState>) -> Response {
    match state.dispatcher.status() {
        Ok(status) => Json(StatusResponse {
            version: state.version.clone(),
            committed_version: status.version,
            state_root: status.state_root,
            identities: status.identities,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("failed to read ledger status: {}", e);
            ApiError(DispatchError::Contract(e.into())).into_response()
        }
    }
}

/// `POST /invoke`: simulate and commit one invocation.
async fn invoke_handler(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.dispatcher.invoke(&req.caller, &req.invocation)?;
    Ok(Json(receipt))
}

/// `GET /accounts/:id`: committed balance. 404 if the account has no
/// record.
async fn account_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .dispatcher
        .query(&Invocation::BalanceOfAccount { account: id })?;
    Ok(Json(result))
}

/// `GET /supply`: total supply, zero before the first mint.
async fn supply_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let result = state.dispatcher.query(&Invocation::TotalSupply)?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::metrics::NodeMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use hashlock_protocol::crypto::hash_lock;
    use hashlock_protocol::storage::LedgerDb;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ISSUER: &str = "x509::CN=issuer,OU=client::CN=hashlock-ca";
    const ALICE: &str = "x509::CN=alice,OU=client::CN=hashlock-ca";

    /// Router over a temporary sled database and the sample identities.
    fn test_router() -> Router {
        let db = Arc::new(LedgerDb::open_temporary().expect("temp db"));
        let config = NodeConfig::sample(std::path::Path::new("unused"));
        let dispatcher = Dispatcher::new(
            db,
            config.registry().expect("registry"),
            Arc::new(NodeMetrics::new()),
        );
        create_router(AppState {
            version: "0.1.0-test".into(),
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Sends a GET request and returns the (status, JSON body).
    async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn invoke(router: &Router, caller: &str, invocation: Value) -> (StatusCode, Value) {
        let body = json!({ "caller": caller, "invocation": invocation });
        let req = Request::builder()
            .method("POST")
            .uri("/invoke")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = test_router();
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_empty_ledger() {
        let router = test_router();
        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["committed_version"], 0);
        assert_eq!(body["state_root"], "0".repeat(64));
        assert_eq!(body["identities"], 3);
    }

    #[tokio::test]
    async fn unknown_caller_is_unauthorized() {
        let router = test_router();
        let (status, body) = invoke(&router, "mallory", json!({ "function": "BalanceOf" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNKNOWN_CALLER");
    }

    #[tokio::test]
    async fn contract_errors_map_to_status_codes() {
        let router = test_router();
        let (status, body) =
            invoke(&router, "alice", json!({ "function": "Mint", "amount": 5 })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["transient"], false);

        let (status, _) = invoke(&router, "alice", json!({ "function": "BalanceOf" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            invoke(&router, "issuer", json!({ "function": "Mint", "amount": -1 })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn account_and_supply_endpoints() {
        let router = test_router();
        let (status, _) = get(&router, &format!("/accounts/{ISSUER}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        invoke(&router, "issuer", json!({ "function": "Mint", "amount": 70 })).await;

        let (status, body) = get(&router, &format!("/accounts/{ISSUER}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 70);
        let (_, body) = get(&router, "/supply").await;
        assert_eq!(body["total_supply"], 70);
    }

    #[tokio::test]
    async fn end_to_end_over_http() {
        let router = test_router();
        let secret = b"cross-chain secret";

        let (status, body) =
            invoke(&router, "issuer", json!({ "function": "Mint", "amount": 100 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["balance"], 100);
        assert_eq!(body["version"], 1);

        invoke(
            &router,
            "issuer",
            json!({ "function": "Approve", "receiver": ALICE, "amount": 40 }),
        )
        .await;
        let (_, body) = invoke(
            &router,
            "issuer",
            json!({ "function": "Transfer", "receiver": ALICE, "amount": 25 }),
        )
        .await;
        assert_eq!(body["result"]["allowance"], 15);

        let expiry = Utc::now() + Duration::hours(1);
        let (status, body) = invoke(
            &router,
            "issuer",
            json!({
                "function": "Lock",
                "receiver": ALICE,
                "amount": 30,
                "expiry": expiry,
                "hash_lock": hex::encode(hash_lock(secret)),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let lock_id = body["result"]["lock_id"].clone();

        let (status, body) = invoke(
            &router,
            "alice",
            json!({ "function": "Redeem", "lock_id": lock_id, "preimage": hex::encode(secret) }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "Redeemed");

        let (status, body) =
            invoke(&router, "issuer", json!({ "function": "Refund", "lock_id": lock_id })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "LOCK_NOT_PENDING");

        let (_, body) = get(&router, &format!("/accounts/{ALICE}")).await;
        assert_eq!(body["balance"], 55);
        let (_, body) = get(&router, &format!("/accounts/{ISSUER}")).await;
        assert_eq!(body["balance"], 45);
        let (_, body) = get(&router, "/supply").await;
        assert_eq!(body["total_supply"], 100);
    }

    #[test]
    fn store_failures_are_unavailable_wherever_they_surface() {
        use hashlock_protocol::storage::StateError;

        let at_commit = ApiError(DispatchError::Commit(CommitError::Store(
            StateError::Unavailable("disk".into()),
        )));
        let at_simulation = ApiError(DispatchError::Contract(ContractError::StoreUnavailable(
            "disk".into(),
        )));
        assert_eq!(at_commit.0.code(), "STORE_UNAVAILABLE");
        assert_eq!(at_commit.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(at_simulation.status(), at_commit.status());

        let conflict = ApiError(DispatchError::Commit(CommitError::MvccReadConflict {
            key: "alice".into(),
            read: Some(1),
            current: Some(2),
        }));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert!(conflict.0.is_transient());
    }
}
