//! HTTP router
//!
//! | Route                   | Description                                   |
//! |-------------------------|-----------------------------------------------|
//! | `GET /health`           | Liveness and counter store reachability       |
//! | `GET /api/audit`        | Audit trail query (reader roles only)         |
//! | `POST /api/certificates`| Governed certificate generation               |

use crate::context::{ClientRequest, HeaderIdentityProvider, IdentityProvider, NoIdentityProvider};
use crate::guard::{rate_limit, ClassGuard};
use crate::response::{apply_rate_limit_headers, ApiError};
use audit::{actions, AuditCategory, AuditQueryResult, FilterParams, Resource};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use governance::{Governance, GovernedError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{Clock, OperationClass};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Shared state for gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub governance: Arc<Governance>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Principals come from proxy-set headers only when `trustPrincipalHeaders`
    /// is on; otherwise nobody is authenticated until `with_identity` supplies
    /// a provider.
    pub fn new(governance: Governance) -> Self {
        let identity: Arc<dyn IdentityProvider> = if governance.config().trust_principal_headers {
            Arc::new(HeaderIdentityProvider)
        } else {
            Arc::new(NoIdentityProvider)
        };
        Self {
            governance: Arc::new(governance),
            identity,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }
}

/// Build the gateway application
pub fn build_router(state: AppState) -> Router {
    let audit_routes = Router::new()
        .route("/api/audit", get(query_audit))
        .route_layer(middleware::from_fn_with_state(
            ClassGuard::new(state.clone(), OperationClass::Admin),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/certificates", post(generate_certificate))
        .merge(audit_routes)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let limiter = state.governance.limiter();
    let (status, rate_limiting, counter_store) = if !limiter.is_enforcing() {
        ("ok", "fail_open", "not_configured")
    } else {
        match limiter.ping_store().await {
            Ok(()) => ("ok", "enforcing", "ok"),
            Err(e) => {
                warn!(error = %e, "Counter store health check failed");
                ("degraded", "fail_open", "unavailable")
            }
        }
    };
    Json(json!({
        "status": status,
        "rateLimiting": rate_limiting,
        "counterStore": counter_store,
    }))
}

async fn query_audit(
    State(state): State<AppState>,
    ClientRequest(ctx): ClientRequest,
    Query(params): Query<FilterParams>,
) -> Result<Json<AuditQueryResult>, ApiError> {
    let principal = ctx.principal.as_ref().ok_or(ApiError::Unauthorized)?;
    if !state.governance.config().can_read_audit(&principal.role) {
        warn!(actor = %principal.id, role = %principal.role, "Audit trail access denied");
        return Err(ApiError::Forbidden(principal.role.clone()));
    }

    let result = state.governance.query_audit(&params, &ctx).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateRequest {
    course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateResponse {
    certificate_id: String,
    course_id: String,
}

#[derive(Debug, Error)]
enum CertificateError {
    #[error("courseId must not be empty")]
    MissingCourse,
}

async fn generate_certificate(
    State(state): State<AppState>,
    ClientRequest(ctx): ClientRequest,
    Json(body): Json<CertificateRequest>,
) -> Response {
    if ctx.principal.is_none() {
        return ApiError::Unauthorized.into_response();
    }

    let certificate_id = Uuid::new_v4().to_string();
    let course_id = body.course_id.trim().to_string();
    let operation = state
        .governance
        .wrap(OperationClass::Api, actions::CERTIFICATE_GENERATED, AuditCategory::Api)
        .resource(Resource::new("certificate", certificate_id.clone()))
        .metadata("courseId", course_id.clone());

    let outcome = operation
        .run(&ctx, || async {
            if course_id.is_empty() {
                return Err(CertificateError::MissingCourse);
            }
            Ok(CertificateResponse {
                certificate_id,
                course_id: course_id.clone(),
            })
        })
        .await;

    match outcome {
        Ok(governed) => {
            let mut response = (StatusCode::CREATED, Json(governed.value)).into_response();
            apply_rate_limit_headers(response.headers_mut(), &governed.decision);
            response
        }
        Err(GovernedError::RateLimited(decision)) => {
            let now_ms = state.governance.limiter().clock().now_ms();
            ApiError::from(decision.to_error(OperationClass::Api, now_ms)).into_response()
        }
        Err(GovernedError::Handler(e)) => ApiError::BadRequest(e.to_string()).into_response(),
    }
}
