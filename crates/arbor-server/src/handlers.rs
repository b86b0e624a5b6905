//! JSON handlers for the REST API

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use arbor_core::{Bundle, PatternInstance, StoreError};
use arbor_patterns::PatternError;
use arbor_view::{project, project_with_patterns, ViewConfig};

use crate::ServerState;

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable kind tag for branching callers.
    pub error: String,
    pub message: String,
}

/// An error plus the status it maps to.
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn not_found(kind: &str, message: String) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: kind.to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NodeNotFound(_) | StoreError::PatternNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidBundle(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::DuplicateNode(_)
            | StoreError::DuplicateEdge(_)
            | StoreError::InvalidReference { .. } => StatusCode::CONFLICT,
            StoreError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            body: ErrorBody {
                error: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<PatternError> for ApiError {
    fn from(err: PatternError) -> Self {
        let status = match &err {
            PatternError::NotFound(_) => StatusCode::NOT_FOUND,
            PatternError::InvalidDefinition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError {
            status,
            body: ErrorBody {
                error: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoadParams {
    /// Validate the bundle before applying it. Defaults to true.
    pub validate: Option<bool>,
}

pub async fn load_bundle(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<LoadParams>,
    Json(bundle): Json<Bundle>,
) -> Result<impl IntoResponse, ApiError> {
    let validate = params.validate.unwrap_or(true);
    let mut store = state.store.write().await;
    let report = store.load_bundle(bundle, validate)?;
    Ok(Json(report))
}

pub async fn get_stats(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let store = state.store.read().await;
    Json(store.stats())
}

pub async fn get_node(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.read().await;
    match store.get_node(&id) {
        Some(node) => Ok(Json(node.clone())),
        None => Err(ApiError::not_found(
            "node_not_found",
            format!("node not found: {id}"),
        )),
    }
}

pub async fn get_edge(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.read().await;
    match store.get_edge(&id) {
        Some(edge) => Ok(Json(edge.clone())),
        None => Err(ApiError::not_found(
            "edge_not_found",
            format!("edge not found: {id}"),
        )),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ViewRequest {
    #[serde(flatten)]
    pub config: ViewConfig,
    /// Also run the pattern catalog over the projected scope.
    pub detect_patterns: bool,
}

pub async fn project_view(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ViewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.read().await;
    let result = if request.detect_patterns {
        project_with_patterns(&store, &state.matcher, &request.config)?
    } else {
        project(&store, &request.config)?
    };
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MatchRequest {
    /// A single pattern id, or every registered pattern when absent.
    pub pattern_id: Option<String>,
    /// Node ids restricting candidate generation.
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub matches: Vec<PatternInstance>,
}

pub async fn match_patterns(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.read().await;
    let scope: Option<HashSet<String>> = request.scope.map(|ids| ids.into_iter().collect());
    let matches = match &request.pattern_id {
        Some(id) => state.matcher.match_pattern(&store, id, scope.as_ref())?,
        None => state.matcher.match_all(&store, scope.as_ref()),
    };
    Ok(Json(MatchResponse { matches }))
}

pub async fn clear_store(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let mut store = state.store.write().await;
    store.clear();
    StatusCode::NO_CONTENT
}
