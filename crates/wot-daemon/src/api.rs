//! HTTP API.
//!
//! Admin routes (`/api/admin/*`, `/api/cron/*`) require
//! `Authorization: Bearer <admin token>`. Trust lookups and health are
//! public.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wot_types::{BuildRun, BuildTrigger, GraphNode, GraphStats, Pubkey, Seeder, SeederUpdate};

use crate::error::{require_admin, ApiError};
use crate::AppState;

/// Default and maximum number of runs returned by the graph overview.
const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 100;

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/api/admin/graph", get(graph_overview).post(rebuild_admin))
        .route("/api/cron/rebuild-graph", post(rebuild_cron))
        .route("/api/admin/seeders", get(list_seeders).post(create_seeder))
        .route(
            "/api/admin/seeders/:pubkey",
            patch(update_seeder).delete(delete_seeder),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/api/trust/:pubkey", get(trust))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

// --- Graph ---

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphOverview {
    stats: GraphStats,
    history: Vec<BuildRun>,
    is_running: bool,
}

async fn graph_overview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<GraphOverview>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let stats = state.builds.get_graph_stats().await?;
    let history = state.builds.get_build_history(limit).await?;
    let is_running = state.builds.is_build_running().await?;
    Ok(Json(GraphOverview {
        stats,
        history,
        is_running,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RebuildResponse {
    success: bool,
    nodes_count: u64,
}

async fn rebuild_admin(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RebuildResponse>, ApiError> {
    rebuild(&state, BuildTrigger::Admin).await
}

async fn rebuild_cron(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RebuildResponse>, ApiError> {
    rebuild(&state, BuildTrigger::Cron).await
}

async fn rebuild(
    state: &Arc<AppState>,
    trigger: BuildTrigger,
) -> Result<Json<RebuildResponse>, ApiError> {
    // Spawned so a dropped connection cannot cancel a build halfway through.
    let outcome = state
        .builds
        .spawn_build(trigger)
        .await
        .map_err(|e| ApiError::Internal(format!("build task failed: {e}")))??;

    if !outcome.success {
        return Err(ApiError::Internal(
            outcome
                .error
                .unwrap_or_else(|| "graph build failed".to_string()),
        ));
    }
    Ok(Json(RebuildResponse {
        success: true,
        nodes_count: outcome.nodes_count,
    }))
}

// --- Seeders ---

#[derive(Debug, Deserialize)]
struct SeederQuery {
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegionCount {
    region: String,
    count: u64,
}

#[derive(Debug, Serialize)]
struct SeederList {
    seeders: Vec<Seeder>,
    regions: Vec<RegionCount>,
}

async fn list_seeders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeederQuery>,
) -> Result<Json<SeederList>, ApiError> {
    let seeders = state.registry.list(query.region.as_deref()).await?;
    let regions = state
        .registry
        .regions()
        .await?
        .into_iter()
        .map(|(region, count)| RegionCount { region, count })
        .collect();
    Ok(Json(SeederList { seeders, regions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSeederRequest {
    pubkey: String,
    region: String,
    label: Option<String>,
    added_by: String,
}

async fn create_seeder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSeederRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let seeder = state
        .registry
        .create(&req.pubkey, &req.region, req.label.as_deref(), &req.added_by)
        .await?;
    Ok((StatusCode::CREATED, Json(seeder)))
}

async fn update_seeder(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Json(update): Json<SeederUpdate>,
) -> Result<Json<Seeder>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".into()));
    }
    Ok(Json(state.registry.update(&pubkey, update).await?))
}

async fn delete_seeder(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(&pubkey).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Trust ---

async fn trust(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
) -> Result<Json<GraphNode>, ApiError> {
    let pubkey = Pubkey::parse(&pubkey).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state
        .builds
        .get_trust(&pubkey)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{pubkey} is not in the trust graph")))
}
