use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::commands::lock;
use recipebox_core::filter::FilterState;
use recipebox_core::models::{RecipeDetail, RecipeListItem, TagWithCount};
use recipebox_core::service::RecipeService;

// Every route is a GET; nothing needs a body.
const BODY_LIMIT: usize = 16 * 1024;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<RecipeService>>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RecipeQuery {
    /// Comma-separated tag ids, OR semantics.
    tags: Option<String>,
    q: Option<String>,
}

#[derive(Serialize)]
struct TagRecipes {
    tag_id: i64,
    recipe_ids: BTreeSet<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

fn parse_tags_param(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid tag id '{p}'")))
        })
        .collect()
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<RecipeListItem>>, ApiError> {
    let tags = match query.tags.as_deref() {
        Some(raw) => parse_tags_param(raw)?,
        None => Vec::new(),
    };
    let filter = FilterState::new()
        .with_tags(tags)
        .with_search(query.q.as_deref());

    let svc = lock(&state.svc);
    let recipes = svc.visible_recipes(&filter).context("database error")?;
    Ok(Json(recipes))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let svc = lock(&state.svc);
    let detail = svc
        .recipe_detail(id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    Ok(Json(detail))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    let svc = lock(&state.svc);
    let tags = svc.list_tags().context("database error")?;
    Ok(Json(tags))
}

async fn tag_recipes(
    State(state): State<AppState>,
    Path(tag_id): Path<i64>,
) -> Result<Json<TagRecipes>, ApiError> {
    let svc = lock(&state.svc);
    let known = svc
        .list_tags()
        .context("database error")?
        .iter()
        .any(|t| t.tag.id == tag_id);
    if !known {
        return Err(ApiError::NotFound(format!("Tag {tag_id} not found")));
    }
    let recipe_ids = svc
        .recipe_ids_with_any_tag(&BTreeSet::from([tag_id]))
        .context("database error")?;
    Ok(Json(TagRecipes { tag_id, recipe_ids }))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/{id}", get(get_recipe))
        .route("/api/tags", get(list_tags))
        .route("/api/tags/{id}/recipes", get(tag_recipes))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(svc: RecipeService, port: u16, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(%bind, "listening beyond loopback; any device on your network can read the recipe store");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
