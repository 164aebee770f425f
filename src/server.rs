//! HTTP API for the knowledge base.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/api/knowledge` | List knowledge summaries, newest first |
//! | `POST`   | `/api/knowledge` | Add a note `{title, content, kind?}` |
//! | `POST`   | `/api/knowledge/upload` | Multipart upload of a PDF or text file (`file` part) |
//! | `DELETE` | `/api/knowledge/{id}` | Hard-delete an item |
//! | `POST`   | `/api/knowledge/retrieve` | Rank knowledge for `{query, top_k?, threshold?}` |
//! | `GET`    | `/api/embedding/status` | Whether the embedding service is reachable |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Malformed JSON bodies are reported as `bad_request` too.
//! An unreachable embedding service is not an error: retrieval answers with
//! no results and ingestion stores the item without a vector.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract;
use crate::ingest::{self, IngestPolicy};
use crate::models::{KnowledgeKind, KnowledgeSummary, NewKnowledgeItem};
use crate::retrieve::{format_context, RetrievalParams, Retriever};
use crate::store::{KnowledgeStore, SqliteStore};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KnowledgeStore>,
    pub retriever: Retriever,
    pub params: RetrievalParams,
    pub policy: IngestPolicy,
}

impl AppState {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        provider: Arc<dyn EmbeddingProvider>,
        params: RetrievalParams,
        policy: IngestPolicy,
    ) -> Self {
        Self {
            store,
            retriever: Retriever::new(provider),
            params,
            policy,
        }
    }

    fn provider(&self) -> &dyn EmbeddingProvider {
        self.retriever.provider().as_ref()
    }
}

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Build the router. Exposed so hosts and tests can serve it on their own listener.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/knowledge",
            get(handle_list_knowledge).post(handle_add_knowledge),
        )
        .route(
            "/api/knowledge/upload",
            post(handle_upload_knowledge).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/knowledge/retrieve", post(handle_retrieve))
        .route("/api/knowledge/{id}", delete(handle_delete_knowledge))
        .route("/api/embedding/status", get(handle_embedding_status))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated, or returns an error if the database
/// cannot be opened or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(config).await?;
    let provider = embedding::create_provider(&config.embedding)?;
    let state = AppState::new(
        Arc::new(store),
        provider,
        RetrievalParams::from(&config.retrieval),
        IngestPolicy::from(&config.embedding),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        provider = %config.embedding.provider,
        "knowledge server listening"
    );
    println!("Knowledge server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn rejected_body(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/knowledge ============

async fn handle_list_knowledge(
    State(state): State<AppState>,
) -> Result<Json<Vec<KnowledgeSummary>>, AppError> {
    let summaries = state.store.list_summaries().await.map_err(internal)?;
    Ok(Json(summaries))
}

#[derive(Serialize)]
struct AddResponse {
    id: String,
    embedded: bool,
}

async fn handle_add_knowledge(
    State(state): State<AppState>,
    payload: Result<Json<NewKnowledgeItem>, JsonRejection>,
) -> Result<Json<AddResponse>, AppError> {
    let Json(new) = payload.map_err(rejected_body)?;
    if new.title.trim().is_empty() || new.content.trim().is_empty() {
        return Err(bad_request("title and content must not be empty"));
    }

    let item = ingest::add_knowledge(state.store.as_ref(), state.provider(), &state.policy, new)
        .await
        .map_err(internal)?;

    Ok(Json(AddResponse {
        id: item.id,
        embedded: item.embedding.is_some(),
    }))
}

// ============ POST /api/knowledge/upload ============

async fn handle_upload_knowledge(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AddResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("file part must carry a file name"))?;
        let declared = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;

        let content_type = extract::resolve_content_type(&file_name, declared.as_deref())
            .ok_or_else(|| {
                bad_request(format!(
                    "unsupported file type: {} (use PDF or a text format)",
                    file_name
                ))
            })?;
        let text = extract::extract_document(&bytes, content_type)
            .map_err(|e| bad_request(format!("{}: {}", file_name, e)))?;

        let new = NewKnowledgeItem {
            title: file_name,
            content: text,
            kind: KnowledgeKind::Document,
        };
        let item = ingest::add_knowledge(state.store.as_ref(), state.provider(), &state.policy, new)
            .await
            .map_err(internal)?;

        return Ok(Json(AddResponse {
            id: item.id,
            embedded: item.embedding.is_some(),
        }));
    }

    Err(bad_request("multipart body has no `file` part"))
}

async fn handle_delete_knowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.store.delete(&id).await.map_err(internal)? {
        return Err(not_found(format!("knowledge item not found: {}", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ============ POST /api/knowledge/retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    threshold: Option<f32>,
}

#[derive(Serialize)]
struct RetrievedItem {
    id: String,
    title: String,
    score: f32,
    content: String,
}

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<RetrievedItem>,
    /// Ready-to-inject context block, `null` when nothing qualified.
    context: Option<String>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let Json(req) = payload.map_err(rejected_body)?;
    let top_k = req.top_k.unwrap_or(state.params.top_k);
    let threshold = req.threshold.unwrap_or(state.params.threshold);

    // snapshot, so concurrent ingestion cannot change the set mid-scan
    let items = state.store.list_items().await.map_err(internal)?;

    let hits = state
        .retriever
        .retrieve_scored(&req.query, &items, top_k, threshold)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    let results: Vec<RetrievedItem> = hits
        .iter()
        .map(|h| RetrievedItem {
            id: h.item.id.clone(),
            title: h.item.title.clone(),
            score: h.score,
            content: h.item.content.clone(),
        })
        .collect();
    let snippets: Vec<String> = results.iter().map(|r| r.content.clone()).collect();

    Ok(Json(RetrieveResponse {
        context: format_context(&snippets),
        results,
    }))
}

// ============ GET /api/embedding/status ============

#[derive(Serialize)]
struct EmbeddingStatus {
    online: bool,
    model: String,
}

async fn handle_embedding_status(State(state): State<AppState>) -> Json<EmbeddingStatus> {
    let provider = state.provider();
    Json(EmbeddingStatus {
        online: provider.health().await,
        model: provider.model_name().to_string(),
    })
}
