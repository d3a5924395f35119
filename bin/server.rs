// Entity Match - Web Server
// POST /api/search matches uploaded rows against the entity database

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use entity_match::{
    summarize, BatchSummary, Entity, EntityStore, EntityType, MatchEngine, MatchResult, Row,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<EntityStore>,
    engine: MatchEngine,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    file_name: Option<String>,
    // Validated by shape below so a missing, null, non-array, or empty
    // value all report "rows must be a non-empty array" rather than a
    // body-level deserialization error.
    rows: Option<serde_json::Value>,
}

/// Accept `rows` only as a non-empty JSON array. Object elements become
/// rows; anything else becomes an empty row (nested values are dropped at
/// the boundary, per row conversion).
fn rows_from_payload(rows: Option<&serde_json::Value>) -> Option<Vec<Row>> {
    match rows {
        Some(serde_json::Value::Array(values)) if !values.is_empty() => Some(
            values
                .iter()
                .map(|value| match value {
                    serde_json::Value::Object(map) => Row::from_json_object(map),
                    _ => Row::new(),
                })
                .collect(),
        ),
        _ => None,
    }
}

#[derive(Serialize)]
struct SearchResponse {
    summary: BatchSummary,
    results: Vec<MatchResult>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// POST /api/search - match uploaded rows against the entity database
async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body"),
    };

    let rows = match rows_from_payload(request.rows.as_ref()) {
        Some(rows) => rows,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "rows must be a non-empty array",
            )
        }
    };
    let total_rows = rows.len();

    match state.engine.resolve_batch(rows).await {
        Ok(results) => {
            let summary = summarize(&results, request.file_name, total_rows);
            (StatusCode::OK, Json(SearchResponse { summary, results })).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "search failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /api/health - liveness plus per-collection entity counts
async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.entity_counts() {
        Ok(counts) => {
            let counts: BTreeMap<&str, i64> = counts.into_iter().collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "ok", "entities": counts })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// GET /api/test - first 10 records of every collection
async fn smoke_test(State(state): State<AppState>) -> Response {
    let mut samples: BTreeMap<&str, Vec<Entity>> = BTreeMap::new();
    for entity_type in EntityType::all() {
        match state.store.sample(*entity_type, 10) {
            Ok(entities) => {
                samples.insert(entity_type.table(), entities);
            }
            Err(err) => {
                tracing::error!(error = %err, table = entity_type.table(), "sample failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                );
            }
        }
    }
    (StatusCode::OK, Json(samples)).into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("entities.db"));

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: entity-match seed <entities.json>");
        eprintln!("   to seed entities first.");
        std::process::exit(1);
    }

    let store = match EntityStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("❌ Failed to open database: {}", err);
            std::process::exit(1);
        }
    };
    tracing::info!(?db_path, "entity database opened");

    let state = AppState {
        engine: MatchEngine::new(store.clone()),
        store,
    };

    let api_routes = Router::new()
        .route("/search", post(search))
        .route("/health", get(health_check))
        .route("/test", get(smoke_test))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("server running on http://localhost:3000");
    println!("🚀 Server running on http://localhost:3000");
    println!("   POST http://localhost:3000/api/search");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_payload_rejects_missing_and_non_array_shapes() {
        assert!(rows_from_payload(None).is_none());
        assert!(rows_from_payload(Some(&json!(null))).is_none());
        assert!(rows_from_payload(Some(&json!("not an array"))).is_none());
        assert!(rows_from_payload(Some(&json!({ "company": "Acme" }))).is_none());
        assert!(rows_from_payload(Some(&json!([]))).is_none());
    }

    #[test]
    fn test_rows_payload_accepts_object_rows() {
        let payload = json!([{ "company": "Acme Inc" }, { "website": "acme.com" }]);
        let rows = rows_from_payload(Some(&payload)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].get_ignore_case("company").is_some());
    }

    #[test]
    fn test_rows_payload_non_object_elements_become_empty_rows() {
        let payload = json!([{ "company": "Acme Inc" }, "stray", 7]);
        let rows = rows_from_payload(Some(&payload)).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].fields().next().is_none());
        assert!(rows[2].fields().next().is_none());
    }

    #[test]
    fn test_request_with_non_array_rows_still_deserializes() {
        // Shape errors must surface as the rows-specific message, not a
        // body-level deserialization failure
        let request: SearchRequest =
            serde_json::from_value(json!({ "fileName": "x.csv", "rows": "oops" })).unwrap();
        assert!(rows_from_payload(request.rows.as_ref()).is_none());
    }
}
