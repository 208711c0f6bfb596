//! Read API over the store.
//!
//! # Routes
//!
//! - `GET /api/horoscope?languageId=<id-or-name>&sign=<sign>` - today's record
//!
//! `languageId` is either one of the published language ids or a language
//! name (case-insensitive). Responses:
//!
//! | Status | When |
//! |--------|------|
//! | 200 | `{ "success": true, "data": <record> }` |
//! | 400 | missing parameter, unknown language |
//! | 404 | nothing scraped for today, or today's scrape failed |
//! | 500 | store access failed |

use crate::error::Result;
use crate::models::{NaturalKey, Status};
use crate::store::HoroscopeStore;
use crate::utils::today_utc;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Published language ids and the language each stands for.
pub static LANGUAGE_IDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("6560d27b0bc4a38928599a41", "hindi"),
        ("6560d27b0bc4a38928599a42", "english"),
        ("6560d27b0bc4a38928599a43", "tamil"),
        ("6560d27b0bc4a38928599a44", "kannada"),
        ("6560d27b0bc4a38928599a45", "bengali"),
        ("6560d27b0bc4a38928599a46", "marathi"),
        ("6560d27b0bc4a38928599a47", "malayalam"),
        ("6560d27b0bc4a38928599a48", "gujarati"),
        ("6560d27b0bc4a38928599a49", "telugu"),
        ("6560d27b0bc4a38928599a4b", "odia"),
    ])
});

const MISSING_PARAMS: &str = "Missing 'languageId' (or name) or 'sign' query parameter.";
const INVALID_LANGUAGE: &str = "Invalid 'languageId' or language name provided.";
const NOT_FOUND: &str = "Horoscope not found for today. Please try again later.";
const INTERNAL_ERROR: &str = "Internal server error.";

/// Shared state of the route handlers; cloned per request.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn HoroscopeStore>,
    languages: Arc<BTreeSet<String>>,
}

impl AppState {
    /// `languages` are accepted by name in addition to the id table's names.
    pub fn new<I, S>(store: Arc<dyn HoroscopeStore>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: BTreeSet<String> = LANGUAGE_IDS.values().map(|s| s.to_string()).collect();
        names.extend(languages.into_iter().map(|l| l.into().to_lowercase()));
        Self {
            store,
            languages: Arc::new(names),
        }
    }

    /// Map an id or a name to a language name.
    pub fn resolve_language(&self, id_or_name: &str) -> Option<String> {
        if let Some(name) = LANGUAGE_IDS.get(id_or_name) {
            return Some(name.to_string());
        }
        let lower = id_or_name.to_lowercase();
        self.languages.contains(&lower).then_some(lower)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoroscopeQuery {
    pub language_id: Option<String>,
    pub sign: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/horoscope", get(get_horoscope))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API server listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

/// GET /api/horoscope
async fn get_horoscope(
    State(state): State<AppState>,
    Query(query): Query<HoroscopeQuery>,
) -> Response {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(language_id), Some(sign)) = (non_empty(query.language_id), non_empty(query.sign))
    else {
        return failure(StatusCode::BAD_REQUEST, MISSING_PARAMS);
    };

    let Some(language) = state.resolve_language(language_id.trim()) else {
        return failure(StatusCode::BAD_REQUEST, INVALID_LANGUAGE);
    };

    let key = NaturalKey::new(language, sign.trim().to_lowercase(), today_utc());
    match state.store.find_one(&key).await {
        Ok(Some(record)) if record.status == Status::Success => {
            (StatusCode::OK, Json(json!({ "success": true, "data": record }))).into_response()
        }
        Ok(_) => failure(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(e) => {
            error!(error = %e, language = %key.language, sign = %key.sign, "API error");
            failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}
