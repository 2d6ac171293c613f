//! HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use maud::Markup;
use serde::Deserialize;
use titlepatch_core::{
    ident, Catalog, CatalogError, PatchSource, ScanManager, ScanRange,
};
use tracing::{info, warn};

use crate::views;

/// Shared handler state.
pub struct AppState<S> {
    catalog: Arc<Catalog<S>>,
    scans: Arc<ScanManager<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            scans: Arc::clone(&self.scans),
        }
    }
}

impl<S: PatchSource> AppState<S> {
    pub fn new(catalog: Arc<Catalog<S>>) -> Self {
        let scans = Arc::new(ScanManager::new(Arc::clone(&catalog)));
        Self { catalog, scans }
    }
}

pub fn router<S: PatchSource>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(search::<S>))
        .route("/id/{id}", get(lookup::<S>))
        .route("/list", get(list::<S>))
        .route("/scan", get(start_scan::<S>))
        .route("/scans", get(scans::<S>))
        .route("/scans/{id}/cancel", post(cancel_scan::<S>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    title: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    min: Option<u32>,
    max: Option<u32>,
}

async fn search<S: PatchSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    if let Some(title) = query.title {
        return match state.catalog.search_by_title(&title) {
            Ok(records) => match records.as_slice() {
                [] => error_page(
                    StatusCode::NOT_FOUND,
                    &format!("No titles matching \"{}\"", title.trim()),
                ),
                [record] => redirect_to_code(&record.code),
                _ => views::records(&format!("Titles matching \"{}\"", title.trim()), &records)
                    .into_response(),
            },
            Err(err) => failure_page(&err),
        };
    }

    if let Some(id) = query.id {
        let code = ident::normalize_code(&id);
        if let Err(err) = ident::validate_code(&code) {
            return failure_page(&err);
        }
        return match state.catalog.search_by_code(&code) {
            Ok(Some(record)) => redirect_to_code(&record.code),
            Ok(None) => redirect_to_code(&code),
            Err(err) => {
                warn!(%code, %err, "catalog lookup failed; falling back to vendor");
                redirect_to_code(&code)
            }
        };
    }

    views::index().into_response()
}

async fn lookup<S: PatchSource>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Response {
    let code = ident::normalize_code(&id);
    match state.catalog.lookup(&code).await {
        Ok(document) => views::document(&code, &document).into_response(),
        Err(err) => {
            info!(%code, %err, "lookup failed");
            failure_page(&err)
        }
    }
}

async fn list<S: PatchSource>(State(state): State<AppState<S>>) -> Response {
    match state.catalog.list() {
        Ok(records) => views::records("All titles", &records).into_response(),
        Err(err) => failure_page(&err),
    }
}

async fn start_scan<S: PatchSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<ScanQuery>,
) -> Response {
    let Some(kind) = query.kind.filter(|kind| !kind.trim().is_empty()) else {
        return error_page(StatusCode::BAD_REQUEST, "A scan needs an identifier type, e.g. ?type=NPUB");
    };

    match state.scans.start(ScanRange::new(kind, query.min, query.max)) {
        Ok(progress) => views::scan_started(&progress.snapshot()).into_response(),
        Err(err) => failure_page(&err),
    }
}

async fn scans<S: PatchSource>(State(state): State<AppState<S>>) -> Markup {
    views::scans(&state.scans.list())
}

async fn cancel_scan<S: PatchSource>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> Response {
    if state.scans.cancel(id) {
        info!(scan = id, "scan cancellation requested");
        Redirect::to("/scans").into_response()
    } else {
        error_page(StatusCode::NOT_FOUND, &format!("No scan #{id}"))
    }
}

fn redirect_to_code(code: &str) -> Response {
    Redirect::to(&format!("/id/{code}")).into_response()
}

fn error_page(status: StatusCode, message: &str) -> Response {
    (status, views::error(message)).into_response()
}

fn failure_page(err: &CatalogError) -> Response {
    let status = match err {
        CatalogError::NotFound(_) | CatalogError::EmptyContent(_) => StatusCode::NOT_FOUND,
        CatalogError::InvalidIdentifier(_) | CatalogError::SerialOutOfRange(_) => {
            StatusCode::BAD_REQUEST
        }
        CatalogError::UnexpectedStatus { .. }
        | CatalogError::Transport(_)
        | CatalogError::MalformedDocument(_) => StatusCode::BAD_GATEWAY,
        CatalogError::Storage(_) => {
            warn!(%err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_page(status, &err.to_string())
}
