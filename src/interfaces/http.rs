//! HTTP JSON surface over the alignment service.
//!
//! # Endpoints
//!
//! - `GET  /health` - readiness report
//! - `POST /api/search` - flat semantic search, optional domain filter
//! - `POST /api/resolve` - per-domain matches plus concept groups
//! - `POST /api/cross-domain` - matches outside the term's own domain
//! - `GET  /api/canonical?term=` - canonical concept of a term
//! - `GET  /api/concepts` - every canonical concept
//! - `GET  /api/concepts/terms?id=` - terms mapped to one concept
//! - `GET  /api/stats` - load and index statistics

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

use crate::{
    application::{
        dtos::{
            domain_matches, CanonicalMappingRequest, ConceptGroupDto, ConceptTermsQuery,
            ConceptTermsResponse, SearchResultDto, TermDto,
        },
        AlignmentService, CanonicalMappingResponse, ConceptListResponse, CrossDomainRequest,
        CrossDomainResponse, ResolveRequest, ResolveResponse, SearchRequest, SearchResponse,
        StatsResponse,
    },
    domain::DomainError,
};

#[derive(Clone)]
struct AppState {
    service: Arc<AlignmentService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON body extractor whose rejections use the `ErrorResponse` shape.
struct ApiJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}

/// Query-string extractor whose rejections use the `ErrorResponse` shape.
struct ApiQuery<T>(T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}

/// Build the router serving every query endpoint.
pub fn router(service: Arc<AlignmentService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/search", post(search_terms))
        .route("/api/resolve", post(resolve_terms))
        .route("/api/cross-domain", post(cross_domain_matches))
        .route("/api/canonical", get(canonical_mapping))
        .route("/api/concepts", get(list_concepts))
        .route("/api/concepts/terms", get(concept_terms))
        .route("/api/stats", get(get_stats))
        .with_state(AppState { service })
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.service.health();
    let status = if health.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

async fn search_terms(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let SearchRequest {
        query,
        domain,
        top_k,
        min_score,
    } = payload;

    let results = run_blocking(&state, "SEARCH_FAILED", {
        let query = query.clone();
        move |service: &AlignmentService| {
            service.semantic_search(&query, domain, top_k, min_score)
        }
    })
    .await?;

    Ok(Json(SearchResponse {
        query,
        results: results.iter().map(SearchResultDto::from).collect(),
    }))
}

async fn resolve_terms(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResolveRequest>,
) -> ApiResult<ResolveResponse> {
    let top_k = payload
        .top_k_per_domain
        .unwrap_or(state.service.config().default_top_k_per_domain);

    let resolved = run_blocking(&state, "RESOLVE_FAILED", {
        let query = payload.query.clone();
        move |service: &AlignmentService| service.resolve(&query, top_k)
    })
    .await?;

    let concepts = AlignmentService::group_by_concept(&resolved)
        .iter()
        .map(ConceptGroupDto::from)
        .collect();

    Ok(Json(ResolveResponse {
        query: payload.query,
        matches: domain_matches(&resolved),
        concepts,
    }))
}

async fn cross_domain_matches(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CrossDomainRequest>,
) -> ApiResult<CrossDomainResponse> {
    let CrossDomainRequest {
        term,
        source_domain,
        min_score,
    } = payload;

    let matches = run_blocking(&state, "CROSS_DOMAIN_FAILED", {
        let term = term.clone();
        move |service: &AlignmentService| {
            service.cross_domain_matches(&term, source_domain, min_score)
        }
    })
    .await?;

    Ok(Json(CrossDomainResponse {
        term,
        source_domain,
        matches: domain_matches(&matches),
    }))
}

async fn canonical_mapping(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CanonicalMappingRequest>,
) -> ApiResult<CanonicalMappingResponse> {
    let term = params.term;

    let best_match = run_blocking(&state, "CANONICAL_FAILED", {
        let term = term.clone();
        move |service: &AlignmentService| service.canonical_mapping(&term)
    })
    .await?;

    Ok(Json(CanonicalMappingResponse {
        exact_concepts: state.service.concepts_for(&term).into_iter().collect(),
        term,
        best_match,
    }))
}

async fn list_concepts(State(state): State<AppState>) -> Json<ConceptListResponse> {
    Json(ConceptListResponse {
        items: state.service.concepts(),
    })
}

async fn concept_terms(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ConceptTermsQuery>,
) -> ApiResult<ConceptTermsResponse> {
    let terms = state
        .service
        .terms_for_concept(&params.id)
        .map_err(|err| error_response(err, "CONCEPT_LOOKUP_FAILED"))?;

    Ok(Json(ConceptTermsResponse {
        concept_id: params.id.trim().to_string(),
        terms: terms.iter().map(|term| TermDto::from(term.as_ref())).collect(),
    }))
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.service.stats())
}

/// Run an embedding-bound service call on the blocking pool.
async fn run_blocking<T, F>(
    state: &AppState,
    code: &'static str,
    call: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AlignmentService) -> Result<T, DomainError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| error_response(DomainError::other(err.to_string()), code))?
        .map_err(|err| error_response(err, code))
}

fn invalid_request(message: String) -> ApiError {
    error_response(DomainError::validation(message), "INVALID_REQUEST")
}

fn error_response(err: DomainError, code: &str) -> ApiError {
    let status = match &err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(target: "semantic_mdm::http", code, "{}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}
